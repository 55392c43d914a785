// Integration tests for the `agrid` binary.
// Run with: cargo test -p auditgrid-cli --test agrid_tests

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use tempfile::TempDir;

/// Isolated config home, working directory and documents for one test.
struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self { dir: tempfile::tempdir().unwrap() }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn agrid(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_agrid"));
        cmd.current_dir(self.path());
        cmd.env("HOME", self.path());
        cmd.env("XDG_CONFIG_HOME", self.path().join("config"));
        // Keep a real key out of tests
        cmd.env_remove("AUDITGRID_GEMINI_KEY");
        cmd.env_remove("AGRID_LOG");
        cmd
    }

    /// Write settings where `dirs::config_dir` looks on Linux and macOS.
    fn settings(&self, json: &str) {
        for base in [
            self.path().join("config"),
            self.path().join("Library").join("Application Support"),
        ] {
            let dir = base.join("auditgrid");
            std::fs::create_dir_all(&dir).unwrap();
            std::fs::write(dir.join("settings.json"), json).unwrap();
        }
    }

    fn pdf(&self, name: &str) -> PathBuf {
        let path = self.path().join(name);
        std::fs::write(&path, b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\n%%EOF\n").unwrap();
        path
    }
}

fn fixture(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("fixtures").join(name)
}

fn run(cmd: &mut Command) -> Output {
    cmd.output().expect("failed to run agrid")
}

fn assert_code(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "expected exit {}, got {:?}\nstdout: {}\nstderr: {}",
        code,
        output.status.code(),
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr),
    );
}

fn stdout_json(output: &Output) -> serde_json::Value {
    serde_json::from_slice(&output.stdout).expect("stdout is not JSON")
}

// ── extract ─────────────────────────────────────────────────────────

#[test]
fn extract_compliance_from_replay_writes_workbook() {
    let sb = Sandbox::new();
    let doc = sb.pdf("policy.pdf");
    let out_dir = sb.path().join("exports");

    let output = run(sb.agrid().arg("extract").arg("compliance").arg(&doc)
        .arg("--replay").arg(fixture("compliance.json"))
        .arg("--out").arg(&out_dir)
        .arg("--json"));
    assert_code(&output, 0);

    let summary = stdout_json(&output);
    assert_eq!(summary["module"], "compliance");
    assert_eq!(summary["records"], 3);
    let filename = summary["workbook"]["filename"].as_str().unwrap();
    assert!(filename.starts_with("AOC_ComplianceMatrix_"));
    assert!(filename.ends_with(".xlsx"));
    assert_eq!(summary["workbook"]["rows"], 4);
    assert!(out_dir.join(filename).exists());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("thinking"), "stderr: {}", stderr);
    assert!(stderr.contains("3 requirements identified"), "stderr: {}", stderr);
    assert!(stderr.contains("Export complete"), "stderr: {}", stderr);

    let inspected = run(sb.agrid().arg("inspect").arg(out_dir.join(filename)).arg("--json"));
    assert_code(&inspected, 0);
    let report = stdout_json(&inspected);
    assert_eq!(report["sheetName"], "Compliance Matrix");
    assert_eq!(report["rows"], 4);
    assert_eq!(report["columns"], 10);
    assert_eq!(report["autofilter"], "A1:J4");
    assert_eq!(report["validations"].as_array().unwrap().len(), 2);
}

#[test]
fn extract_prints_path_by_default() {
    let sb = Sandbox::new();
    let doc = sb.pdf("gap_reg.pdf");
    let policy = sb.pdf("gap_policy.pdf");

    let output = run(sb.agrid().args(["extract", "gap"]).arg(&doc).arg(&policy)
        .arg("--replay").arg(fixture("gap.json")));
    assert_code(&output, 0);

    let stdout = String::from_utf8_lossy(&output.stdout);
    let path = PathBuf::from(stdout.trim());
    assert!(path.starts_with("."), "{}", stdout);
    assert!(sb.path().join(&path).exists());
}

#[test]
fn extract_gap_json_includes_tally() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "gap"]).arg(sb.pdf("a.pdf")).arg(sb.pdf("b.pdf"))
        .arg("--replay").arg(fixture("gap.json"))
        .args(["--no-export", "--json"]));
    assert_code(&output, 0);

    let summary = stdout_json(&output);
    assert!(summary["workbook"].is_null());
    assert_eq!(summary["summary"]["total"], 3);
    assert_eq!(summary["summary"]["fullCompliance"], 1);
    assert_eq!(summary["summary"]["gap"], 1);
    assert_eq!(summary["summary"]["partial"], 1);
}

#[test]
fn extract_trend_narrates_each_cycle() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "trend"])
        .arg(sb.pdf("fy23.pdf")).arg(sb.pdf("fy24.pdf"))
        .args(["--cycle", "FY23", "--cycle", "FY24"])
        .arg("--replay").arg(fixture("trend.json"))
        .arg("--no-export"));
    assert_code(&output, 0);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Parsing fy23.pdf [cycle FY23]"), "stderr: {}", stderr);
    assert!(stderr.contains("Parsing fy24.pdf [cycle FY24]"), "stderr: {}", stderr);
    assert!(stderr.contains("1 themes found"), "stderr: {}", stderr);
}

#[test]
fn wrong_document_count_exits_20() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "gap"]).arg(sb.pdf("only.pdf"))
        .arg("--replay").arg(fixture("gap.json")));
    assert_code(&output, 20);
    assert!(String::from_utf8_lossy(&output.stderr).contains("2 documents"));
}

#[test]
fn non_pdf_exits_20() {
    let sb = Sandbox::new();
    let notes = sb.path().join("notes.txt");
    std::fs::write(&notes, "plain text").unwrap();

    let output = run(sb.agrid().args(["extract", "compliance"]).arg(&notes)
        .arg("--replay").arg(fixture("compliance.json")));
    assert_code(&output, 20);
}

#[test]
fn trend_without_cycles_exits_20() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "trend"])
        .arg(sb.pdf("fy23.pdf")).arg(sb.pdf("fy24.pdf"))
        .arg("--replay").arg(fixture("trend.json")));
    assert_code(&output, 20);
}

#[test]
fn mismatched_cycles_exit_2() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "trend"])
        .arg(sb.pdf("fy23.pdf")).arg(sb.pdf("fy24.pdf"))
        .args(["--cycle", "FY23"])
        .arg("--replay").arg(fixture("trend.json")));
    assert_code(&output, 2);
}

#[test]
fn missing_document_exits_3() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "rcm", "absent.pdf", "--replay"]).arg(fixture("compliance.json")));
    assert_code(&output, 3);
}

#[test]
fn incomplete_records_exit_21_and_write_nothing() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "compliance"]).arg(sb.pdf("p.pdf"))
        .arg("--replay").arg(fixture("incomplete.json")));
    assert_code(&output, 21);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error"), "stderr: {}", stderr);
    // One narration line, no diagnostic mirror of it, no colour codes when piped
    assert!(!stderr.contains("auditgrid::narration"), "stderr: {}", stderr);
    assert!(!stderr.contains('\x1b'), "stderr: {}", stderr);
    let narrated = stderr.lines().filter(|l| l.starts_with('[') && l.contains("] error ")).count();
    assert_eq!(narrated, 1, "stderr: {}", stderr);
    let xlsx_files = std::fs::read_dir(sb.path())
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.path().extension().is_some_and(|x| x == "xlsx"))
        .count();
    assert_eq!(xlsx_files, 0);
}

#[test]
fn ai_disabled_without_replay_exits_10() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["extract", "compliance"]).arg(sb.pdf("p.pdf")));
    assert_code(&output, 10);
    assert!(String::from_utf8_lossy(&output.stderr).contains("--replay"));
}

#[test]
fn ai_missing_key_exits_11() {
    let sb = Sandbox::new();
    sb.settings(r#"{ "ai": { "provider": "gemini" } }"#);
    let output = run(sb.agrid().args(["extract", "compliance"]).arg(sb.pdf("p.pdf")));
    assert_code(&output, 11);
    assert!(String::from_utf8_lossy(&output.stderr).contains("AUDITGRID_GEMINI_KEY"));
}

#[test]
fn gemini_round_trip_against_mock_server() {
    use httpmock::prelude::*;

    let server = MockServer::start();
    let records = std::fs::read_to_string(fixture("compliance.json")).unwrap();
    let mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v1beta/models/gemini-2.5-flash:generateContent")
            .header("x-goog-api-key", "mock-key");
        then.status(200).json_body(serde_json::json!({
            "candidates": [{ "content": { "parts": [{ "text": records }] } }]
        }));
    });

    let sb = Sandbox::new();
    sb.settings(&format!(
        r#"{{
            // test endpoint
            "ai": {{ "provider": "gemini", "model": "gemini-2.5-flash", "endpoint": "{}" }}
        }}"#,
        server.base_url()
    ));

    let output = run(sb.agrid().args(["extract", "compliance"]).arg(sb.pdf("p.pdf"))
        .env("AUDITGRID_GEMINI_KEY", "mock-key")
        .args(["--no-export", "--json"]));
    assert_code(&output, 0);
    mock.assert();
    assert_eq!(stdout_json(&output)["records"], 3);
}

#[test]
fn gemini_api_error_exits_21() {
    use httpmock::prelude::*;

    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(POST);
        then.status(429).json_body(serde_json::json!({
            "error": { "code": 429, "message": "Resource has been exhausted" }
        }));
    });

    let sb = Sandbox::new();
    sb.settings(&format!(r#"{{ "ai": {{ "provider": "gemini", "endpoint": "{}" }} }}"#, server.base_url()));

    let output = run(sb.agrid().args(["extract", "compliance"]).arg(sb.pdf("p.pdf"))
        .env("AUDITGRID_GEMINI_KEY", "mock-key"));
    assert_code(&output, 21);
    assert!(String::from_utf8_lossy(&output.stderr).contains("Resource has been exhausted"));
}

// ── search ──────────────────────────────────────────────────────────

#[test]
fn search_filters_case_insensitively() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["search", "compliance", "--replay"]).arg(fixture("compliance.json"))
        .args(["FIREWALL", "--json"]));
    assert_code(&output, 0);

    let result = stdout_json(&output);
    assert_eq!(result["total"], 3);
    let matches = result["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 1);
    assert_eq!(matches[0]["refId"], "NET-03");
    assert_eq!(matches[0]["status"], "N/A");
}

#[test]
fn blank_search_returns_everything_in_order() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["search", "gap", "--replay"]).arg(fixture("gap.json")).args(["  ", "--json"]));
    assert_code(&output, 0);

    let refs: Vec<String> = stdout_json(&output)["matches"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["refId"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(refs, vec!["REG-1.1", "REG-2.4", "REG-3.2"]);
}

// ── columns / inspect / ai ──────────────────────────────────────────

#[test]
fn columns_json_describes_gap_table() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["columns", "gap", "--json"]));
    assert_code(&output, 0);

    let table = stdout_json(&output);
    assert_eq!(table["sheet"], "Total Traceability Matrix");
    assert_eq!(table["columns"].as_array().unwrap().len(), 8);
    assert_eq!(table["lockPolicy"]["triggerValue"], "Full Compliance");
}

#[test]
fn unknown_module_is_usage_error() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["columns", "ledger"]));
    assert_code(&output, 2);
}

#[test]
fn inspect_missing_file_exits_3() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["inspect", "nope.xlsx"]));
    assert_code(&output, 3);
}

#[test]
fn inspect_garbage_exits_23() {
    let sb = Sandbox::new();
    let path = sb.path().join("broken.xlsx");
    std::fs::write(&path, b"not a zip archive").unwrap();
    let output = run(sb.agrid().arg("inspect").arg(&path));
    assert_code(&output, 23);
}

#[test]
fn ai_doctor_reports_disabled() {
    let sb = Sandbox::new();
    let output = run(sb.agrid().args(["ai", "doctor", "--json"]));
    assert_code(&output, 10);
    assert_eq!(stdout_json(&output)["status"], "disabled");
}

#[test]
fn ai_doctor_ready_with_env_key() {
    let sb = Sandbox::new();
    sb.settings(r#"{ "ai": { "provider": "gemini" } }"#);
    let output = run(sb.agrid().args(["ai", "doctor", "--json"]).env("AUDITGRID_GEMINI_KEY", "k"));
    assert_code(&output, 0);

    let report = stdout_json(&output);
    assert_eq!(report["status"], "ready");
    assert_eq!(report["key_source"], "environment");
    assert_eq!(report["model"], "gemini-2.5-pro");
}
