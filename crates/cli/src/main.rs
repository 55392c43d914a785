// AuditGrid CLI - extract audit records from documents and export workbooks

mod exit_codes;

use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use serde_json::json;

use auditgrid_cli::gemini::{GeminiExtractor, GEMINI_API_BASE};
use auditgrid_cli::replay::ReplayExtractor;
use auditgrid_config::ai::{self, AIConfigStatus, ResolvedAIConfig};
use auditgrid_config::settings::{DateClock, Settings};
use auditgrid_engine::column::{ColumnKind, ColumnSpec};
use auditgrid_engine::intake::{Document, InputRejected, IntakePolicy};
use auditgrid_engine::matrix::{RecordMatrix, RunError};
use auditgrid_engine::module::ModuleKind;
use auditgrid_engine::narration::{LogEntry, Severity};
use auditgrid_engine::pipeline::ExtractionService;
use auditgrid_engine::schema::Schema;
use auditgrid_engine::schemas::{Compliance, GapAnalysis, GapTally, Rcm, Trend};
use auditgrid_io::inspect::{self, InspectError, WorkbookReport};
use auditgrid_io::xlsx::{self, SynthesisError};

use exit_codes::{
    EXIT_AI_DISABLED, EXIT_AI_MISSING_KEY, EXIT_ERROR, EXIT_EXTRACTION_FAILED, EXIT_INPUT_REJECTED, EXIT_IO,
    EXIT_SUCCESS, EXIT_SYNTHESIS_FAILED, EXIT_USAGE, EXIT_WORKBOOK_UNREADABLE,
};

#[derive(Parser)]
#[command(name = "agrid")]
#[command(about = "Extract audit records from PDF documents into spreadsheet matrices")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Debug diagnostics on stderr
    #[arg(long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only errors on stderr
    #[arg(long, short = 'q', global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract records from documents and export them as a workbook
    #[command(after_help = "\
Examples:
  agrid extract compliance policy.pdf
  agrid extract gap regulation.pdf internal_policy.pdf --out reports/
  agrid extract trend fy23.pdf fy24.pdf --cycle FY23 --cycle FY24
  agrid extract rcm process.pdf --replay recorded.json --json")]
    Extract(ExtractArgs),

    /// Load records from a replay file and print those matching a query
    Search {
        /// compliance, gap, rcm or trend
        module: ModuleKind,

        /// Recorded extraction response (JSON array)
        #[arg(long)]
        replay: PathBuf,

        /// Case-insensitive substring; blank matches everything
        query: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print a module's column table
    Columns {
        module: ModuleKind,

        #[arg(long)]
        json: bool,
    },

    /// Describe an exported workbook: shape, filter, validations, colours
    Inspect {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },

    /// AI provider commands
    Ai {
        #[command(subcommand)]
        command: AiCommands,
    },
}

#[derive(Args)]
struct ExtractArgs {
    /// compliance, gap, rcm or trend
    module: ModuleKind,

    /// PDF documents, in the order the module expects
    #[arg(required = true)]
    docs: Vec<PathBuf>,

    /// Audit cycle label per document (trend only). Repeatable.
    #[arg(long, value_name = "LABEL")]
    cycle: Vec<String>,

    /// Use a recorded response instead of calling the AI provider
    #[arg(long, value_name = "JSON")]
    replay: Option<PathBuf>,

    /// Output directory (default: settings `export.directory`, else cwd)
    #[arg(long, short = 'o', value_name = "DIR")]
    out: Option<PathBuf>,

    /// Extract only, skip the workbook
    #[arg(long)]
    no_export: bool,

    #[arg(long)]
    json: bool,
}

#[derive(Subcommand)]
enum AiCommands {
    /// Check AI configuration
    Doctor {
        #[arg(long)]
        json: bool,
    },
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  auditgrid-engine ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
    )
}

/// Run a generic command for the schema behind a module.
macro_rules! with_schema {
    ($module:expr, $f:ident ( $($arg:expr),* )) => {
        match $module {
            ModuleKind::Compliance => $f::<Compliance>($($arg),*),
            ModuleKind::Gap => $f::<GapAnalysis>($($arg),*),
            ModuleKind::Rcm => $f::<Rcm>($($arg),*),
            ModuleKind::Trend => $f::<Trend>($($arg),*),
        }
    };
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.quiet, cli.verbose);
    let quiet = cli.quiet;

    let result = match cli.command {
        Commands::Extract(args) => {
            let module = args.module;
            with_schema!(module, cmd_extract(args, quiet))
        }
        Commands::Search { module, replay, query, json } => {
            with_schema!(module, cmd_search(&replay, &query, json, quiet))
        }
        Commands::Columns { module, json } => with_schema!(module, cmd_columns(json)),
        Commands::Inspect { file, json } => cmd_inspect(&file, json),
        Commands::Ai { command } => match command {
            AiCommands::Doctor { json } => cmd_ai_doctor(json),
        },
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

fn init_tracing(quiet: bool, verbose: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_env("AGRID_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_log_directives(quiet, verbose)));

    if let Err(e) = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init()
    {
        eprintln!("warning: failed to initialize logging: {}", e);
    }
}

/// Narration already reaches stderr through the log sink, so its diagnostic
/// mirror stays off unless `--verbose` or `AGRID_LOG` asks for it.
fn default_log_directives(quiet: bool, verbose: bool) -> &'static str {
    if quiet {
        "error,auditgrid::narration=off"
    } else if verbose {
        "debug"
    } else {
        "warn,auditgrid::narration=off"
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_IO, msg)
    }

    /// Exit without printing anything further.
    pub fn silent(code: u8) -> Self {
        Self::new(code, "")
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<InputRejected> for CliError {
    fn from(err: InputRejected) -> Self {
        Self::new(EXIT_INPUT_REJECTED, err.to_string())
    }
}

impl From<RunError> for CliError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::Launch(e) => Self::new(EXIT_ERROR, e.to_string()),
            RunError::Extraction(e) => Self::new(EXIT_EXTRACTION_FAILED, e.to_string()),
        }
    }
}

impl From<SynthesisError> for CliError {
    fn from(err: SynthesisError) -> Self {
        Self::new(EXIT_SYNTHESIS_FAILED, err.to_string())
    }
}

impl From<InspectError> for CliError {
    fn from(err: InspectError) -> Self {
        Self::new(EXIT_WORKBOOK_UNREADABLE, err.to_string())
    }
}

fn json_out(value: &serde_json::Value) -> Result<(), CliError> {
    let text = serde_json::to_string_pretty(value).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
    println!("{}", text);
    Ok(())
}

// ============================================================================
// Shared pipeline plumbing
// ============================================================================

/// Narration goes to stderr as it is appended. `--quiet` keeps errors only.
fn attach_narration<S: Schema>(matrix: &mut RecordMatrix<S>, quiet: bool) {
    matrix.log_mut().set_sink(move |entry: &LogEntry| {
        if !quiet || entry.severity == Severity::Error {
            eprintln!("[{}] {} {}", entry.timestamp, entry.severity.as_str(), entry.message);
        }
    });
}

enum Source {
    Replay(ReplayExtractor),
    Gemini(GeminiExtractor),
}

impl Source {
    fn resolve(replay: Option<&Path>, settings: &Settings) -> Result<Self, CliError> {
        if let Some(path) = replay {
            return Ok(Source::Replay(ReplayExtractor::new(path)));
        }

        let config = ResolvedAIConfig::from_settings(&settings.ai);
        match config.status {
            AIConfigStatus::Disabled => Err(CliError::new(EXIT_AI_DISABLED, "AI provider is disabled").with_hint(
                format!(
                    "set \"ai\": {{ \"provider\": \"gemini\" }} in {}, or pass --replay <json>",
                    Settings::config_path_display()
                ),
            )),
            AIConfigStatus::MissingKey => Err(CliError::new(
                EXIT_AI_MISSING_KEY,
                config.blocking_reason.unwrap_or_else(|| "API key missing".to_string()),
            )
            .with_hint(format!("export {}=<key>", ai::env_var_name(config.provider.name())))),
            AIConfigStatus::Ready => {
                let key = config.api_key.ok_or_else(|| CliError::silent(EXIT_AI_MISSING_KEY))?;
                let gemini = GeminiExtractor::with_base_url(
                    key,
                    config.model,
                    Duration::from_secs(config.timeout_secs),
                    config.endpoint.unwrap_or_else(|| GEMINI_API_BASE.to_string()),
                )
                .map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
                Ok(Source::Gemini(gemini))
            }
        }
    }

    fn run<S: Schema>(&self, matrix: &mut RecordMatrix<S>, documents: &[Document]) -> Result<usize, CliError> {
        let count = match self {
            Source::Replay(replay) => drive(matrix, replay, documents),
            Source::Gemini(gemini) => drive(matrix, gemini, documents),
        }?;
        Ok(count)
    }
}

fn drive<S: Schema, E: ExtractionService>(
    matrix: &mut RecordMatrix<S>,
    service: &E,
    documents: &[Document],
) -> Result<usize, RunError> {
    smol::block_on(matrix.extract(service, documents))
}

/// Read documents and attach `--cycle` labels.
fn load_documents(module: ModuleKind, paths: &[PathBuf], cycles: &[String]) -> Result<Vec<Document>, CliError> {
    if !cycles.is_empty() {
        if !module.requires_labels() {
            return Err(CliError::args(format!("--cycle does not apply to the {} module", module)));
        }
        if cycles.len() != paths.len() {
            return Err(CliError::args(format!(
                "{} --cycle label(s) for {} document(s)",
                cycles.len(),
                paths.len()
            ))
            .with_hint("give one --cycle per document, in the same order"));
        }
    }

    paths
        .iter()
        .enumerate()
        .map(|(i, path)| {
            let bytes = fs::read(path).map_err(|e| CliError::io(format!("{}: {}", path.display(), e)))?;
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| path.display().to_string());
            let doc = Document::new(name, bytes);
            Ok(match cycles.get(i) {
                Some(label) => doc.with_label(label.clone()),
                None => doc,
            })
        })
        .collect()
}

fn export_date(clock: DateClock) -> chrono::NaiveDate {
    match clock {
        DateClock::Local => chrono::Local::now().date_naive(),
        DateClock::Utc => chrono::Utc::now().date_naive(),
    }
}

// ============================================================================
// extract
// ============================================================================

fn cmd_extract<S: Schema>(args: ExtractArgs, quiet: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let source = Source::resolve(args.replay.as_deref(), &settings)?;
    let documents = load_documents(S::MODULE, &args.docs, &args.cycle)?;

    let policy = IntakePolicy {
        max_document_bytes: settings.max_document_bytes,
        require_pdf: settings.require_pdf,
    };

    let mut matrix = RecordMatrix::<S>::new();
    attach_narration(&mut matrix, quiet);
    matrix.admit(&documents, &policy)?;

    let count = source.run(&mut matrix, &documents)?;

    let mut written: Option<(xlsx::SynthesizedWorkbook, PathBuf)> = None;
    if !args.no_export {
        let dir = args
            .out
            .clone()
            .or_else(|| settings.export_directory.clone())
            .unwrap_or_else(|| PathBuf::from("."));
        let book = xlsx::export_matrix(&mut matrix, export_date(settings.date_clock))?;
        fs::create_dir_all(&dir).map_err(|e| CliError::io(format!("{}: {}", dir.display(), e)))?;
        let path = book
            .write_to(&dir)
            .map_err(|e| CliError::io(format!("{}: {}", dir.join(&book.filename).display(), e)))?;
        written = Some((book, path));
    }

    if args.json {
        let workbook = written.as_ref().map(|(book, path)| {
            json!({
                "filename": book.filename,
                "path": path.display().to_string(),
                "rows": book.rows,
                "columns": book.columns,
                "validations": book.validations,
            })
        });
        let mut out = json!({
            "module": S::MODULE.slug(),
            "records": count,
            "workbook": workbook,
            "log": matrix.log().snapshot(),
        });
        if S::MODULE == ModuleKind::Gap {
            let tally = GapTally::from_records(matrix.store().all());
            out["summary"] = serde_json::to_value(tally).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        }
        return json_out(&out);
    }

    match written {
        Some((_, path)) => println!("{}", path.display()),
        None => println!("{} {} record(s) extracted", count, S::MODULE.slug()),
    }
    Ok(())
}

// ============================================================================
// search
// ============================================================================

fn cmd_search<S: Schema>(replay: &Path, query: &str, json: bool, quiet: bool) -> Result<(), CliError> {
    let mut matrix = RecordMatrix::<S>::new();
    attach_narration(&mut matrix, quiet);
    let total = Source::Replay(ReplayExtractor::new(replay)).run(&mut matrix, &[])?;

    matrix.set_query(query);
    let view = matrix.view();

    if json {
        return json_out(&json!({
            "module": S::MODULE.slug(),
            "query": query,
            "total": total,
            "matches": view,
        }));
    }

    for record in &view {
        let cells: Vec<String> = S::SEARCHABLE
            .iter()
            .map(|key| record.get(key).map(|v| v.to_string()).unwrap_or_default())
            .collect();
        println!("{}", cells.join(" | "));
    }
    if !quiet {
        eprintln!("{} of {} record(s) match", view.len(), total);
    }
    Ok(())
}

// ============================================================================
// columns
// ============================================================================

fn kind_label(kind: ColumnKind) -> &'static str {
    match kind {
        ColumnKind::PlainText => "text",
        ColumnKind::SingleLineEnum => "enum",
        ColumnKind::ColorCodedEnum => "color-enum",
    }
}

fn cmd_columns<S: Schema>(json: bool) -> Result<(), CliError> {
    if json {
        return json_out(&json!({
            "module": S::MODULE.slug(),
            "sheet": S::MODULE.sheet_name(),
            "filePrefix": S::MODULE.export_prefix(),
            "documents": S::MODULE.arity().to_string(),
            "columns": S::COLUMNS,
            "searchable": S::SEARCHABLE,
            "lockPolicy": S::LOCK_POLICY,
        }));
    }

    println!("{} ({}), {}", S::MODULE.title(), S::MODULE.sheet_name(), S::MODULE.arity());
    for col in S::COLUMNS {
        println!("{}", format_column(col));
    }
    if let Some(policy) = S::LOCK_POLICY {
        println!(
            "locked when {} = {}: {}",
            policy.trigger_key,
            policy.trigger_value,
            policy.locked_keys.join(", ")
        );
    }
    Ok(())
}

fn format_column(col: &ColumnSpec) -> String {
    let mut line = format!("{:<24} {:<26} {:>5} {:<10}", col.key, col.header, col.width, kind_label(col.kind));
    if col.kind.is_enumerated() {
        line.push(' ');
        line.push_str(&col.enum_values.join(", "));
    }
    line.trim_end().to_string()
}

// ============================================================================
// inspect
// ============================================================================

fn cmd_inspect(file: &Path, json: bool) -> Result<(), CliError> {
    if !file.exists() {
        return Err(CliError::io(format!("{}: file not found", file.display())));
    }
    let report = inspect::inspect_file(file)?;

    if json {
        let value = serde_json::to_value(&report).map_err(|e| CliError::new(EXIT_ERROR, e.to_string()))?;
        return json_out(&value);
    }

    print_report(&report);
    Ok(())
}

/// `0 -> A`, `26 -> AA`
fn col_letters(col: u16) -> String {
    let mut n = col as u32 + 1;
    let mut letters = Vec::new();
    while n > 0 {
        let rem = (n - 1) % 26;
        letters.push((b'A' + rem as u8) as char);
        n = (n - 1) / 26;
    }
    letters.iter().rev().collect()
}

fn print_report(report: &WorkbookReport) {
    println!("sheet:       {}", report.sheet_name);
    println!("rows:        {} ({} data)", report.rows, report.data_rows());
    println!("columns:     {}", report.columns);
    println!("autofilter:  {}", report.autofilter.as_deref().unwrap_or("none"));
    println!("headers:     {}", report.headers.join(" | "));

    if report.validations.is_empty() {
        println!("validations: none");
    } else {
        println!("validations:");
        for v in &report.validations {
            let ranges: Vec<String> = v
                .ranges
                .iter()
                .map(|r| {
                    format!(
                        "{}{}:{}{}",
                        col_letters(r.first_col),
                        r.first_row + 1,
                        col_letters(r.last_col),
                        r.last_row + 1
                    )
                })
                .collect();
            println!("  {:<12} {}", ranges.join(" "), v.values.join(", "));
        }
    }

    let colored = report
        .cells
        .iter()
        .filter(|c| c.row > 0 && c.style.as_ref().is_some_and(|s| s.fill.is_some()))
        .count();
    println!("filled data cells: {}", colored);
}

// ============================================================================
// ai doctor
// ============================================================================

fn cmd_ai_doctor(json: bool) -> Result<(), CliError> {
    let settings = Settings::load();
    let config = ResolvedAIConfig::from_settings(&settings.ai);

    if json {
        json_out(&json!({
            "schema_version": 1,
            "status": config.status.as_str(),
            "blocking_reason": config.blocking_reason,
            "provider": config.provider_name(),
            "model": config.model,
            "endpoint": config.endpoint,
            "timeout_secs": config.timeout_secs,
            "key": if config.api_key.is_some() { "present" } else { "missing" },
            "key_source": config.key_source.as_str(),
            "keychain": if ai::keychain_available() { "ok" } else { "unavailable" },
            "settings_path": Settings::config_path_display(),
        }))?;
    } else {
        print!("{}", config);
        println!("Settings file:     {}", Settings::config_path_display());
    }

    match config.status {
        AIConfigStatus::Ready => Ok(()),
        AIConfigStatus::Disabled => Err(CliError::silent(EXIT_AI_DISABLED)),
        AIConfigStatus::MissingKey => Err(CliError::silent(EXIT_AI_MISSING_KEY)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_col_letters() {
        assert_eq!(col_letters(0), "A");
        assert_eq!(col_letters(9), "J");
        assert_eq!(col_letters(25), "Z");
        assert_eq!(col_letters(26), "AA");
    }

    #[test]
    fn test_cycle_labels_need_trend() {
        let err = load_documents(ModuleKind::Compliance, &[PathBuf::from("a.pdf")], &["FY24".into()]).unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
    }

    #[test]
    fn test_cycle_count_must_match() {
        let err = load_documents(
            ModuleKind::Trend,
            &[PathBuf::from("a.pdf"), PathBuf::from("b.pdf")],
            &["FY24".into()],
        )
        .unwrap_err();
        assert_eq!(err.code, EXIT_USAGE);
        assert!(err.hint.is_some());
    }

    #[test]
    fn test_labels_attach_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.pdf");
        let b = dir.path().join("b.pdf");
        fs::write(&a, b"%PDF-1.4").unwrap();
        fs::write(&b, b"%PDF-1.4").unwrap();

        let docs = load_documents(ModuleKind::Trend, &[a, b], &["FY23".into(), "FY24".into()]).unwrap();
        assert_eq!(docs[0].label.as_deref(), Some("FY23"));
        assert_eq!(docs[1].display_name(), "FY24_b.pdf");
    }

    #[test]
    fn test_missing_document_is_io_error() {
        let err = load_documents(ModuleKind::Rcm, &[PathBuf::from("/nonexistent/x.pdf")], &[]).unwrap_err();
        assert_eq!(err.code, EXIT_IO);
    }

    #[test]
    fn test_run_error_codes() {
        use auditgrid_engine::pipeline::ExtractionError;
        let err: CliError = RunError::Extraction(ExtractionError::service("quota")).into();
        assert_eq!(err.code, EXIT_EXTRACTION_FAILED);
    }

    #[test]
    fn test_narration_mirror_only_when_verbose() {
        assert!(default_log_directives(false, false).contains("auditgrid::narration=off"));
        assert!(default_log_directives(true, false).contains("auditgrid::narration=off"));
        assert!(!default_log_directives(false, true).contains("narration"));
        for directives in [
            default_log_directives(false, false),
            default_log_directives(true, false),
            default_log_directives(false, true),
        ] {
            assert!(tracing_subscriber::EnvFilter::try_new(directives).is_ok(), "{}", directives);
        }
    }

    #[test]
    fn test_cli_parses() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
