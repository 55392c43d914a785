//! Record-producing modules and their fixed metadata.
//!
//! A `ModuleKind` carries everything about a module that is not the record
//! schema itself: CLI slug, display title, worksheet name, export filename
//! prefix, how many documents the extraction call takes, and the narration
//! lines emitted around the call.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModuleKind {
    Compliance,
    Gap,
    Rcm,
    Trend,
}

/// How many documents one extraction run takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arity {
    Exactly(usize),
    AtLeast(usize),
}

impl Arity {
    pub fn accepts(&self, count: usize) -> bool {
        match *self {
            Arity::Exactly(n) => count == n,
            Arity::AtLeast(n) => count >= n,
        }
    }
}

impl fmt::Display for Arity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Arity::Exactly(1) => write!(f, "exactly 1 document"),
            Arity::Exactly(n) => write!(f, "exactly {} documents", n),
            Arity::AtLeast(n) => write!(f, "at least {} documents", n),
        }
    }
}

/// Fixed narration text for one module's extraction run.
#[derive(Debug, Clone, Copy)]
pub struct NarrationScript {
    /// `thinking` lines appended before the external call.
    pub before_call: &'static [&'static str],
    /// `thinking` lines appended after the call resolves, before mapping.
    pub after_call: &'static [&'static str],
    /// Prefix of the `error` line; the failure message follows.
    pub error_label: &'static str,
}

const COMPLIANCE_SCRIPT: NarrationScript = NarrationScript {
    before_call: &[
        "Engaging visual scan of the source document...",
        "Resolving multi-column layouts and reading order...",
        "Indexing tables and cross-reference footnotes...",
    ],
    after_call: &[
        "Verifying extracted matrix against the table of contents...",
        "Scanning for skipped modal verbs and hidden mandates...",
    ],
    error_label: "Extraction failure",
};

const GAP_SCRIPT: NarrationScript = NarrationScript {
    before_call: &[
        "Engaging visual scan for scanned documents...",
        "Resolving multi-column layouts and table mandates...",
    ],
    after_call: &[
        "Executing side-by-side clause comparison...",
        "Mapping benchmark clauses to policy references...",
    ],
    error_label: "Engine error",
};

const RCM_SCRIPT: NarrationScript = NarrationScript {
    before_call: &[
        "Mapping narrative clauses to control steps...",
        "Analyzing document for every distinct process step...",
    ],
    after_call: &[],
    error_label: "Synthesis error",
};

const TREND_SCRIPT: NarrationScript = NarrationScript {
    before_call: &["Extracting findings from historical artifacts..."],
    after_call: &[],
    error_label: "Trend analysis error",
};

impl ModuleKind {
    pub const ALL: [ModuleKind; 4] = [
        ModuleKind::Compliance,
        ModuleKind::Gap,
        ModuleKind::Rcm,
        ModuleKind::Trend,
    ];

    pub fn slug(&self) -> &'static str {
        match self {
            ModuleKind::Compliance => "compliance",
            ModuleKind::Gap => "gap",
            ModuleKind::Rcm => "rcm",
            ModuleKind::Trend => "trend",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            ModuleKind::Compliance => "Compliance Extraction",
            ModuleKind::Gap => "Regulatory Gap Mapping",
            ModuleKind::Rcm => "Risk Control Matrix",
            ModuleKind::Trend => "Trend Mining",
        }
    }

    pub fn sheet_name(&self) -> &'static str {
        match self {
            ModuleKind::Compliance => "Compliance Matrix",
            ModuleKind::Gap => "Total Traceability Matrix",
            ModuleKind::Rcm => "Risk Control Matrix",
            ModuleKind::Trend => "Trend Findings",
        }
    }

    pub fn export_prefix(&self) -> &'static str {
        match self {
            ModuleKind::Compliance => "AOC_ComplianceMatrix",
            ModuleKind::Gap => "AOC_TotalCoverage_GapAnalysis",
            ModuleKind::Rcm => "AOC_RCM_AuditReady",
            ModuleKind::Trend => "AOC_TrendAnalysis",
        }
    }

    pub fn arity(&self) -> Arity {
        match self {
            ModuleKind::Gap => Arity::Exactly(2),
            ModuleKind::Trend => Arity::AtLeast(2),
            ModuleKind::Compliance | ModuleKind::Rcm => Arity::Exactly(1),
        }
    }

    /// Whether each document must carry a cycle label.
    pub fn requires_labels(&self) -> bool {
        matches!(self, ModuleKind::Trend)
    }

    pub fn script(&self) -> &'static NarrationScript {
        match self {
            ModuleKind::Compliance => &COMPLIANCE_SCRIPT,
            ModuleKind::Gap => &GAP_SCRIPT,
            ModuleKind::Rcm => &RCM_SCRIPT,
            ModuleKind::Trend => &TREND_SCRIPT,
        }
    }

    /// `info` line opening a run over `names`.
    pub fn start_message(&self, names: &[&str]) -> String {
        match self {
            ModuleKind::Compliance => match names.first() {
                Some(name) => format!("Initializing structured audit scan for \"{}\"", name),
                None => "Initializing structured audit scan".to_string(),
            },
            ModuleKind::Gap => "Initializing structural gap analysis...".to_string(),
            ModuleKind::Rcm => "Initializing risk control matrix synthesis...".to_string(),
            ModuleKind::Trend => {
                format!("Initializing correlation across {} cycles...", names.len())
            }
        }
    }

    /// `success` line reporting how many records were installed.
    pub fn success_message(&self, count: usize) -> String {
        match self {
            ModuleKind::Compliance => {
                format!("Extraction complete: {} requirements identified.", count)
            }
            ModuleKind::Gap => format!("Analysis complete: {} clauses accounted for.", count),
            ModuleKind::Rcm => format!("RCM synthesis complete: {} clauses mapped.", count),
            ModuleKind::Trend => format!("Cross-cycle scan complete: {} themes found.", count),
        }
    }

    pub fn export_start_message(&self) -> &'static str {
        match self {
            ModuleKind::Compliance => "Initializing Excel export with list validations...",
            ModuleKind::Gap => "Synthesizing traceability workbook with color mapping...",
            ModuleKind::Rcm => "Initializing audit-ready RCM workbook synthesis...",
            ModuleKind::Trend => "Synthesizing trend findings workbook...",
        }
    }

    /// Short instruction sent to the extraction service with the documents.
    pub fn instruction(&self) -> &'static str {
        match self {
            ModuleKind::Compliance => {
                "Extract every requirement clause from the attached document as one \
                 record each, with audit procedure, expected evidence, criteria, risk \
                 rating and a verbatim source excerpt. Do not omit any clause."
            }
            ModuleKind::Gap => {
                "The first document is the benchmark regulation, the second is the \
                 target internal policy. Map every benchmark clause to the policy, \
                 classify coverage and describe any gap with a remediation action."
            }
            ModuleKind::Rcm => {
                "Build a risk control matrix from the attached process narrative: one \
                 row per distinct process step with its risk, control and ratings."
            }
            ModuleKind::Trend => {
                "The attached audit reports cover successive cycles, named by cycle. \
                 Identify recurring finding themes, count their occurrences and \
                 describe how severity moved across cycles."
            }
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown module '{0}' (expected compliance, gap, rcm or trend)")]
pub struct UnknownModule(pub String);

impl FromStr for ModuleKind {
    type Err = UnknownModule;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ModuleKind::ALL
            .into_iter()
            .find(|m| m.slug().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownModule(s.to_string()))
    }
}
