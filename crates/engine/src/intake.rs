//! Document intake checks run before an extraction is launched.
//!
//! Rejections never reach the pipeline: the caller logs the error and the
//! matrix state does not change.

use crate::module::{Arity, ModuleKind};

/// Default per-document size cap (8 MiB).
pub const DEFAULT_MAX_DOCUMENT_BYTES: u64 = 8 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";

/// One input document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    pub name: String,
    pub bytes: Vec<u8>,
    /// Audit-cycle label (trend documents only).
    pub label: Option<String>,
}

impl Document {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            bytes,
            label: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Name sent to the extraction service: `<label>_<name>` when labelled.
    pub fn display_name(&self) -> String {
        match &self.label {
            Some(label) => format!("{}_{}", label, self.name),
            None => self.name.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntakePolicy {
    pub max_document_bytes: u64,
    pub require_pdf: bool,
}

impl Default for IntakePolicy {
    fn default() -> Self {
        Self {
            max_document_bytes: DEFAULT_MAX_DOCUMENT_BYTES,
            require_pdf: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputRejected {
    #[error("{module} analysis requires {expected}, got {actual}")]
    WrongCount {
        module: ModuleKind,
        expected: Arity,
        actual: usize,
    },
    #[error("\"{name}\" is not a PDF document; only PDF artifacts are accepted")]
    NotPdf { name: String },
    #[error("\"{name}\" is {size} bytes, over the {limit} byte limit")]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("\"{name}\" needs an audit cycle label")]
    MissingLabel { name: String },
}

/// Validate `documents` for `module` under `policy`.
pub fn check(module: ModuleKind, documents: &[Document], policy: &IntakePolicy) -> Result<(), InputRejected> {
    let arity = module.arity();
    if !arity.accepts(documents.len()) {
        return Err(InputRejected::WrongCount {
            module,
            expected: arity,
            actual: documents.len(),
        });
    }

    for doc in documents {
        let size = doc.bytes.len() as u64;
        if size > policy.max_document_bytes {
            return Err(InputRejected::TooLarge {
                name: doc.name.clone(),
                size,
                limit: policy.max_document_bytes,
            });
        }
        if policy.require_pdf && !doc.bytes.starts_with(PDF_MAGIC) {
            return Err(InputRejected::NotPdf { name: doc.name.clone() });
        }
        if module.requires_labels() && doc.label.as_deref().map_or(true, |l| l.trim().is_empty()) {
            return Err(InputRejected::MissingLabel { name: doc.name.clone() });
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pdf(name: &str) -> Document {
        Document::new(name, b"%PDF-1.7\n...".to_vec())
    }

    #[test]
    fn test_accepts_single_pdf() {
        assert!(check(ModuleKind::Compliance, &[pdf("policy.pdf")], &IntakePolicy::default()).is_ok());
    }

    #[test]
    fn test_rejects_wrong_count() {
        let err = check(ModuleKind::Gap, &[pdf("reg.pdf")], &IntakePolicy::default()).unwrap_err();
        assert!(matches!(err, InputRejected::WrongCount { actual: 1, .. }));
        assert!(err.to_string().contains("exactly 2 documents"));
    }

    #[test]
    fn test_rejects_non_pdf_unless_relaxed() {
        let doc = Document::new("notes.txt", b"hello".to_vec());
        let err = check(ModuleKind::Rcm, &[doc.clone()], &IntakePolicy::default()).unwrap_err();
        assert_eq!(err, InputRejected::NotPdf { name: "notes.txt".into() });

        let relaxed = IntakePolicy { require_pdf: false, ..IntakePolicy::default() };
        assert!(check(ModuleKind::Rcm, &[doc], &relaxed).is_ok());
    }

    #[test]
    fn test_rejects_oversized() {
        let policy = IntakePolicy { max_document_bytes: 4, require_pdf: true };
        let err = check(ModuleKind::Compliance, &[pdf("big.pdf")], &policy).unwrap_err();
        assert!(matches!(err, InputRejected::TooLarge { limit: 4, .. }));
    }

    #[test]
    fn test_trend_requires_labels() {
        let docs = [pdf("a.pdf").with_label("FY23"), pdf("b.pdf")];
        let err = check(ModuleKind::Trend, &docs, &IntakePolicy::default()).unwrap_err();
        assert_eq!(err, InputRejected::MissingLabel { name: "b.pdf".into() });

        let docs = [pdf("a.pdf").with_label("FY23"), pdf("b.pdf").with_label("FY24")];
        assert!(check(ModuleKind::Trend, &docs, &IntakePolicy::default()).is_ok());
        assert_eq!(docs[1].display_name(), "FY24_b.pdf");
    }
}
