//! Extraction pipeline: request encoding, the service seam, and mapping raw
//! results into typed records.
//!
//! State machine per run:
//!
//! ```text
//! Idle ──begin──▶ Running ──ok──▶ Succeeded{count}
//!                    │
//!                    └──err──▶ Idle (error logged, store empty)
//! ```
//!
//! Results are installed all-or-nothing. There is no retry, no queue and no
//! cancellation; the caller keeps at most one run in flight.

use std::future::Future;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::Serialize;
use serde_json::Value;

use crate::intake::Document;
use crate::module::ModuleKind;
use crate::record::{AuditRecord, IdGenerator};
use crate::schema::{decode_fields, response_schema, Schema};

pub const PDF_MIME: &str = "application/pdf";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum PipelineState {
    Idle,
    Running,
    Succeeded { count: usize },
}

impl PipelineState {
    pub fn is_running(&self) -> bool {
        matches!(self, PipelineState::Running)
    }
}

/// A document as sent to the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EncodedDocument {
    pub name: String,
    pub mime_type: String,
    /// Standard base64 of the document bytes.
    pub data: String,
}

impl EncodedDocument {
    pub fn encode(doc: &Document) -> Self {
        Self {
            name: doc.display_name(),
            mime_type: PDF_MIME.to_string(),
            data: BASE64.encode(&doc.bytes),
        }
    }
}

/// Everything the extraction service needs for one call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionRequest {
    pub module: ModuleKind,
    pub instruction: String,
    pub documents: Vec<EncodedDocument>,
    /// Response-schema descriptor for the module.
    pub schema: Value,
}

impl ExtractionRequest {
    pub fn for_schema<S: Schema>(documents: &[Document]) -> Self {
        Self {
            module: S::MODULE,
            instruction: S::MODULE.instruction().to_string(),
            documents: documents.iter().map(EncodedDocument::encode).collect(),
            schema: response_schema::<S>(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractionError {
    /// The service rejected the call (network, quota, API error).
    #[error("{message}")]
    Service { message: String },
    /// The service answered with something that is not the module's records.
    #[error("malformed response: {reason}")]
    Malformed { reason: String },
    /// The module was reset while the call was in flight.
    #[error("result discarded after module reset")]
    Superseded,
}

impl ExtractionError {
    pub fn service(message: impl Into<String>) -> Self {
        ExtractionError::Service { message: message.into() }
    }

    pub fn malformed(reason: impl Into<String>) -> Self {
        ExtractionError::Malformed { reason: reason.into() }
    }
}

/// The external extraction call. Resolves to the raw JSON array the service
/// produced, untyped.
pub trait ExtractionService {
    fn extract(
        &self,
        request: ExtractionRequest,
    ) -> impl Future<Output = Result<Value, ExtractionError>> + Send;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum LaunchError {
    #[error("an extraction is already running for this module")]
    AlreadyRunning,
}

/// Handle for one in-flight run, returned by `begin_extraction` and handed
/// back to `finish_extraction`.
#[derive(Debug)]
pub struct ExtractionJob {
    pub(crate) generation: u64,
    request: ExtractionRequest,
}

impl ExtractionJob {
    pub(crate) fn new(generation: u64, request: ExtractionRequest) -> Self {
        Self { generation, request }
    }

    pub fn request(&self) -> &ExtractionRequest {
        &self.request
    }
}

/// Map a raw service response into records. Every element must decode; ids
/// are drawn only once the whole set is known good.
pub fn map_records<S: Schema>(
    raw: &Value,
    ids: &mut dyn IdGenerator,
) -> Result<Vec<AuditRecord<S>>, ExtractionError> {
    let items = raw
        .as_array()
        .ok_or_else(|| ExtractionError::malformed("expected a JSON array of records"))?;

    let decoded = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            decode_fields::<S>(item)
                .map_err(|e| ExtractionError::malformed(format!("record {}: {}", i + 1, e)))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(decoded
        .into_iter()
        .map(|fields| AuditRecord::from_parts(ids.next_id(), fields))
        .collect())
}
