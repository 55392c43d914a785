//! Gemini `generateContent` adapter for the extraction pipeline.
//!
//! One blocking POST per extraction, run on the smol blocking pool. No
//! retries: a failed call is reported once and the run ends.

use std::future::Future;
use std::time::Duration;

use serde_json::{json, Value};

use auditgrid_engine::pipeline::{ExtractionError, ExtractionRequest, ExtractionService};

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com";
const USER_AGENT: &str = concat!("agrid/", env!("CARGO_PKG_VERSION"));

const SYSTEM_INSTRUCTION: &str = "You are an audit operations assistant. Extract every record the \
    documents support, with full descriptive text, and answer only with JSON matching the schema.";

pub struct GeminiExtractor {
    http: reqwest::blocking::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiExtractor {
    pub fn new(api_key: String, model: String, timeout: Duration) -> Result<Self, ExtractionError> {
        Self::with_base_url(api_key, model, timeout, GEMINI_API_BASE.to_string())
    }

    pub fn with_base_url(
        api_key: String,
        model: String,
        timeout: Duration,
        base_url: String,
    ) -> Result<Self, ExtractionError> {
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| ExtractionError::service(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.base_url, self.model)
    }

    /// Synchronous call. `extract` runs this off-thread.
    pub fn generate(&self, request: &ExtractionRequest) -> Result<Value, ExtractionError> {
        generate(&self.http, &self.endpoint(), &self.api_key, request)
    }
}

impl ExtractionService for GeminiExtractor {
    fn extract(&self, request: ExtractionRequest) -> impl Future<Output = Result<Value, ExtractionError>> + Send {
        let http = self.http.clone();
        let url = self.endpoint();
        let api_key = self.api_key.clone();
        smol::unblock(move || generate(&http, &url, &api_key, &request))
    }
}

/// Request body: each document as a name line plus inline PDF data, then the
/// module instruction.
pub fn request_body(request: &ExtractionRequest) -> Value {
    let mut parts: Vec<Value> = Vec::with_capacity(request.documents.len() * 2 + 1);
    for doc in &request.documents {
        parts.push(json!({ "text": format!("Document: {}", doc.name) }));
        parts.push(json!({ "inlineData": { "mimeType": doc.mime_type, "data": doc.data } }));
    }
    parts.push(json!({ "text": request.instruction }));

    json!({
        "systemInstruction": { "parts": [{ "text": SYSTEM_INSTRUCTION }] },
        "contents": [{ "role": "user", "parts": parts }],
        "generationConfig": {
            "temperature": 0,
            "responseMimeType": "application/json",
            "responseSchema": request.schema,
        },
    })
}

fn generate(
    http: &reqwest::blocking::Client,
    url: &str,
    api_key: &str,
    request: &ExtractionRequest,
) -> Result<Value, ExtractionError> {
    log::debug!("POST {} ({} document(s))", url, request.documents.len());

    let resp = http
        .post(url)
        .header("x-goog-api-key", api_key)
        .json(&request_body(request))
        .send()
        .map_err(|e| ExtractionError::service(format!("Gemini request failed: {}", e)))?;

    let status = resp.status().as_u16();
    let body: Value = resp.json().unwrap_or(Value::Null);

    if !(200..300).contains(&status) {
        return Err(ExtractionError::service(format!(
            "Gemini error ({}): {}",
            status,
            extract_gemini_error(&body, status)
        )));
    }

    parse_candidate(&body)
}

/// Pull the JSON payload out of the first candidate's text. An empty answer
/// is an empty record set.
pub fn parse_candidate(body: &Value) -> Result<Value, ExtractionError> {
    let candidate = body
        .get("candidates")
        .and_then(|c| c.get(0))
        .ok_or_else(|| ExtractionError::malformed("response has no candidates"))?;

    let text: String = candidate
        .pointer("/content/parts")
        .and_then(Value::as_array)
        .map(|parts| parts.iter().filter_map(|p| p.get("text").and_then(Value::as_str)).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Ok(Value::Array(Vec::new()));
    }

    serde_json::from_str(&text).map_err(|e| ExtractionError::malformed(format!("candidate is not JSON: {}", e)))
}

fn extract_gemini_error(body: &Value, status: u16) -> String {
    body.pointer("/error/message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", status))
}
