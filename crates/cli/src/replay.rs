//! Offline extraction from a recorded service response.

use std::future::Future;
use std::path::{Path, PathBuf};

use serde_json::Value;

use auditgrid_engine::pipeline::{ExtractionError, ExtractionRequest, ExtractionService};

/// Answers every request with the JSON stored in one file: the raw array a
/// live service would have returned.
#[derive(Debug, Clone)]
pub struct ReplayExtractor {
    path: PathBuf,
}

impl ReplayExtractor {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl ExtractionService for ReplayExtractor {
    fn extract(&self, request: ExtractionRequest) -> impl Future<Output = Result<Value, ExtractionError>> + Send {
        let path = self.path.clone();
        log::debug!("replaying {} for {}", path.display(), request.module);
        smol::unblock(move || load(&path))
    }
}

fn load(path: &Path) -> Result<Value, ExtractionError> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| ExtractionError::service(format!("cannot read replay file {}: {}", path.display(), e)))?;
    serde_json::from_str(&content)
        .map_err(|e| ExtractionError::malformed(format!("replay file {} is not JSON: {}", path.display(), e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use auditgrid_engine::schemas::Rcm;

    fn request() -> ExtractionRequest {
        ExtractionRequest::for_schema::<Rcm>(&[])
    }

    #[test]
    fn test_replays_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rcm.json");
        std::fs::write(&path, r#"[{"refId": "P-1"}]"#).unwrap();

        let raw = smol::block_on(ReplayExtractor::new(&path).extract(request())).unwrap();
        assert_eq!(raw[0]["refId"], "P-1");
    }

    #[test]
    fn test_missing_file_is_service_error() {
        let dir = tempfile::tempdir().unwrap();
        let replay = ReplayExtractor::new(dir.path().join("absent.json"));
        let err = smol::block_on(replay.extract(request())).unwrap_err();
        assert!(matches!(err, ExtractionError::Service { .. }));
    }

    #[test]
    fn test_invalid_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "[{").unwrap();
        let err = smol::block_on(ReplayExtractor::new(&path).extract(request())).unwrap_err();
        assert!(matches!(err, ExtractionError::Malformed { .. }));
    }
}
