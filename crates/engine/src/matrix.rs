//! One record matrix per module instance.
//!
//! `RecordMatrix<S>` owns the store, the search query, the selection cursor,
//! the narration log and the pipeline state for schema `S`. The grid renders
//! `view()`; export reads `store().all()`, never the filtered view.
//!
//! Extraction is split in two so the matrix is not borrowed while the
//! external call is pending:
//!
//! ```ignore
//! let job = matrix.begin_extraction(&docs)?;          // clears, narrates
//! let outcome = service.extract(job.request().clone()).await;
//! matrix.finish_extraction(job, outcome)?;            // installs or logs
//! ```
//!
//! `extract()` does both for callers that can hold `&mut self` across the
//! await.

use crate::intake::{self, Document, InputRejected, IntakePolicy};
use crate::narration::LogChannel;
use crate::pipeline::{
    map_records, ExtractionError, ExtractionJob, ExtractionRequest, ExtractionService, LaunchError,
    PipelineState,
};
use crate::record::{AuditRecord, FieldUpdate, IdGenerator, RecordId, SequentialIds};
use crate::schema::Schema;
use crate::search;
use crate::selection::SelectionCursor;
use crate::store::{PatchError, PatchOutcome, RecordStore};

/// Failure of the one-shot `extract()` path.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
    #[error(transparent)]
    Extraction(#[from] ExtractionError),
}

pub struct RecordMatrix<S: Schema> {
    store: RecordStore<S>,
    cursor: SelectionCursor,
    query: String,
    log: LogChannel,
    ids: Box<dyn IdGenerator>,
    state: PipelineState,
    /// Bumped on reset so a run started before the reset cannot land after it.
    generation: u64,
}

impl<S: Schema> Default for RecordMatrix<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: Schema> RecordMatrix<S> {
    /// Matrix with `<slug>-<n>` ids.
    pub fn new() -> Self {
        Self::with_ids(SequentialIds::new(S::MODULE.slug()))
    }

    pub fn with_ids(ids: impl IdGenerator + 'static) -> Self {
        Self {
            store: RecordStore::new(),
            cursor: SelectionCursor::new(),
            query: String::new(),
            log: LogChannel::new(),
            ids: Box::new(ids),
            state: PipelineState::Idle,
            generation: 0,
        }
    }

    pub fn store(&self) -> &RecordStore<S> {
        &self.store
    }

    pub fn state(&self) -> PipelineState {
        self.state
    }

    pub fn log(&self) -> &LogChannel {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut LogChannel {
        &mut self.log
    }

    // ------------------------------------------------------------------
    // View, search, selection
    // ------------------------------------------------------------------

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn set_query(&mut self, query: impl Into<String>) {
        self.query = query.into();
    }

    /// Current filtered view, store order.
    pub fn view(&self) -> Vec<&AuditRecord<S>> {
        search::filter(self.store.all(), &self.query, S::SEARCHABLE)
    }

    pub fn selected(&self) -> Option<&RecordId> {
        self.cursor.selected()
    }

    pub fn selected_record(&self) -> Option<&AuditRecord<S>> {
        self.cursor.selected().and_then(|id| self.store.get(id))
    }

    pub fn select(&mut self, id: RecordId) {
        self.cursor.select(id);
    }

    pub fn move_down(&mut self) {
        let view = search::filter(self.store.all(), &self.query, S::SEARCHABLE);
        self.cursor.move_down(&view);
    }

    pub fn move_up(&mut self) {
        let view = search::filter(self.store.all(), &self.query, S::SEARCHABLE);
        self.cursor.move_up(&view);
    }

    // ------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------

    pub fn patch(&mut self, id: &RecordId, updates: &[FieldUpdate]) -> Result<PatchOutcome, PatchError> {
        self.store.patch(id, updates)
    }

    pub fn is_locked(&self, id: &RecordId, key: &str) -> bool {
        self.store.is_locked(id, key)
    }

    pub fn tally(&self, key: &str) -> Vec<(String, usize)> {
        self.store.tally(key)
    }

    /// Module switch: drop records, selection, query and narration.
    pub fn reset(&mut self) {
        self.store.clear();
        self.cursor.clear();
        self.query.clear();
        self.log.clear();
        self.state = PipelineState::Idle;
        self.generation += 1;
    }

    // ------------------------------------------------------------------
    // Extraction
    // ------------------------------------------------------------------

    /// Run intake checks, logging a rejection. State does not change.
    pub fn admit(&mut self, documents: &[Document], policy: &IntakePolicy) -> Result<(), InputRejected> {
        intake::check(S::MODULE, documents, policy).map_err(|err| {
            self.reject_input(&err);
            err
        })
    }

    pub fn reject_input(&mut self, err: &InputRejected) {
        self.log.error(err.to_string());
    }

    /// `Idle -> Running`. Clears the store and selection, narrates the run
    /// and returns the request to send.
    pub fn begin_extraction(&mut self, documents: &[Document]) -> Result<ExtractionJob, LaunchError> {
        if self.state.is_running() {
            return Err(LaunchError::AlreadyRunning);
        }

        self.state = PipelineState::Running;
        self.store.clear();
        self.cursor.clear();

        let names: Vec<&str> = documents.iter().map(|d| d.name.as_str()).collect();
        self.log.info(S::MODULE.start_message(&names));
        for line in S::MODULE.script().before_call {
            self.log.thinking(*line);
        }
        for doc in documents {
            if let Some(label) = &doc.label {
                self.log.thinking(format!("Parsing {} [cycle {}]...", doc.name, label));
            }
        }

        log::debug!("{} extraction started with {} document(s)", S::MODULE, documents.len());
        Ok(ExtractionJob::new(self.generation, ExtractionRequest::for_schema::<S>(documents)))
    }

    /// `Running -> Succeeded | Idle`. Returns the installed record count.
    pub fn finish_extraction(
        &mut self,
        job: ExtractionJob,
        outcome: Result<serde_json::Value, ExtractionError>,
    ) -> Result<usize, ExtractionError> {
        if job.generation != self.generation {
            log::debug!("{} extraction result discarded after reset", S::MODULE);
            return Err(ExtractionError::Superseded);
        }

        let mapped = outcome.and_then(|raw| {
            for line in S::MODULE.script().after_call {
                self.log.thinking(*line);
            }
            map_records::<S>(&raw, self.ids.as_mut())
        });

        match mapped {
            Ok(records) => {
                let count = records.len();
                self.store.replace_all(records);
                if let Some(first) = self.store.all().first() {
                    self.cursor.select(first.id().clone());
                }
                self.log.success(S::MODULE.success_message(count));
                self.state = PipelineState::Succeeded { count };
                Ok(count)
            }
            Err(err) => {
                self.log.error(format!("{}: {}", S::MODULE.script().error_label, err));
                self.state = PipelineState::Idle;
                Err(err)
            }
        }
    }

    /// Begin, await the service, finish.
    pub async fn extract<E: ExtractionService>(
        &mut self,
        service: &E,
        documents: &[Document],
    ) -> Result<usize, RunError> {
        let job = self.begin_extraction(documents)?;
        let outcome = service.extract(job.request().clone()).await;
        Ok(self.finish_extraction(job, outcome)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narration::Severity;
    use crate::schemas::{Compliance, GapAnalysis};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct Canned(Result<Value, ExtractionError>);

    impl ExtractionService for Canned {
        async fn extract(&self, _request: ExtractionRequest) -> Result<Value, ExtractionError> {
            self.0.clone()
        }
    }

    /// Records the request it was given.
    struct Recording {
        seen: Mutex<Option<ExtractionRequest>>,
    }

    impl ExtractionService for Recording {
        async fn extract(&self, request: ExtractionRequest) -> Result<Value, ExtractionError> {
            *self.seen.lock().unwrap() = Some(request);
            Ok(json!([]))
        }
    }

    fn finding(ref_id: &str, risk: &str) -> Value {
        json!({
            "refId": ref_id, "domainTag": "Access", "riskRating": risk,
            "requirement": "Review user access quarterly", "procedure": "Inspect reviews",
            "evidence": "Sign-off", "criteria": "Quarterly", "sourceExcerpt": "shall review"
        })
    }

    fn doc() -> Document {
        Document::new("policy.pdf", b"%PDF-1.7".to_vec())
    }

    #[test]
    fn test_successful_extraction_installs_records() {
        let mut matrix = RecordMatrix::<Compliance>::new();
        let service = Canned(Ok(json!([finding("A-1", "High")])));

        let count = smol::block_on(matrix.extract(&service, &[doc()])).unwrap();

        assert_eq!(count, 1);
        assert_eq!(matrix.store().len(), 1);
        let record = &matrix.store().all()[0];
        assert_eq!(record.id().as_str(), "compliance-0");
        assert_eq!(record.text("status"), "N/A");
        assert_eq!(matrix.selected(), Some(record.id()));
        assert_eq!(matrix.state(), PipelineState::Succeeded { count: 1 });

        let last = matrix.log().last().unwrap();
        assert_eq!(last.severity, Severity::Success);
        assert!(last.message.contains('1'));
    }

    #[test]
    fn test_failed_extraction_logs_and_returns_to_idle() {
        let mut matrix = RecordMatrix::<Compliance>::new();
        let service = Canned(Err(ExtractionError::service("timeout")));

        let err = smol::block_on(matrix.extract(&service, &[doc()])).unwrap_err();

        assert_eq!(err, RunError::Extraction(ExtractionError::service("timeout")));
        assert!(matrix.store().is_empty());
        assert_eq!(matrix.state(), PipelineState::Idle);
        let last = matrix.log().last().unwrap();
        assert_eq!(last.severity, Severity::Error);
        assert!(last.message.contains("timeout"));
    }

    #[test]
    fn test_begin_clears_previous_results_and_narrates() {
        let mut matrix = RecordMatrix::<Compliance>::new();
        let service = Canned(Ok(json!([finding("A-1", "High"), finding("A-2", "Low")])));
        smol::block_on(matrix.extract(&service, &[doc()])).unwrap();

        let job = matrix.begin_extraction(&[doc()]).unwrap();
        assert!(matrix.store().is_empty());
        assert!(matrix.selected().is_none());
        assert_eq!(matrix.state(), PipelineState::Running);
        assert_eq!(matrix.begin_extraction(&[doc()]).unwrap_err(), LaunchError::AlreadyRunning);

        let thinking = matrix.log().iter().filter(|e| e.severity == Severity::Thinking).count();
        assert!(thinking >= Compliance::MODULE.script().before_call.len());

        // Search and navigation stay usable while the call is pending.
        matrix.set_query("access");
        matrix.move_down();
        assert!(matrix.view().is_empty());

        let count = matrix.finish_extraction(job, Ok(json!([finding("B-1", "Medium")]))).unwrap();
        assert_eq!(count, 1);
        // Ids keep counting across runs.
        assert_eq!(matrix.store().all()[0].id().as_str(), "compliance-2");
    }

    #[test]
    fn test_stale_ids_cannot_touch_new_generation() {
        let mut matrix = RecordMatrix::<Compliance>::new();
        smol::block_on(matrix.extract(&Canned(Ok(json!([finding("A-1", "High")]))), &[doc()])).unwrap();
        let stale = matrix.store().all()[0].id().clone();

        smol::block_on(matrix.extract(&Canned(Ok(json!([finding("A-1", "High")]))), &[doc()])).unwrap();
        let outcome = matrix.patch(&stale, &[FieldUpdate::new("status", "Compliant")]).unwrap();
        assert_eq!(outcome, PatchOutcome::Missing);
        assert_eq!(matrix.store().all()[0].text("status"), "N/A");
    }

    #[test]
    fn test_reset_discards_in_flight_result() {
        let mut matrix = RecordMatrix::<Compliance>::new();
        let job = matrix.begin_extraction(&[doc()]).unwrap();
        matrix.reset();

        let err = matrix.finish_extraction(job, Ok(json!([finding("A-1", "High")]))).unwrap_err();
        assert_eq!(err, ExtractionError::Superseded);
        assert!(matrix.store().is_empty());
        assert!(matrix.log().is_empty());
        assert_eq!(matrix.state(), PipelineState::Idle);
    }

    #[test]
    fn test_search_and_navigation() {
        let mut matrix = RecordMatrix::<Compliance>::new();
        let raw = json!([finding("IAM-1", "High"), finding("NET-1", "Low"), finding("IAM-2", "Low")]);
        smol::block_on(matrix.extract(&Canned(Ok(raw)), &[doc()])).unwrap();

        matrix.set_query("iam");
        let refs: Vec<_> = matrix.view().iter().map(|r| r.text("refId")).collect();
        assert_eq!(refs, vec!["IAM-1", "IAM-2"]);

        matrix.move_down();
        assert_eq!(matrix.selected_record().unwrap().text("refId"), "IAM-2");
        matrix.move_down();
        assert_eq!(matrix.selected_record().unwrap().text("refId"), "IAM-2");

        matrix.set_query("net");
        matrix.move_up();
        assert_eq!(matrix.selected_record().unwrap().text("refId"), "NET-1");
    }

    #[test]
    fn test_admit_logs_rejection_without_state_change() {
        let mut matrix = RecordMatrix::<GapAnalysis>::new();
        let err = matrix.admit(&[doc()], &IntakePolicy::default()).unwrap_err();
        assert!(matches!(err, InputRejected::WrongCount { .. }));
        assert_eq!(matrix.state(), PipelineState::Idle);
        assert_eq!(matrix.log().len(), 1);
        assert_eq!(matrix.log().last().unwrap().severity, Severity::Error);
    }

    #[test]
    fn test_request_is_encoded_for_module() {
        let mut matrix = RecordMatrix::<GapAnalysis>::new();
        let service = Recording { seen: Mutex::new(None) };
        let docs = [
            Document::new("regulation.pdf", b"%PDF-1".to_vec()),
            Document::new("policy.pdf", b"%PDF-2".to_vec()),
        ];
        assert_eq!(smol::block_on(matrix.extract(&service, &docs)).unwrap(), 0);

        let request = service.seen.lock().unwrap().take().unwrap();
        assert_eq!(request.documents.len(), 2);
        assert_eq!(request.documents[0].name, "regulation.pdf");
        assert!(request.schema["items"]["required"]
            .as_array()
            .unwrap()
            .contains(&json!("gapStatus")));
        assert_eq!(matrix.state(), PipelineState::Succeeded { count: 0 });
    }
}
