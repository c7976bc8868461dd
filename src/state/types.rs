use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use fg_core::{JobId, Media, SubjectJobId};
use fg_pipeline::{Pipeline, ProcessingTimeLedger, TimeEntry};

use crate::subject::request::SubjectJobRequest;

#[derive(Debug, Clone)]
pub struct BatchJob {
    pub id: JobId,
    pub pipeline: Arc<Pipeline>,
    pub media: Vec<Media>,
    pub properties: HashMap<String, String>,
    pub status: BatchJobStatus,
    /// Sorted and de-duplicated so reports are stable.
    pub errors: BTreeSet<String>,
    pub warnings: BTreeSet<String>,
    pub detections: u64,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    /// Shared with the segment workers that record into it.
    pub ledger: Arc<ProcessingTimeLedger>,
    pub cancellation: CancellationToken,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BatchJobStatus {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl BatchJobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BatchJobStatus::Completed | BatchJobStatus::Failed | BatchJobStatus::Cancelled
        )
    }
}

impl BatchJob {
    pub fn new(
        id: JobId,
        pipeline: Arc<Pipeline>,
        media: Vec<Media>,
        properties: HashMap<String, String>,
    ) -> Self {
        Self {
            id,
            pipeline,
            media,
            properties,
            status: BatchJobStatus::Queued,
            errors: BTreeSet::new(),
            warnings: BTreeSet::new(),
            detections: 0,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
            ledger: Arc::new(ProcessingTimeLedger::new()),
            cancellation: CancellationToken::new(),
        }
    }

    pub fn start(&mut self) {
        self.status = BatchJobStatus::Running;
        self.started_at = Some(Utc::now());
    }

    pub fn complete(&mut self) {
        self.status = BatchJobStatus::Completed;
        self.completed_at = Some(Utc::now());
    }

    pub fn fail(&mut self, error: &str) {
        self.status = BatchJobStatus::Failed;
        self.errors.insert(error.to_string());
        self.completed_at = Some(Utc::now());
    }

    pub fn cancel(&mut self) {
        self.status = BatchJobStatus::Cancelled;
        self.completed_at = Some(Utc::now());
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.insert(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.insert(message.into());
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Aggregate processing time across the job's pipeline. Accumulated only
    /// when every action is fully timed.
    pub fn processing_total(&self) -> TimeEntry {
        self.ledger.total(&self.pipeline)
    }
}

/// Cancellation progresses in one direction only; both cancelled flavors are
/// terminal and a repeat cancel of a cancelled job is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CancellationState {
    NotCancelled,
    CancellationInProgress,
    CancelledByUser,
    CancelledByShutdown,
}

impl CancellationState {
    pub fn is_cancelled(self) -> bool {
        matches!(
            self,
            CancellationState::CancelledByUser | CancellationState::CancelledByShutdown
        )
    }

    /// Whether moving to `next` is a forward transition.
    pub fn can_transition_to(self, next: CancellationState) -> bool {
        match self {
            CancellationState::NotCancelled => next != CancellationState::NotCancelled,
            CancellationState::CancellationInProgress => next.is_cancelled(),
            CancellationState::CancelledByUser | CancellationState::CancelledByShutdown => false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct SubjectJob {
    pub id: SubjectJobId,
    /// The validated request, echoed back in every view.
    pub request: SubjectJobRequest,
    pub time_received: DateTime<Utc>,
    pub time_completed: Option<DateTime<Utc>>,
    /// Flipped exactly once, when aggregation has pulled every underlying
    /// job's results.
    pub retrieved_detection_jobs: bool,
    pub cancellation_state: CancellationState,
    pub errors: BTreeSet<String>,
    pub warnings: BTreeSet<String>,
    /// Where the output object was written; internal view only.
    pub output_uri: Option<String>,
    /// Unset until a callback attempt has been made (or skipped for lack of
    /// a URL); internal view only.
    pub callback_status: Option<String>,
    /// Latch taken by the completion path so the output object and the
    /// callback attempt happen exactly once.
    pub completion_started: bool,
}

impl SubjectJob {
    pub fn new(id: SubjectJobId, request: SubjectJobRequest) -> Self {
        Self {
            id,
            request,
            time_received: Utc::now(),
            time_completed: None,
            retrieved_detection_jobs: false,
            cancellation_state: CancellationState::NotCancelled,
            errors: BTreeSet::new(),
            warnings: BTreeSet::new(),
            output_uri: None,
            callback_status: None,
            completion_started: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.time_completed.is_some()
    }

    /// Set the completion timestamp. The end never precedes the start, even
    /// if the wall clock stepped backwards in between.
    pub fn complete(&mut self) {
        if self.time_completed.is_none() {
            self.time_completed = Some(Utc::now().max(self.time_received));
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.errors.insert(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.insert(message.into());
    }
}
