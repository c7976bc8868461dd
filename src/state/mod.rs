mod types;

pub use types::*;

use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;

use fg_core::events::{Event, EventBus, EventPayload};
use fg_core::{Error, JobId, Media, Result, SubjectJobId};
use fg_pipeline::{Pipeline, RunReport};

use crate::subject::request::SubjectJobRequest;

/// In-memory registry of batch and subject jobs.
///
/// All mutation happens under the registry's write locks; terminal
/// transitions clone the updated record out, release the lock, and only then
/// broadcast, so any observer woken by a completion event is guaranteed to
/// read the already-published state.
pub struct JobRegistry {
    jobs: RwLock<HashMap<JobId, BatchJob>>,
    subject_jobs: RwLock<HashMap<SubjectJobId, SubjectJob>>,
    queue: RwLock<VecDeque<JobId>>,
    next_job_id: AtomicI64,
    next_subject_job_id: AtomicI64,
    events: EventBus,
}

impl JobRegistry {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            jobs: RwLock::new(HashMap::new()),
            subject_jobs: RwLock::new(HashMap::new()),
            queue: RwLock::new(VecDeque::new()),
            next_job_id: AtomicI64::new(1),
            next_subject_job_id: AtomicI64::new(1),
            events: EventBus::default(),
        })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    // -- Batch jobs ----------------------------------------------------------

    /// Create a batch job and queue it for execution.
    pub fn create_job(
        &self,
        pipeline: Arc<Pipeline>,
        media: Vec<Media>,
        properties: HashMap<String, String>,
    ) -> BatchJob {
        let id = JobId::new(self.next_job_id.fetch_add(1, Ordering::SeqCst));
        let job = BatchJob::new(id, pipeline, media, properties);

        {
            let mut jobs = self.jobs.write();
            jobs.insert(id, job.clone());
        }
        {
            let mut queue = self.queue.write();
            queue.push_back(id);
        }

        self.events.broadcast(EventPayload::JobQueued { job_id: id });
        job
    }

    pub fn job(&self, id: JobId) -> Option<BatchJob> {
        self.jobs.read().get(&id).cloned()
    }

    /// Verify that every referenced batch job exists.
    pub fn require_jobs(&self, ids: &BTreeSet<JobId>) -> Result<()> {
        let jobs = self.jobs.read();
        for id in ids {
            if !jobs.contains_key(id) {
                return Err(Error::unknown_job(*id));
            }
        }
        Ok(())
    }

    /// True when every referenced batch job has reached a terminal state.
    pub fn all_terminal(&self, ids: &BTreeSet<JobId>) -> bool {
        let jobs = self.jobs.read();
        ids.iter()
            .all(|id| jobs.get(id).is_some_and(|job| job.is_terminal()))
    }

    /// Take the next queued job id, if any.
    pub fn dequeue_job(&self) -> Option<JobId> {
        self.queue.write().pop_front()
    }

    pub fn start_job(&self, id: JobId) {
        {
            let mut jobs = self.jobs.write();
            if let Some(job) = jobs.get_mut(&id) {
                job.start();
            }
        }
        self.events.broadcast(EventPayload::JobStarted { job_id: id });
    }

    /// Record a finished run. A cancelled run lands in `Cancelled`; anything
    /// else lands in `Completed`, with per-segment errors merged in.
    pub fn finish_job(&self, id: JobId, report: &RunReport) {
        let cancelled = {
            let mut jobs = self.jobs.write();
            match jobs.get_mut(&id) {
                Some(job) => {
                    for error in &report.errors {
                        job.add_error(error.clone());
                    }
                    job.detections += report.detections;
                    if report.cancelled {
                        job.cancel();
                    } else {
                        job.complete();
                    }
                    report.cancelled
                }
                None => return,
            }
        };

        if cancelled {
            self.events.broadcast(EventPayload::JobCancelled { job_id: id });
        } else {
            self.events.broadcast(EventPayload::JobCompleted { job_id: id });
        }
    }

    /// Record a run that could not execute at all.
    pub fn fail_job(&self, id: JobId, error: &str) {
        {
            let mut jobs = self.jobs.write();
            match jobs.get_mut(&id) {
                Some(job) => job.fail(error),
                None => return,
            }
        }
        self.events.broadcast(EventPayload::JobFailed {
            job_id: id,
            error: error.to_string(),
        });
    }

    /// Fire-and-forget cancellation: trip the job's token and return. Workers
    /// observe the token at their own granularity; the job reaches its
    /// terminal state when its run does.
    pub fn cancel_job(&self, id: JobId) {
        let jobs = self.jobs.read();
        if let Some(job) = jobs.get(&id) {
            job.cancellation.cancel();
        }
    }

    // -- Subject jobs --------------------------------------------------------

    /// Create a subject job from an already-validated request.
    pub fn create_subject_job(&self, request: SubjectJobRequest) -> SubjectJob {
        let id = SubjectJobId::new(self.next_subject_job_id.fetch_add(1, Ordering::SeqCst));
        let job = SubjectJob::new(id, request);

        {
            let mut subject_jobs = self.subject_jobs.write();
            subject_jobs.insert(id, job.clone());
        }

        self.events
            .broadcast(EventPayload::SubjectJobCreated { subject_job_id: id });
        job
    }

    pub fn subject_job(&self, id: SubjectJobId) -> Option<SubjectJob> {
        self.subject_jobs.read().get(&id).cloned()
    }

    pub fn require_subject_job(&self, id: SubjectJobId) -> Result<SubjectJob> {
        self.subject_job(id).ok_or_else(|| Error::unknown_job(id))
    }

    /// Pull the given errors and warnings into the subject job and flip the
    /// retrieval flag.
    pub fn mark_subject_retrieved(
        &self,
        id: SubjectJobId,
        errors: impl IntoIterator<Item = String>,
        warnings: impl IntoIterator<Item = String>,
    ) {
        let mut subject_jobs = self.subject_jobs.write();
        if let Some(job) = subject_jobs.get_mut(&id) {
            for error in errors {
                job.add_error(error);
            }
            for warning in warnings {
                job.add_warning(warning);
            }
            job.retrieved_detection_jobs = true;
        }
    }

    pub fn add_subject_error(&self, id: SubjectJobId, message: impl Into<String>) {
        let mut subject_jobs = self.subject_jobs.write();
        if let Some(job) = subject_jobs.get_mut(&id) {
            job.add_error(message);
        }
    }

    pub fn set_subject_output(&self, id: SubjectJobId, uri: impl Into<String>) {
        let mut subject_jobs = self.subject_jobs.write();
        if let Some(job) = subject_jobs.get_mut(&id) {
            job.output_uri = Some(uri.into());
        }
    }

    pub fn set_subject_callback_status(&self, id: SubjectJobId, status: impl Into<String>) {
        let mut subject_jobs = self.subject_jobs.write();
        if let Some(job) = subject_jobs.get_mut(&id) {
            job.callback_status = Some(status.into());
        }
    }

    /// Claim the completion path for a subject job. Returns false when the
    /// job is already complete or another caller holds the latch.
    pub fn try_begin_completion(&self, id: SubjectJobId) -> bool {
        let mut subject_jobs = self.subject_jobs.write();
        match subject_jobs.get_mut(&id) {
            Some(job) if !job.is_complete() && !job.completion_started => {
                job.completion_started = true;
                true
            }
            _ => false,
        }
    }

    /// Move a subject job's cancellation state forward. Backward transitions
    /// are ignored, which is what makes repeat cancels no-ops, and a
    /// completed job can no longer enter `CancellationInProgress`.
    pub fn set_subject_cancellation(&self, id: SubjectJobId, state: CancellationState) {
        let changed = {
            let mut subject_jobs = self.subject_jobs.write();
            match subject_jobs.get_mut(&id) {
                Some(job)
                    if job.cancellation_state.can_transition_to(state)
                        && !(state == CancellationState::CancellationInProgress
                            && job.is_complete()) =>
                {
                    job.cancellation_state = state;
                    true
                }
                _ => false,
            }
        };

        if changed && state == CancellationState::CancellationInProgress {
            self.events
                .broadcast(EventPayload::SubjectJobCancellationRequested {
                    subject_job_id: id,
                });
        }
    }

    /// Set the completion timestamp and announce completion.
    pub fn complete_subject_job(&self, id: SubjectJobId) {
        {
            let mut subject_jobs = self.subject_jobs.write();
            match subject_jobs.get_mut(&id) {
                Some(job) => job.complete(),
                None => return,
            }
        }
        self.events
            .broadcast(EventPayload::SubjectJobCompleted { subject_job_id: id });
    }

    /// One page of subject jobs, newest id first. `page` is 1-based.
    pub fn subject_job_page(&self, page: usize, page_len: usize) -> Vec<SubjectJob> {
        let mut jobs: Vec<SubjectJob> = self.subject_jobs.read().values().cloned().collect();
        jobs.sort_by(|a, b| b.id.cmp(&a.id));
        jobs.into_iter()
            .skip(page.saturating_sub(1).saturating_mul(page_len))
            .take(page_len)
            .collect()
    }

    /// Shutdown sweep: every incomplete, not-yet-cancelled subject job goes
    /// straight to `CancelledByShutdown` with its end timestamp set, and the
    /// batch jobs it references get their cancellation tokens tripped.
    /// Returns the number of jobs swept.
    pub fn cancel_incomplete_subject_jobs(&self) -> usize {
        let swept: Vec<(SubjectJobId, BTreeSet<JobId>)> = {
            let mut subject_jobs = self.subject_jobs.write();
            subject_jobs
                .values_mut()
                .filter(|job| {
                    !job.is_complete()
                        && job.cancellation_state == CancellationState::NotCancelled
                })
                .map(|job| {
                    job.cancellation_state = CancellationState::CancelledByShutdown;
                    job.complete();
                    (job.id, job.request.detection_job_ids.clone())
                })
                .collect()
        };

        for (subject_job_id, detection_job_ids) in &swept {
            for job_id in detection_job_ids {
                self.cancel_job(*job_id);
            }
            self.events.broadcast(EventPayload::SubjectJobCompleted {
                subject_job_id: *subject_job_id,
            });
        }
        swept.len()
    }
}
