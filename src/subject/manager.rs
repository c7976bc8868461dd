//! Subject job orchestration.
//!
//! [`SubjectJobManager`] owns the full lifecycle of a subject job: admitting
//! the request, watching the referenced detection jobs until they are all
//! terminal, pulling their errors and warnings into the subject job, writing
//! the output object, and making the single callback delivery attempt.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fg_core::events::EventPayload;
use fg_core::{Error, JobId, Result, SubjectJobId};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};

use crate::state::{BatchJob, CancellationState, JobRegistry, SubjectJob};

use super::callback::{CallbackRequest, CallbackSender, STATUS_IN_PROGRESS, STATUS_NOT_REQUESTED};
use super::output::{write_output, SubjectOutput};
use super::request::SubjectJobRequest;

/// Drives subject jobs from submission to completion.
///
/// Each submitted job gets a spawned watcher task that waits for the
/// referenced detection jobs to reach a terminal state. Completion itself is
/// guarded by a registry-side latch, so the watcher and the explicit failure
/// path ([`SubjectJobManager::complete_with_error`]) can never both write an
/// output object or fire the callback.
///
/// The manager is a cheap handle over shared state; clones drive the same
/// jobs.
#[derive(Clone)]
pub struct SubjectJobManager {
    registry: Arc<JobRegistry>,
    sender: CallbackSender,
    results_dir: PathBuf,
}

impl SubjectJobManager {
    pub fn new(
        registry: Arc<JobRegistry>,
        results_dir: impl Into<PathBuf>,
        callback_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            sender: CallbackSender::new(callback_timeout),
            results_dir: results_dir.into(),
        }
    }

    /// Validate and admit a subject job, then spawn the watcher that will
    /// complete it once every referenced detection job is terminal.
    ///
    /// Validation reports every failing field at once, and every referenced
    /// detection job must already exist.
    pub fn submit(&self, request: SubjectJobRequest) -> Result<SubjectJob> {
        request.validate()?;
        self.registry.require_jobs(&request.detection_job_ids)?;

        let job = self.registry.create_subject_job(request);
        info!(
            subject_job_id = %job.id,
            component = %job.request.component_name,
            detection_jobs = job.request.detection_job_ids.len(),
            "Created subject job"
        );

        let manager = self.clone();
        let id = job.id;
        tokio::spawn(async move { manager.watch(id).await });

        Ok(job)
    }

    /// Request cancellation of a subject job and of every detection job it
    /// references. Repeating a cancel is a no-op; cancelling a job that
    /// completed without the user's cancellation is a conflict.
    pub fn cancel(&self, id: SubjectJobId) -> Result<()> {
        let job = self.registry.require_subject_job(id)?;

        if job.is_complete() {
            return if job.cancellation_state == CancellationState::CancelledByUser {
                Ok(())
            } else {
                Err(Error::conflict(format!("Job {id} is already complete")))
            };
        }

        info!(subject_job_id = %id, "Cancellation requested for subject job");
        self.registry
            .set_subject_cancellation(id, CancellationState::CancellationInProgress);
        for job_id in &job.request.detection_job_ids {
            self.registry.cancel_job(*job_id);
        }
        Ok(())
    }

    /// Shutdown sweep: move every incomplete, not-yet-cancelled subject job
    /// straight to cancelled-by-shutdown. Returns how many were swept.
    pub fn cancel_incomplete_jobs(&self) -> usize {
        self.registry.cancel_incomplete_subject_jobs()
    }

    /// Fail a subject job outright: record `"{message}: {detail}"` as an
    /// error, then complete the job with whatever detection results exist.
    /// Returns a conflict when the job already completed.
    pub async fn complete_with_error(
        &self,
        id: SubjectJobId,
        message: &str,
        detail: &str,
    ) -> Result<()> {
        let job = self.registry.require_subject_job(id)?;

        if !self.registry.try_begin_completion(id) {
            return Err(Error::conflict(format!("Job {id} is already complete")));
        }

        warn!(subject_job_id = %id, message, detail, "Completing subject job with error");
        self.registry
            .add_subject_error(id, format!("{message}: {detail}"));

        let jobs = self.detection_jobs(&job.request.detection_job_ids);
        self.finish_latched(id, &jobs).await;
        Ok(())
    }

    /// Wait until every detection job referenced by the subject job is
    /// terminal, then aggregate. The subscription is taken before the first
    /// scan, so a job that goes terminal in between still produces a wakeup.
    async fn watch(&self, id: SubjectJobId) {
        let mut rx = self.registry.subscribe();

        let job_ids = match self.registry.subject_job(id) {
            Some(job) if !job.is_complete() => job.request.detection_job_ids.clone(),
            _ => return,
        };

        loop {
            if self.registry.all_terminal(&job_ids) {
                break;
            }

            // Sleep until an event arrives that could change the answer.
            loop {
                match rx.recv().await {
                    Ok(event) => match event.payload {
                        EventPayload::SubjectJobCompleted { subject_job_id }
                            if subject_job_id == id =>
                        {
                            // Completed on another path (failure or shutdown
                            // sweep); nothing left to do here.
                            return;
                        }
                        payload
                            if payload
                                .terminal_job_id()
                                .is_some_and(|job_id| job_ids.contains(&job_id)) =>
                        {
                            break;
                        }
                        _ => {}
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(
                            subject_job_id = %id,
                            skipped, "Subject watcher fell behind the event stream, rescanning"
                        );
                        break;
                    }
                    Err(RecvError::Closed) => return,
                }
            }
        }

        self.aggregate(id, &job_ids).await;
    }

    /// Pull errors and warnings out of the finished detection jobs, settle a
    /// pending cancellation, and finish the job.
    async fn aggregate(&self, id: SubjectJobId, job_ids: &BTreeSet<JobId>) {
        let jobs = self.detection_jobs(job_ids);

        self.registry.mark_subject_retrieved(
            id,
            jobs.iter().flat_map(|job| job.errors.iter().cloned()),
            jobs.iter().flat_map(|job| job.warnings.iter().cloned()),
        );

        // A cancel requested while the detection jobs wound down is confirmed
        // now that their runs have stopped.
        match self.registry.subject_job(id) {
            Some(job) if job.cancellation_state == CancellationState::CancellationInProgress => {
                self.registry
                    .set_subject_cancellation(id, CancellationState::CancelledByUser);
            }
            Some(_) => {}
            None => return,
        }

        if !self.registry.try_begin_completion(id) {
            return;
        }
        self.finish_latched(id, &jobs).await;
    }

    /// Completion body. The caller must hold the completion latch.
    async fn finish_latched(&self, id: SubjectJobId, jobs: &[BatchJob]) {
        let Some(subject) = self.registry.subject_job(id) else {
            return;
        };

        let output = SubjectOutput::build(&subject, jobs);
        match write_output(&self.results_dir, &output) {
            Ok(uri) => {
                info!(subject_job_id = %id, uri = %uri, "Wrote subject output object");
                self.registry.set_subject_output(id, uri);
            }
            Err(e) => {
                warn!(subject_job_id = %id, error = %e, "Could not write subject output object");
                self.registry
                    .add_subject_error(id, format!("Failed to create output object due to: {e}"));
            }
        }

        self.registry.complete_subject_job(id);

        // Re-read so the callback reports the final output URI.
        if let Some(subject) = self.registry.subject_job(id) {
            self.attempt_callback(&subject).await;
        }
    }

    /// The single callback delivery attempt. The outcome is recorded on the
    /// job either way; a failed delivery does not fail the job.
    async fn attempt_callback(&self, subject: &SubjectJob) {
        let Some(url) = subject.request.callback_url.as_deref() else {
            self.registry
                .set_subject_callback_status(subject.id, STATUS_NOT_REQUESTED);
            return;
        };

        self.registry
            .set_subject_callback_status(subject.id, STATUS_IN_PROGRESS);

        let callback = CallbackRequest {
            job_id: subject.id,
            url,
            method: subject.request.effective_callback_method(),
            external_id: subject.request.external_id.as_deref(),
            output_object_uri: subject.output_uri.as_deref(),
        };
        let status = self.sender.deliver(&callback).await;
        self.registry
            .set_subject_callback_status(subject.id, status);
    }

    fn detection_jobs(&self, ids: &BTreeSet<JobId>) -> Vec<BatchJob> {
        ids.iter()
            .filter_map(|job_id| self.registry.job(*job_id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Arc;
    use std::time::Duration;

    use fg_core::{Media, MediaKind};
    use fg_pipeline::{Action, Pipeline, RunReport};
    use tempfile::TempDir;

    use crate::subject::request::tests::valid_request;

    use super::*;

    fn manager(registry: &Arc<JobRegistry>, results: &TempDir) -> SubjectJobManager {
        SubjectJobManager::new(
            Arc::clone(registry),
            results.path(),
            Duration::from_secs(1),
        )
    }

    fn queued_job(registry: &JobRegistry) -> BatchJob {
        let pipeline = Pipeline::new(
            "FACE PIPELINE",
            vec![Action::new("FACE ACTION", "FACECV")],
        )
        .unwrap();
        registry.create_job(
            Arc::new(pipeline),
            vec![Media::new("file:///video.mp4", MediaKind::Video, 100)],
            HashMap::new(),
        )
    }

    async fn wait_complete(registry: &JobRegistry, id: SubjectJobId) -> SubjectJob {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(job) = registry.subject_job(id) {
                    if job.is_complete() {
                        return job;
                    }
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("subject job did not complete in time")
    }

    #[tokio::test]
    async fn submit_rejects_unknown_detection_jobs() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let err = manager.submit(valid_request()).unwrap_err();
        assert_eq!(err.to_string(), "Could not find job with id 1");
    }

    #[tokio::test]
    async fn submit_rejects_invalid_requests_before_checking_jobs() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let mut request = valid_request();
        request.component_name = "not valid!".into();
        let err = manager.submit(request).unwrap_err();
        assert!(matches!(err, Error::InvalidRequest { .. }));
    }

    #[tokio::test]
    async fn subject_job_completes_once_detection_jobs_finish() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let batch = queued_job(&registry);
        let mut request = valid_request();
        request.detection_job_ids = BTreeSet::from([batch.id]);
        let subject = manager.submit(request).unwrap();

        registry.start_job(batch.id);
        registry.finish_job(
            batch.id,
            &RunReport {
                segments_run: 3,
                detections: 7,
                errors: vec!["segment 2 failed".into()],
                ..Default::default()
            },
        );

        let done = wait_complete(&registry, subject.id).await;
        assert!(done.retrieved_detection_jobs);
        assert!(done.errors.contains("segment 2 failed"));
        assert_eq!(done.callback_status.as_deref(), Some(STATUS_NOT_REQUESTED));

        let uri = done.output_uri.expect("output object should exist");
        let path = uri.strip_prefix("file://").unwrap();
        let body = std::fs::read_to_string(path).unwrap();
        assert!(body.contains("\"detections\": 7"));
    }

    #[tokio::test]
    async fn submit_over_already_finished_jobs_completes_immediately() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let batch = queued_job(&registry);
        registry.start_job(batch.id);
        registry.finish_job(batch.id, &RunReport::default());

        let mut request = valid_request();
        request.detection_job_ids = BTreeSet::from([batch.id]);
        let subject = manager.submit(request).unwrap();

        let done = wait_complete(&registry, subject.id).await;
        assert!(done.retrieved_detection_jobs);
        assert_eq!(done.cancellation_state, CancellationState::NotCancelled);
    }

    #[tokio::test]
    async fn cancel_of_unknown_subject_job_is_an_error() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let err = manager.cancel(SubjectJobId::new(41)).unwrap_err();
        assert!(matches!(err, Error::UnknownJob { .. }));
    }

    #[tokio::test]
    async fn cancel_is_confirmed_once_detection_jobs_stop() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let batch = queued_job(&registry);
        let mut request = valid_request();
        request.detection_job_ids = BTreeSet::from([batch.id]);
        let subject = manager.submit(request).unwrap();

        registry.start_job(batch.id);
        manager.cancel(subject.id).unwrap();
        // Repeating the cancel while one is in progress changes nothing.
        manager.cancel(subject.id).unwrap();

        assert!(registry.job(batch.id).unwrap().cancellation.is_cancelled());
        assert_eq!(
            registry.subject_job(subject.id).unwrap().cancellation_state,
            CancellationState::CancellationInProgress
        );

        registry.finish_job(
            batch.id,
            &RunReport {
                cancelled: true,
                ..Default::default()
            },
        );

        let done = wait_complete(&registry, subject.id).await;
        assert_eq!(done.cancellation_state, CancellationState::CancelledByUser);
        assert!(done.output_uri.is_some());
    }

    #[tokio::test]
    async fn cancel_after_completion_is_a_conflict() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let batch = queued_job(&registry);
        registry.start_job(batch.id);
        registry.finish_job(batch.id, &RunReport::default());

        let mut request = valid_request();
        request.detection_job_ids = BTreeSet::from([batch.id]);
        let subject = manager.submit(request).unwrap();
        wait_complete(&registry, subject.id).await;

        let err = manager.cancel(subject.id).unwrap_err();
        assert_eq!(
            err.to_string(),
            format!("Conflict: Job {} is already complete", subject.id)
        );
    }

    #[tokio::test]
    async fn cancel_of_already_cancelled_complete_job_is_a_no_op() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let batch = queued_job(&registry);
        let mut request = valid_request();
        request.detection_job_ids = BTreeSet::from([batch.id]);
        let subject = manager.submit(request).unwrap();

        registry.start_job(batch.id);
        manager.cancel(subject.id).unwrap();
        registry.finish_job(
            batch.id,
            &RunReport {
                cancelled: true,
                ..Default::default()
            },
        );
        wait_complete(&registry, subject.id).await;

        assert!(manager.cancel(subject.id).is_ok());
    }

    #[tokio::test]
    async fn complete_with_error_records_the_failure_and_finishes() {
        let registry = JobRegistry::new();
        let results = TempDir::new().unwrap();
        let manager = manager(&registry, &results);

        let batch = queued_job(&registry);
        let mut request = valid_request();
        request.detection_job_ids = BTreeSet::from([batch.id]);
        let subject = manager.submit(request).unwrap();

        manager
            .complete_with_error(subject.id, "Could not start the component", "exit code 3")
            .await
            .unwrap();

        let done = registry.subject_job(subject.id).unwrap();
        assert!(done.is_complete());
        assert!(done
            .errors
            .contains("Could not start the component: exit code 3"));
        assert!(done.output_uri.is_some());

        let err = manager
            .complete_with_error(subject.id, "again", "again")
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Conflict(_)));
    }
}
