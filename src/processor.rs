use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;

use fg_core::MediaKind;
use fg_pipeline::SegmentRunner;

use crate::state::JobRegistry;

/// Background worker that runs queued batch jobs through the segment runner.
pub struct JobProcessor {
    registry: Arc<JobRegistry>,
    runner: Arc<SegmentRunner>,
    /// Media kinds this process is allowed to work on. `None` means all.
    restriction: Option<Vec<MediaKind>>,
    shutdown_rx: mpsc::Receiver<()>,
}

impl JobProcessor {
    pub fn new(
        registry: Arc<JobRegistry>,
        runner: Arc<SegmentRunner>,
        restriction: Option<Vec<MediaKind>>,
        shutdown_rx: mpsc::Receiver<()>,
    ) -> Self {
        Self {
            registry,
            runner,
            restriction,
            shutdown_rx,
        }
    }

    /// Start processing jobs from the queue
    pub async fn run(mut self) {
        tracing::info!("Job processor started");

        loop {
            // Check for shutdown signal with a timeout
            tokio::select! {
                biased;

                _ = self.shutdown_rx.recv() => {
                    tracing::info!("Job processor shutting down");
                    break;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    // Continue to process jobs
                }
            }

            self.process_next_job().await;
        }
    }

    async fn process_next_job(&self) {
        // Get next job from queue
        let Some(job_id) = self.registry.dequeue_job() else {
            // No jobs, wait a bit longer
            tokio::time::sleep(Duration::from_millis(400)).await;
            return;
        };

        let Some(job) = self.registry.job(job_id) else {
            return;
        };

        tracing::info!(
            "Processing job {} with pipeline {}",
            job_id,
            job.pipeline.name()
        );
        self.registry.start_job(job_id);

        let result = self
            .runner
            .run_job(
                job_id,
                &job.pipeline,
                &job.media,
                &job.properties,
                self.restriction.as_deref(),
                &job.ledger,
                &job.cancellation,
            )
            .await;

        match result {
            Ok(report) => {
                if report.cancelled {
                    tracing::info!(
                        "Job {} cancelled after {} segments",
                        job_id,
                        report.segments_run
                    );
                } else {
                    tracing::info!(
                        "Job {} completed: {} segments, {} detections, {} errors",
                        job_id,
                        report.segments_run,
                        report.detections,
                        report.errors.len()
                    );
                }
                self.registry.finish_job(job_id, &report);
            }
            Err(e) => {
                tracing::error!("Job {} failed: {}", job_id, e);
                self.registry.fail_job(job_id, &e.to_string());
            }
        }
    }
}
