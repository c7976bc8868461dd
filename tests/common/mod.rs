//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which wires a [`JobRegistry`] and a
//! [`SubjectJobManager`] writing into a temp results directory. The
//! [`with_processor`] constructor also spawns the background job processor
//! with scripted detection components, so queued jobs actually run.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::{mpsc, Notify, Semaphore};
use tokio::task::JoinHandle;

use fg_core::{JobId, Media, MediaKind, Result, SubjectJobId};
use fg_pipeline::{
    Action, DetectionComponent, Pipeline, SegmentContext, SegmentOutcome, SegmentRunner,
};
use framegrid::processor::JobProcessor;
use framegrid::state::{BatchJob, JobRegistry, SubjectJob};
use framegrid::subject::{SubjectJobManager, SubjectJobRequest};

/// Frames per segment used by [`TestHarness::with_processor`].
pub const SEGMENT_FRAMES: u32 = 50;

/// Emits a fixed number of detections for every segment.
pub struct FixedDetections(pub u32);

#[async_trait]
impl DetectionComponent for FixedDetections {
    async fn run_segment(&self, _ctx: &SegmentContext) -> Result<SegmentOutcome> {
        Ok(SegmentOutcome { detections: self.0 })
    }
}

/// Fails every segment with a message naming the algorithm and the media.
pub struct BrokenComponent;

#[async_trait]
impl DetectionComponent for BrokenComponent {
    async fn run_segment(&self, ctx: &SegmentContext) -> Result<SegmentOutcome> {
        Err(fg_core::Error::Internal(format!(
            "{} cannot process {}",
            ctx.algorithm, ctx.media.uri
        )))
    }
}

/// Signals entry, then holds the segment until a permit is released. Lets a
/// test act while a single-segment job is verifiably mid-run.
pub struct GatedComponent {
    pub entered: Arc<Notify>,
    pub release: Arc<Semaphore>,
}

#[async_trait]
impl DetectionComponent for GatedComponent {
    async fn run_segment(&self, _ctx: &SegmentContext) -> Result<SegmentOutcome> {
        self.entered.notify_one();
        let permit = self.release.acquire().await.expect("gate dropped");
        permit.forget();
        Ok(SegmentOutcome { detections: 1 })
    }
}

/// Test harness wrapping a [`JobRegistry`] and [`SubjectJobManager`] backed
/// by a temp results directory.
pub struct TestHarness {
    pub registry: Arc<JobRegistry>,
    pub manager: SubjectJobManager,
    pub results: TempDir,
    /// Signalled when the `GATED` component enters a segment.
    pub gate_entered: Arc<Notify>,
    /// Each permit lets one held `GATED` segment finish.
    pub gate_release: Arc<Semaphore>,
    processor: Option<(mpsc::Sender<()>, JoinHandle<()>)>,
}

impl TestHarness {
    /// Registry and manager only; detection jobs are driven by hand.
    pub fn new() -> Self {
        let registry = JobRegistry::new();
        let results = TempDir::new().expect("failed to create results dir");
        let manager = SubjectJobManager::new(
            Arc::clone(&registry),
            results.path(),
            Duration::from_secs(2),
        );
        Self {
            registry,
            manager,
            results,
            gate_entered: Arc::new(Notify::new()),
            gate_release: Arc::new(Semaphore::new(0)),
            processor: None,
        }
    }

    /// Harness plus a running job processor. `FACECV` emits two detections
    /// per segment, `BROKEN` fails every segment, and `GATED` blocks until
    /// the harness gate releases it.
    pub fn with_processor() -> Self {
        let mut harness = Self::new();

        let mut runner = SegmentRunner::new(SEGMENT_FRAMES);
        runner.register("FACECV", Arc::new(FixedDetections(2)));
        runner.register("BROKEN", Arc::new(BrokenComponent));
        runner.register(
            "GATED",
            Arc::new(GatedComponent {
                entered: Arc::clone(&harness.gate_entered),
                release: Arc::clone(&harness.gate_release),
            }),
        );

        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        let processor = JobProcessor::new(
            Arc::clone(&harness.registry),
            Arc::new(runner),
            None,
            shutdown_rx,
        );
        harness.processor = Some((shutdown_tx, tokio::spawn(processor.run())));
        harness
    }

    /// Queue a single-action batch job over one video.
    pub fn queue_video_job(&self, algorithm: &str, frames: u32) -> BatchJob {
        let pipeline = Pipeline::new(
            format!("{algorithm} PIPELINE"),
            vec![Action::new(format!("{algorithm} ACTION"), algorithm)],
        )
        .expect("pipeline should validate");
        self.registry.create_job(
            Arc::new(pipeline),
            vec![Media::new(
                "file:///media/input.mp4",
                MediaKind::Video,
                frames,
            )],
            HashMap::new(),
        )
    }

    /// A valid submission naming the given detection jobs.
    pub fn request_over(&self, jobs: &[JobId]) -> SubjectJobRequest {
        SubjectJobRequest {
            component_name: "SUBJECT".to_string(),
            priority: None,
            detection_job_ids: jobs.iter().copied().collect(),
            job_properties: HashMap::new(),
            callback_url: None,
            callback_method: None,
            external_id: None,
        }
    }

    /// Poll until the subject job completes, or panic after five seconds.
    pub async fn wait_subject(&self, id: SubjectJobId) -> SubjectJob {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if let Some(job) = self.registry.subject_job(id) {
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

    /// Stop the job processor, if one was started.
    pub async fn shutdown(mut self) {
        if let Some((shutdown_tx, handle)) = self.processor.take() {
            let _ = shutdown_tx.send(()).await;
            let _ = handle.await;
        }
    }
}
