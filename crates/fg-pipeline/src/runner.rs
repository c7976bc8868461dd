//! Segment runner: executes each pipeline action across frame-range segments
//! of a job's media, concurrently, feeding the processing-time ledger.
//!
//! Actions run in declared order; within one action every eligible segment
//! runs in parallel on the tokio runtime. A failed segment poisons that
//! action's ledger entry and records an error on the job, but never aborts
//! the remaining segments or actions. Cancellation is checked between
//! actions and at segment start; segments already in flight run to
//! completion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use fg_core::{Error, JobId, Media, MediaKind, Result};

use crate::component::{DetectionComponent, SegmentContext, SegmentOutcome};
use crate::model::Pipeline;
use crate::timing::ProcessingTimeLedger;

/// Outcome of one batch-job run.
#[derive(Debug, Default)]
pub struct RunReport {
    /// Segments that completed successfully.
    pub segments_run: usize,
    /// Total detections across all completed segments.
    pub detections: u64,
    /// One message per failed segment execution.
    pub errors: Vec<String>,
    /// True when the run stopped early because of cancellation.
    pub cancelled: bool,
}

/// Runs batch jobs by fanning each pipeline action out over media segments.
pub struct SegmentRunner {
    components: HashMap<String, Arc<dyn DetectionComponent>>,
    segment_frames: u32,
}

impl SegmentRunner {
    /// Create a runner that cuts media into segments of at most
    /// `segment_frames` frames.
    pub fn new(segment_frames: u32) -> Self {
        Self {
            components: HashMap::new(),
            segment_frames: segment_frames.max(1),
        }
    }

    /// Register the component implementing `algorithm`.
    pub fn register(&mut self, algorithm: impl Into<String>, component: Arc<dyn DetectionComponent>) {
        self.components.insert(algorithm.into(), component);
    }

    fn component(&self, algorithm: &str) -> Result<Arc<dyn DetectionComponent>> {
        self.components.get(algorithm).cloned().ok_or_else(|| {
            Error::invalid_configuration(format!(
                "no component registered for algorithm {algorithm}"
            ))
        })
    }

    /// Split a media item into inclusive frame ranges.
    fn segments(&self, media: &Media) -> Vec<(u32, u32)> {
        let frames = media.frames.max(1);
        let mut ranges = Vec::new();
        let mut start = 0;
        while start < frames {
            let end = (start + self.segment_frames).min(frames) - 1;
            ranges.push((start, end));
            start = end + 1;
        }
        ranges
    }

    /// Execute every action of `pipeline` over `media`, recording per-action
    /// processing time into `ledger`.
    ///
    /// Media whose kind falls outside `restriction` (when present) are not
    /// processed at all. A missing component for any action's algorithm fails
    /// the whole run before the first segment starts.
    #[allow(clippy::too_many_arguments)]
    pub async fn run_job(
        &self,
        job_id: JobId,
        pipeline: &Pipeline,
        media: &[Media],
        job_properties: &HashMap<String, String>,
        restriction: Option<&[MediaKind]>,
        ledger: &ProcessingTimeLedger,
        cancel: &CancellationToken,
    ) -> Result<RunReport> {
        // Resolve every component up front so a bad algorithm name fails the
        // job before any work runs.
        let mut resolved = Vec::with_capacity(pipeline.len());
        for action in pipeline.actions() {
            resolved.push((action, self.component(&action.algorithm)?));
        }

        let eligible: Vec<&Media> = media
            .iter()
            .filter(|m| match restriction {
                Some(kinds) => kinds.contains(&m.kind),
                None => true,
            })
            .collect();
        if eligible.len() < media.len() {
            tracing::debug!(
                job_id = %job_id,
                skipped = media.len() - eligible.len(),
                "media excluded by media-type restriction"
            );
        }

        let mut report = RunReport::default();
        for (action, component) in resolved {
            // Check cancellation between actions.
            if cancel.is_cancelled() {
                tracing::info!(job_id = %job_id, "job run cancelled");
                report.cancelled = true;
                return Ok(report);
            }

            tracing::info!(job_id = %job_id, action = %action.name, "starting action");
            let mut workers: JoinSet<Option<(SegmentContext, Result<SegmentOutcome>, i64)>> =
                JoinSet::new();
            for m in &eligible {
                for (frame_start, frame_end) in self.segments(m) {
                    let ctx = SegmentContext {
                        job_id,
                        action: action.name.clone(),
                        algorithm: action.algorithm.clone(),
                        media: (*m).clone(),
                        frame_start,
                        frame_end,
                        properties: action.merged_properties(job_properties),
                    };
                    let component = Arc::clone(&component);
                    let cancel = cancel.clone();
                    workers.spawn(async move {
                        if cancel.is_cancelled() {
                            return None;
                        }
                        let started = Instant::now();
                        let outcome = component.run_segment(&ctx).await;
                        let elapsed =
                            i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);
                        Some((ctx, outcome, elapsed))
                    });
                }
            }

            while let Some(joined) = workers.join_next().await {
                match joined {
                    Ok(Some((_, Ok(outcome), elapsed))) => {
                        ledger.record(&action.name, elapsed);
                        report.segments_run += 1;
                        report.detections += u64::from(outcome.detections);
                    }
                    Ok(Some((ctx, Err(e), _))) => {
                        ledger.record(&action.name, -1);
                        report.errors.push(format!(
                            "Action {} failed on frames {}-{} of {}: {e}",
                            ctx.action, ctx.frame_start, ctx.frame_end, ctx.media.uri
                        ));
                    }
                    Ok(None) => {
                        // Segment skipped at start because of cancellation.
                    }
                    Err(join_err) => {
                        ledger.record(&action.name, -1);
                        report.errors.push(format!(
                            "Action {} worker did not finish: {join_err}",
                            action.name
                        ));
                    }
                }
            }
        }

        report.cancelled = cancel.is_cancelled();
        Ok(report)
    }
}
