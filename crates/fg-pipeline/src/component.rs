//! The [`DetectionComponent`] trait defines the external algorithm boundary.
//!
//! The bookkeeping core never decodes media or runs detection itself.
//! It hands a [`SegmentContext`] to a component and records what came back:
//! an outcome plus elapsed wall time on success, a poisoning measurement on
//! failure.

use std::collections::HashMap;

use async_trait::async_trait;

use fg_core::{JobId, Media};

/// Everything a component needs to process one segment of one media item.
#[derive(Debug, Clone)]
pub struct SegmentContext {
    /// The batch job this segment belongs to.
    pub job_id: JobId,
    /// Name of the pipeline action being executed.
    pub action: String,
    /// Algorithm the action invokes.
    pub algorithm: String,
    /// The media item the segment was cut from.
    pub media: Media,
    /// First frame of the segment (inclusive).
    pub frame_start: u32,
    /// Last frame of the segment (inclusive).
    pub frame_end: u32,
    /// Action properties overlaid with job properties.
    pub properties: HashMap<String, String>,
}

/// Result of a successfully processed segment.
#[derive(Debug, Clone, Default)]
pub struct SegmentOutcome {
    /// Number of detections produced for this segment.
    pub detections: u32,
}

/// A detection algorithm living behind the component boundary.
///
/// Implementations must be safe to invoke from many segment workers at once.
#[async_trait]
pub trait DetectionComponent: Send + Sync {
    /// Process one segment.
    ///
    /// An `Err` counts as a failed segment execution: the action's
    /// processing time is poisoned and the error message is recorded on the
    /// job. It does not abort the rest of the run.
    async fn run_segment(&self, ctx: &SegmentContext) -> fg_core::Result<SegmentOutcome>;
}
