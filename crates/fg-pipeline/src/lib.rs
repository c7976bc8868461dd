//! # fg-pipeline
//!
//! The pipeline model and segment execution core for framegrid.
//!
//! This crate provides:
//!
//! - **[`Action`] / [`Pipeline`]** -- the immutable, validated description of
//!   the steps a batch job runs.
//! - **[`ProcessingTimeLedger`]** -- per-action accumulated processing time
//!   with sticky failure poisoning and the `-1` wire sentinel.
//! - **[`DetectionComponent`]** -- the boundary trait behind which detection
//!   algorithms live; the core never decodes media itself.
//! - **[`SegmentRunner`]** -- splits media into frame-range segments and runs
//!   each pipeline action across them concurrently, feeding the ledger.

pub mod component;
pub mod model;
pub mod runner;
pub mod timing;

// Re-export key types at the crate root.
pub use component::{DetectionComponent, SegmentContext, SegmentOutcome};
pub use model::{Action, ActionProperty, Pipeline};
pub use runner::{RunReport, SegmentRunner};
pub use timing::{ProcessingTimeLedger, TimeEntry, UNSET};
