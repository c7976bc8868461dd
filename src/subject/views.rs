//! Response shapes for subject jobs.
//!
//! One canonical record ([`SubjectJob`]) feeds the views through explicit
//! shaping constructors. The external status view hides the operational
//! fields (`outputUri`, `callbackStatus`); the internal report view carries
//! everything. Hiding lives here, in the shaping, never as annotations on
//! the record itself.

use chrono::{DateTime, Utc};
use fg_core::SubjectJobId;
use serde::Serialize;

use crate::state::{CancellationState, SubjectJob};

use super::request::SubjectJobRequest;

/// The externally visible status of a subject job.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectJobStatus {
    pub id: SubjectJobId,
    /// The request exactly as submitted.
    pub request: SubjectJobRequest,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
    pub retrieved_detection_jobs: bool,
    pub cancellation_state: CancellationState,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl SubjectJobStatus {
    pub fn from_job(job: &SubjectJob) -> Self {
        Self {
            id: job.id,
            request: job.request.clone(),
            start_date: job.time_received,
            end_date: job.time_completed,
            retrieved_detection_jobs: job.retrieved_detection_jobs,
            cancellation_state: job.cancellation_state,
            errors: job.errors.iter().cloned().collect(),
            warnings: job.warnings.iter().cloned().collect(),
        }
    }
}

/// The internal reporting view: the external status plus the fields that are
/// never exposed externally. Absent fields serialize as null so the report
/// always has the full shape.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectJobReport {
    #[serde(flatten)]
    pub status: SubjectJobStatus,
    pub output_uri: Option<String>,
    pub callback_status: Option<String>,
}

impl SubjectJobReport {
    pub fn from_job(job: &SubjectJob) -> Self {
        Self {
            status: SubjectJobStatus::from_job(job),
            output_uri: job.output_uri.clone(),
            callback_status: job.callback_status.clone(),
        }
    }
}

/// One row of the subject job listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectJobSummary {
    pub id: SubjectJobId,
    pub component_name: String,
    pub start_date: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_date: Option<DateTime<Utc>>,
}

impl SubjectJobSummary {
    pub fn from_job(job: &SubjectJob) -> Self {
        Self {
            id: job.id,
            component_name: job.request.component_name.clone(),
            start_date: job.time_received,
            end_date: job.time_completed,
        }
    }
}
