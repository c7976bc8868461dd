//! The output object: the durable JSON record of a subject job.
//!
//! Written once, at completion, to `<results_dir>/<job id>.json`. The
//! recorded URI uses the `file://` form of that path. Internal-only fields
//! (the callback status, the URI itself) never appear in the object.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;

use fg_core::{Error, JobId, Result, SubjectJobId};

use crate::state::{BatchJob, BatchJobStatus, SubjectJob};

/// Per-detection-job entry in the output object.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionJobEntry {
    pub id: JobId,
    pub status: BatchJobStatus,
    pub detections: u64,
    /// Total processing time in milliseconds across the job's pipeline, or
    /// -1 when not reliably known.
    pub processing_time: i64,
}

/// The object persisted for a subject job.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectOutput {
    pub job_id: SubjectJobId,
    pub component_name: String,
    pub start_date: DateTime<Utc>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub detection_jobs: Vec<DetectionJobEntry>,
}

impl SubjectOutput {
    /// Assemble the output object from the subject job and the batch jobs it
    /// aggregated. Error and warning sets come out in their sorted order.
    pub fn build(subject: &SubjectJob, jobs: &[BatchJob]) -> Self {
        Self {
            job_id: subject.id,
            component_name: subject.request.component_name.clone(),
            start_date: subject.time_received,
            errors: subject.errors.iter().cloned().collect(),
            warnings: subject.warnings.iter().cloned().collect(),
            detection_jobs: jobs
                .iter()
                .map(|job| DetectionJobEntry {
                    id: job.id,
                    status: job.status,
                    detections: job.detections,
                    processing_time: job.processing_total().as_wire(),
                })
                .collect(),
        }
    }
}

/// Write the output object and return its `file://` URI.
pub fn write_output(results_dir: &Path, output: &SubjectOutput) -> Result<String> {
    std::fs::create_dir_all(results_dir)?;
    let path = results_dir.join(format!("{}.json", output.job_id));
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::Internal(format!("output object serialization failed: {e}")))?;
    std::fs::write(&path, json)?;
    Ok(format!("file://{}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subject::request::tests::valid_request;
    use fg_pipeline::{Action, Pipeline, UNSET};
    use std::collections::HashMap;
    use std::sync::Arc;

    fn batch_job(id: i64) -> BatchJob {
        let pipeline =
            Arc::new(Pipeline::new("P", vec![Action::new("DETECT", "algo")]).unwrap());
        BatchJob::new(JobId::new(id), pipeline, vec![], HashMap::new())
    }

    #[test]
    fn build_reports_wire_times() {
        let mut subject = SubjectJob::new(SubjectJobId::new(7), valid_request());
        subject.add_error("b");
        subject.add_error("a");

        let timed = {
            let job = batch_job(1);
            job.ledger.record("DETECT", 120);
            job
        };
        let untimed = batch_job(2);

        let output = SubjectOutput::build(&subject, &[timed, untimed]);
        assert_eq!(output.errors, ["a", "b"]);
        assert_eq!(output.detection_jobs.len(), 2);
        assert_eq!(output.detection_jobs[0].processing_time, 120);
        assert_eq!(output.detection_jobs[1].processing_time, UNSET);
    }

    #[test]
    fn write_produces_file_uri_and_camel_case_json() {
        let dir = tempfile::tempdir().unwrap();
        let subject = SubjectJob::new(SubjectJobId::new(42), valid_request());
        let output = SubjectOutput::build(&subject, &[batch_job(1)]);

        let uri = write_output(dir.path(), &output).unwrap();
        let expected_path = dir.path().join("42.json");
        assert_eq!(uri, format!("file://{}", expected_path.display()));

        let written = std::fs::read_to_string(&expected_path).unwrap();
        let value: serde_json::Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value["jobId"], 42);
        assert_eq!(value["componentName"], "SUBJECT");
        assert_eq!(value["detectionJobs"][0]["processingTime"], -1);
        assert!(value["startDate"].is_string());
    }

    #[test]
    fn write_into_missing_directory_creates_it() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("results/subject");
        let subject = SubjectJob::new(SubjectJobId::new(1), valid_request());
        let output = SubjectOutput::build(&subject, &[]);
        let uri = write_output(&nested, &output).unwrap();
        assert!(uri.ends_with("/1.json"));
        assert!(nested.join("1.json").exists());
    }
}
