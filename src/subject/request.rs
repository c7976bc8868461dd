//! Subject job submission: the wire shape and its validation.
//!
//! Validation reports every failing field at once rather than stopping at
//! the first, so a caller can fix a bad submission in one round trip.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

use fg_core::{Error, JobId, Result};

/// HTTP method used for the completion callback. POST is the default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum CallbackMethod {
    Get,
    #[default]
    Post,
}

/// A request to create a subject job over existing batch detection jobs.
///
/// The request is echoed back verbatim in every job view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectJobRequest {
    /// Name of the subject tracking component that aggregates the jobs.
    /// Defaulted on deserialization so an absent name is reported by
    /// [`SubjectJobRequest::validate`] alongside every other problem.
    #[serde(default)]
    pub component_name: String,
    /// Scheduling priority, 1 (lowest) through 9. Absent means the
    /// system default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u8>,
    /// The batch jobs to aggregate. Deserializing through a set makes the
    /// collection deduplicated and sorted.
    #[serde(default)]
    pub detection_job_ids: BTreeSet<JobId>,
    /// Free-form properties passed through to the component.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub job_properties: HashMap<String, String>,
    /// Where to announce completion. `callbackUri` is accepted on input for
    /// compatibility with older senders.
    #[serde(
        default,
        rename = "callbackURL",
        alias = "callbackUri",
        skip_serializing_if = "Option::is_none"
    )]
    pub callback_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback_method: Option<CallbackMethod>,
    /// Caller-supplied correlation id, passed back in the callback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_id: Option<String>,
}

impl SubjectJobRequest {
    /// Validate the request, listing every failing field.
    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();

        if !is_valid_component_name(&self.component_name) {
            problems.push(format!(
                "componentName \"{}\" must be a non-empty string of letters, digits, '_', '.', or '-'",
                self.component_name
            ));
        }
        if let Some(priority) = self.priority {
            if !(1..=9).contains(&priority) {
                problems.push(format!(
                    "priority {priority} must be between 1 and 9"
                ));
            }
        }
        if self.detection_job_ids.is_empty() {
            problems.push("detectionJobIds must not be empty".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(Error::invalid_request(problems))
        }
    }

    /// The method to use for the completion callback.
    pub fn effective_callback_method(&self) -> CallbackMethod {
        self.callback_method.unwrap_or_default()
    }
}

fn is_valid_component_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}
