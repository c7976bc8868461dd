//! One-shot completion callback delivery.
//!
//! A subject job with a callback URL gets exactly one delivery attempt when
//! it completes. The outcome is recorded on the job as a status string and
//! never retried or escalated; a dead callback receiver must not be able to
//! wedge job completion.

use anyhow::Result;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;

use fg_core::SubjectJobId;

use crate::subject::request::CallbackMethod;

/// Recorded when the job completed without a callback URL.
pub const STATUS_NOT_REQUESTED: &str = "NOT REQUESTED";
/// Recorded while the single delivery attempt is in flight.
pub const STATUS_IN_PROGRESS: &str = "IN PROGRESS";
/// Recorded after a 2xx response.
pub const STATUS_COMPLETE: &str = "COMPLETE";
/// Prefix of the status recorded after a failed attempt.
pub const STATUS_ERROR_PREFIX: &str = "ERROR: ";

/// Everything needed for one delivery attempt.
#[derive(Debug, Clone)]
pub struct CallbackRequest<'a> {
    pub job_id: SubjectJobId,
    pub url: &'a str,
    pub method: CallbackMethod,
    pub external_id: Option<&'a str>,
    pub output_object_uri: Option<&'a str>,
}

/// JSON body sent on POST callbacks. Absent fields are sent as null so the
/// receiver always sees the full shape.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CallbackBody<'a> {
    job_id: SubjectJobId,
    external_id: Option<&'a str>,
    output_object_uri: Option<&'a str>,
}

#[derive(Clone)]
pub struct CallbackSender {
    client: Client,
}

impl CallbackSender {
    pub fn new(timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client: {}", e);
                Client::new()
            });

        Self { client }
    }

    /// Make the single delivery attempt and return the status string to
    /// record. Failure is data here, not an error.
    pub async fn deliver(&self, callback: &CallbackRequest<'_>) -> String {
        match self.send(callback).await {
            Ok(()) => STATUS_COMPLETE.to_string(),
            Err(e) => {
                tracing::warn!(
                    subject_job_id = %callback.job_id,
                    url = callback.url,
                    "callback delivery failed: {e}"
                );
                format!("{STATUS_ERROR_PREFIX}{e}")
            }
        }
    }

    async fn send(&self, callback: &CallbackRequest<'_>) -> Result<()> {
        let response = match callback.method {
            CallbackMethod::Get => {
                let mut query: Vec<(&str, String)> =
                    vec![("jobid", callback.job_id.to_string())];
                if let Some(external_id) = callback.external_id {
                    query.push(("externalid", external_id.to_string()));
                }
                if let Some(uri) = callback.output_object_uri {
                    query.push(("outputobjecturi", uri.to_string()));
                }
                self.client.get(callback.url).query(&query).send().await?
            }
            CallbackMethod::Post => {
                self.client
                    .post(callback.url)
                    .json(&CallbackBody {
                        job_id: callback.job_id,
                        external_id: callback.external_id,
                        output_object_uri: callback.output_object_uri,
                    })
                    .send()
                    .await?
            }
        };

        if !response.status().is_success() {
            anyhow::bail!(
                "The remote server responded with a non-200 status code of: {}",
                response.status().as_u16()
            );
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn post_body_shape() {
        let body = CallbackBody {
            job_id: SubjectJobId::new(12),
            external_id: Some("case-9"),
            output_object_uri: Some("file:///out/12.json"),
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "jobId": 12,
                "externalId": "case-9",
                "outputObjectUri": "file:///out/12.json"
            })
        );
    }

    #[test]
    fn post_body_sends_null_for_absent_fields() {
        let body = CallbackBody {
            job_id: SubjectJobId::new(3),
            external_id: None,
            output_object_uri: None,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"externalId\":null"));
        assert!(json.contains("\"outputObjectUri\":null"));
    }
}
