//! JSON codec for node/service configuration.
//!
//! The persisted form is a plain array of node managers. Absent optional
//! fields take their defaults on read (`count` 1, `launcher` "generic").

use fg_core::{Error, Result};

use super::NodeManagerConfig;

pub fn from_json(json: &str) -> Result<NodeManagerConfig> {
    serde_json::from_str(json)
        .map_err(|e| Error::invalid_configuration(format!("Invalid node manager JSON: {e}")))
}

pub fn to_json(config: &NodeManagerConfig) -> Result<String> {
    serde_json::to_string_pretty(config)
        .map_err(|e| Error::Internal(format!("node manager JSON serialization failed: {e}")))
}
