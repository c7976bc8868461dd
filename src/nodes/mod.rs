//! Node and service configuration.
//!
//! The canonical in-memory model of which services run on which hosts,
//! with two independent codecs over it: serde JSON ([`json`]) and the older
//! XML form ([`xml`]). This module only produces and consumes the shape;
//! launching processes belongs to the external supervision layer that reads
//! it.

pub mod json;
pub mod xml;

use serde::{Deserialize, Serialize};

/// Launcher tag applied when a service does not name one.
pub const GENERIC_LAUNCHER: &str = "generic";

/// One environment variable handed to a launched service. When `sep` is
/// present the value is appended to the variable's existing value using it
/// as the separator, path-style, instead of replacing it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvironmentVariable {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sep: Option<String>,
}

/// One service hosted on a node: the command to launch, its arguments, and
/// how many replicas to keep running.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeService {
    pub name: String,
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_directory: Option<String>,
    #[serde(default = "default_count")]
    pub count: u32,
    #[serde(default = "default_launcher")]
    pub launcher: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub env_vars: Vec<EnvironmentVariable>,
}

impl NodeService {
    /// A service with the given name and command and every other field at
    /// its default.
    pub fn new(name: impl Into<String>, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            cmd: cmd.into(),
            args: Vec::new(),
            working_directory: None,
            count: default_count(),
            launcher: default_launcher(),
            description: None,
            env_vars: Vec::new(),
        }
    }
}

/// All services configured for one host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeManager {
    /// Host the services run on.
    pub target: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub services: Vec<NodeService>,
}

impl NodeManager {
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            services: Vec::new(),
        }
    }
}

/// The full node/service configuration. Serializes as a plain list of
/// managers, which is the shape the supervision layer persists.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeManagerConfig {
    pub managers: Vec<NodeManager>,
}

fn default_count() -> u32 {
    1
}

fn default_launcher() -> String {
    GENERIC_LAUNCHER.to_string()
}
