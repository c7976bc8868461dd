use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use fg_pipeline::{Action, Pipeline};

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Directory that completed subject jobs write their output objects to.
    #[serde(default = "default_results_dir")]
    pub results_dir: PathBuf,

    #[serde(default)]
    pub callback: CallbackConfig,

    #[serde(default)]
    pub runner: RunnerConfig,

    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,

    /// Registered detection components, keyed by algorithm name. Pipelines
    /// may only reference algorithms listed here.
    #[serde(default)]
    pub components: BTreeMap<String, ComponentConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CallbackConfig {
    /// Hard deadline for the single callback delivery attempt.
    #[serde(default = "default_callback_timeout")]
    pub timeout_secs: u64,
}

fn default_callback_timeout() -> u64 {
    30
}

impl Default for CallbackConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_callback_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RunnerConfig {
    /// Frames per media segment when fanning a job out over workers.
    #[serde(default = "default_segment_frames")]
    pub segment_frames: u32,
}

fn default_segment_frames() -> u32 {
    200
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            segment_frames: default_segment_frames(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PipelineConfig {
    pub name: String,

    pub actions: Vec<ActionConfig>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ActionConfig {
    pub name: String,

    pub algorithm: String,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

/// How the external supervision layer launches one detection component.
/// This core only validates and carries the shape.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ComponentConfig {
    pub cmd: String,

    #[serde(default)]
    pub args: Vec<String>,

    #[serde(default)]
    pub description: Option<String>,
}

fn default_results_dir() -> PathBuf {
    PathBuf::from("./results")
}

impl Config {
    /// Build the configured pipelines into their validated model form,
    /// keyed by name.
    pub fn build_pipelines(&self) -> fg_core::Result<BTreeMap<String, Arc<Pipeline>>> {
        let mut pipelines = BTreeMap::new();
        for pipeline_config in &self.pipelines {
            let actions = pipeline_config
                .actions
                .iter()
                .map(|action| {
                    let mut built = Action::new(&action.name, &action.algorithm);
                    for (name, value) in &action.properties {
                        built = built.with_property(name, value);
                    }
                    built
                })
                .collect();
            let pipeline = Pipeline::new(&pipeline_config.name, actions)?;
            pipelines.insert(pipeline_config.name.clone(), Arc::new(pipeline));
        }
        Ok(pipelines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_an_empty_config() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.results_dir, PathBuf::from("./results"));
        assert_eq!(config.callback.timeout_secs, 30);
        assert_eq!(config.runner.segment_frames, 200);
        assert!(config.pipelines.is_empty());
        assert!(config.components.is_empty());
    }

    #[test]
    fn pipelines_build_into_model_form() {
        let config: Config = toml::from_str(
            r#"
            [[pipelines]]
            name = "FACE PIPELINE"

            [[pipelines.actions]]
            name = "FACE ACTION"
            algorithm = "FACECV"
            properties = { MIN_CONFIDENCE = "0.5" }
            "#,
        )
        .unwrap();

        let pipelines = config.build_pipelines().unwrap();
        let pipeline = &pipelines["FACE PIPELINE"];
        assert_eq!(pipeline.len(), 1);
        let action = pipeline.action("FACE ACTION").unwrap();
        assert_eq!(action.algorithm, "FACECV");
    }

    #[test]
    fn duplicate_action_names_fail_the_build() {
        let config: Config = toml::from_str(
            r#"
            [[pipelines]]
            name = "P"

            [[pipelines.actions]]
            name = "A"
            algorithm = "X"

            [[pipelines.actions]]
            name = "A"
            algorithm = "Y"
            "#,
        )
        .unwrap();

        assert!(config.build_pipelines().is_err());
    }
}
