mod types;

pub use types::*;

use anyhow::{Context, Result};
use std::path::Path;

/// Load configuration from a TOML file
pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {:?}", path))?;

    let config: Config = toml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {:?}", path))?;

    validate_config(&config)?;

    Ok(config)
}

/// Load config from default locations or return default config
pub fn load_config_or_default(custom_path: Option<&Path>) -> Result<Config> {
    if let Some(path) = custom_path {
        return load_config(path);
    }

    // Try default locations
    let default_paths = [
        "./framegrid.toml",
        "~/.config/framegrid/config.toml",
        "/etc/framegrid/config.toml",
    ];

    for path_str in default_paths {
        let path = shellexpand::tilde(path_str);
        let path = Path::new(path.as_ref());
        if path.exists() {
            return load_config(path);
        }
    }

    // Return default config if no file found
    Ok(Config::default())
}

/// Validate configuration
fn validate_config(config: &Config) -> Result<()> {
    if config.callback.timeout_secs == 0 {
        anyhow::bail!("Callback timeout cannot be 0");
    }

    if config.runner.segment_frames == 0 {
        anyhow::bail!("Runner segment length cannot be 0");
    }

    // Validate components
    for (algorithm, component) in &config.components {
        if component.cmd.is_empty() {
            anyhow::bail!("Component '{}' has no command", algorithm);
        }
    }

    // Validate pipelines: model-level rules plus algorithm references
    let mut seen = std::collections::BTreeSet::new();
    for pipeline in &config.pipelines {
        if !seen.insert(&pipeline.name) {
            anyhow::bail!("Duplicate pipeline name '{}'", pipeline.name);
        }
        for action in &pipeline.actions {
            if !config.components.contains_key(&action.algorithm) {
                anyhow::bail!(
                    "Pipeline '{}' references unknown algorithm '{}'",
                    pipeline.name,
                    action.algorithm
                );
            }
        }
    }
    config.build_pipelines()?;

    Ok(())
}
