//! Immutable pipeline and action model.
//!
//! A [`Pipeline`] is a validated, ordered sequence of [`Action`]s. Validation
//! happens once, at construction; afterwards the pipeline only offers
//! read-only iteration and lookup, so every consumer observes the same
//! sequence for the life of a job.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use fg_core::{Error, Result};

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One property override applied when an action runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionProperty {
    pub name: String,
    pub value: String,
}

/// A single pipeline step: a named reference to a detection algorithm plus
/// the property overrides applied when the step runs.
///
/// Action names are compared case-sensitively, so `detect` and `DETECT` are
/// distinct steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Name of the step, unique within its pipeline.
    pub name: String,
    /// Algorithm the step invokes.
    pub algorithm: String,
    /// Property overrides in declaration order.
    #[serde(default)]
    pub properties: Vec<ActionProperty>,
}

impl Action {
    /// Create an action with no property overrides.
    pub fn new(name: impl Into<String>, algorithm: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            algorithm: algorithm.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property override, keeping declaration order.
    #[must_use]
    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.push(ActionProperty {
            name: name.into(),
            value: value.into(),
        });
        self
    }

    /// The effective properties for a run of this action: the action's own
    /// overrides, with job-level properties taking precedence on conflict.
    pub fn merged_properties(
        &self,
        job_properties: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut merged: HashMap<String, String> = self
            .properties
            .iter()
            .map(|p| (p.name.clone(), p.value.clone()))
            .collect();
        for (name, value) in job_properties {
            merged.insert(name.clone(), value.clone());
        }
        merged
    }
}

// ---------------------------------------------------------------------------
// Pipeline
// ---------------------------------------------------------------------------

/// A validated, immutable, ordered sequence of actions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pipeline {
    name: String,
    actions: Vec<Action>,
}

impl Pipeline {
    /// Build a pipeline, rejecting an empty action sequence and duplicate
    /// action names.
    pub fn new(name: impl Into<String>, actions: Vec<Action>) -> Result<Self> {
        let name = name.into();
        if actions.is_empty() {
            return Err(Error::configuration(format!(
                "pipeline {name} has no actions"
            )));
        }

        let mut seen = std::collections::HashSet::new();
        let mut duplicates = Vec::new();
        for action in &actions {
            if !seen.insert(action.name.as_str()) && !duplicates.contains(&action.name) {
                duplicates.push(action.name.clone());
            }
        }
        if !duplicates.is_empty() {
            return Err(Error::configuration(format!(
                "pipeline {name} has duplicate action names: {}",
                duplicates.join(", ")
            )));
        }

        Ok(Self { name, actions })
    }

    /// The pipeline's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The actions in declared order.
    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    /// Look up an action by its exact name.
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.iter().find(|a| a.name == name)
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Always false for a constructed pipeline; kept for the usual pairing
    /// with [`Pipeline::len`].
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}
