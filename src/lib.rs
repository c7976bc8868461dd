//! Framegrid - Detection pipeline orchestration and subject job tracking
//!
//! This library crate exposes the core functionality for integration testing.

pub mod config;
pub mod nodes;
pub mod processor;
pub mod properties;
pub mod state;
pub mod subject;
