//! fg-core: shared types, IDs, errors, media enums, and the event system.
//!
//! This crate is the foundational dependency for the other fg-* crates,
//! providing type-safe identifiers, a unified error type, media-domain
//! enums, and a broadcast event bus.

pub mod error;
pub mod events;
pub mod ids;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use error::{Error, Result};
pub use ids::*;
pub use media::*;
