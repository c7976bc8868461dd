//! Media-domain types: the media kind enum and the media descriptor.
//!
//! The core never decodes media. A [`Media`] value is an opaque reference
//! (URI plus kind plus frame count) that segmenting and bookkeeping operate
//! on; actual decoding belongs to detection components behind the trait
//! boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// MediaKind
// ---------------------------------------------------------------------------

/// Kind of media a job processes. The wire form is upper-case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    Video,
    Audio,
    Image,
    Unknown,
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "VIDEO"),
            Self::Audio => write!(f, "AUDIO"),
            Self::Image => write!(f, "IMAGE"),
            Self::Unknown => write!(f, "UNKNOWN"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = crate::Error;

    /// Parse a media kind token case-insensitively. Surrounding whitespace is
    /// not trimmed here; callers normalize their own token lists.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "VIDEO" => Ok(Self::Video),
            "AUDIO" => Ok(Self::Audio),
            "IMAGE" => Ok(Self::Image),
            "UNKNOWN" => Ok(Self::Unknown),
            _ => Err(crate::Error::invalid_configuration(format!(
                "unknown media type: {s} (expected one of VIDEO, AUDIO, IMAGE, UNKNOWN)"
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Media
// ---------------------------------------------------------------------------

/// Reference to one piece of media a batch job runs over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Media {
    /// Location of the media (file path or URI); opaque to the core.
    pub uri: String,
    /// Kind of media, used for media-type restrictions.
    pub kind: MediaKind,
    /// Number of frames, used to split the media into segments. Audio and
    /// still images report 1.
    #[serde(default = "default_frames")]
    pub frames: u32,
}

fn default_frames() -> u32 {
    1
}

impl Media {
    /// Create a media reference with an explicit frame count.
    pub fn new(uri: impl Into<String>, kind: MediaKind, frames: u32) -> Self {
        Self {
            uri: uri.into(),
            kind,
            frames: frames.max(1),
        }
    }
}
