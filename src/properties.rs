//! Derivation of job configuration from the process environment.
//!
//! Two derived inputs feed job construction: job properties taken from
//! environment keys carrying the reserved prefix, and the media-type
//! restriction parsed from `RESTRICT_MEDIA_TYPES`. Both derivations are pure
//! functions over supplied pairs; [`process_job_properties`] is the thin
//! wrapper that reads the real environment.

use std::collections::HashMap;

use fg_core::{MediaKind, Result};

/// Environment keys carrying this prefix become job properties.
pub const PROPERTY_PREFIX: &str = "MPF_PROP_";

/// Environment key restricting which media kinds a job processes.
pub const RESTRICT_MEDIA_TYPES: &str = "RESTRICT_MEDIA_TYPES";

/// Extract job properties from environment-style pairs.
///
/// Only keys strictly longer than [`PROPERTY_PREFIX`] and starting with it
/// contribute; the bare prefix names nothing and is ignored. The property
/// name is the remainder of the key after the prefix.
pub fn environment_job_properties<I, K, V>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (K, V)>,
    K: AsRef<str>,
    V: Into<String>,
{
    vars.into_iter()
        .filter_map(|(key, value)| {
            let key = key.as_ref();
            if key.len() > PROPERTY_PREFIX.len() && key.starts_with(PROPERTY_PREFIX) {
                Some((key[PROPERTY_PREFIX.len()..].to_string(), value.into()))
            } else {
                None
            }
        })
        .collect()
}

/// Job properties derived from this process's environment.
pub fn process_job_properties() -> HashMap<String, String> {
    environment_job_properties(std::env::vars())
}

/// Parse a media-type restriction into kinds, trimmed and upper-cased,
/// de-duplicated keeping first-appearance order.
///
/// `None`, an empty value, and a value containing only separators all mean
/// "no restriction". An unknown token rejects the whole value; there is no
/// partial acceptance.
pub fn restricted_media_kinds(value: Option<&str>) -> Result<Option<Vec<MediaKind>>> {
    let value = match value {
        Some(value) => value,
        None => return Ok(None),
    };
    let mut kinds = Vec::new();
    for token in value.split(',') {
        let token = token.trim();
        if token.is_empty() {
            continue;
        }
        let kind: MediaKind = token.parse()?;
        if !kinds.contains(&kind) {
            kinds.push(kind);
        }
    }
    if kinds.is_empty() {
        Ok(None)
    } else {
        Ok(Some(kinds))
    }
}

/// Normalized media-type filter expression for a restriction value, e.g.
/// `MediaType in ('VIDEO', 'IMAGE')`. Returns `None` when the value imposes
/// no restriction.
pub fn media_type_selector(value: Option<&str>) -> Result<Option<String>> {
    let kinds = match restricted_media_kinds(value)? {
        Some(kinds) => kinds,
        None => return Ok(None),
    };
    let list = kinds
        .iter()
        .map(|kind| format!("'{kind}'"))
        .collect::<Vec<_>>()
        .join(", ");
    Ok(Some(format!("MediaType in ({list})")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixed_keys_become_properties() {
        let props = environment_job_properties([
            ("MPF_PROP_PROP1", "VAL1"),
            ("NOT A PROPERTY", "nope"),
            ("MPF_PROP BAD_PROP", "nope"),
            ("MPF_PROP_PROP2", "VAL2"),
            ("MPF_PROP_", "nope"),
        ]);
        assert_eq!(props.len(), 2);
        assert_eq!(props.get("PROP1").map(String::as_str), Some("VAL1"));
        assert_eq!(props.get("PROP2").map(String::as_str), Some("VAL2"));
    }

    #[test]
    fn no_matching_keys_is_empty() {
        let props = environment_job_properties([("PATH", "/usr/bin"), ("HOME", "/root")]);
        assert!(props.is_empty());
    }

    #[test]
    fn property_values_keep_their_case() {
        let props = environment_job_properties([("MPF_PROP_x", "MixedCase Value")]);
        assert_eq!(props.get("x").map(String::as_str), Some("MixedCase Value"));
    }

    #[test]
    fn selector_normalizes_tokens() {
        let selector = media_type_selector(Some("VIDEO, IMaGe , audio,")).unwrap();
        assert_eq!(
            selector.as_deref(),
            Some("MediaType in ('VIDEO', 'IMAGE', 'AUDIO')")
        );
    }

    #[test]
    fn selector_deduplicates_keeping_first_appearance() {
        let selector = media_type_selector(Some("video,VIDEO,image,Video")).unwrap();
        assert_eq!(selector.as_deref(), Some("MediaType in ('VIDEO', 'IMAGE')"));
    }

    #[test]
    fn selector_absent_or_blank_means_no_restriction() {
        assert_eq!(media_type_selector(None).unwrap(), None);
        assert_eq!(media_type_selector(Some("")).unwrap(), None);
        assert_eq!(media_type_selector(Some("  , ,,  ")).unwrap(), None);
    }

    #[test]
    fn selector_rejects_unknown_tokens_outright() {
        let err = media_type_selector(Some("VIDEO, TEXT")).unwrap_err();
        assert!(err.to_string().contains("unknown media type: TEXT"));
        // No partial acceptance of the valid leading token.
        assert!(matches!(err, fg_core::Error::InvalidConfiguration(_)));
    }

    #[test]
    fn unknown_covers_untyped_media() {
        let kinds = restricted_media_kinds(Some("unknown")).unwrap().unwrap();
        assert_eq!(kinds, vec![MediaKind::Unknown]);
    }

    #[test]
    fn restriction_parses_kinds_in_order() {
        let kinds = restricted_media_kinds(Some(" image ,VIDEO ")).unwrap().unwrap();
        assert_eq!(kinds, vec![MediaKind::Image, MediaKind::Video]);
    }
}
