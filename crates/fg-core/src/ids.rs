//! Typed ID wrappers providing compile-time safety for job identifiers.
//!
//! Each ID type is a newtype over `i64`, preventing accidental misuse
//! (e.g., passing a `SubjectJobId` where a `JobId` is expected). Values are
//! assigned by the job registry from a monotonically increasing sequence, so
//! newer jobs always compare greater than older ones.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Generate a newtype ID wrapper over `i64`.
///
/// The macro produces a struct with:
/// - `new()` wrapping a sequence value and `as_i64()` to unwrap it
/// - `Debug`, `Clone`, `Copy`, `PartialEq`, `Eq`, `Hash`, `PartialOrd`, `Ord`,
///   `Serialize`, `Deserialize`
/// - `Display` and `FromStr` delegating to the inner integer
/// - `From<i64>` and `Into<i64>` conversions
macro_rules! typed_id {
    ($($(#[doc = $doc:expr])* $name:ident),+ $(,)?) => {
        $(
            $(#[doc = $doc])*
            #[derive(
                Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
            )]
            #[serde(transparent)]
            pub struct $name(i64);

            impl $name {
                /// Wrap a sequence value as a typed ID.
                #[must_use]
                pub const fn new(value: i64) -> Self {
                    Self(value)
                }

                /// Return the inner integer value.
                #[must_use]
                pub const fn as_i64(self) -> i64 {
                    self.0
                }
            }

            impl fmt::Display for $name {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    write!(f, "{}", self.0)
                }
            }

            impl FromStr for $name {
                type Err = std::num::ParseIntError;

                fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
                    s.parse::<i64>().map(Self)
                }
            }

            impl From<i64> for $name {
                fn from(value: i64) -> Self {
                    Self(value)
                }
            }

            impl From<$name> for i64 {
                fn from(id: $name) -> Self {
                    id.0
                }
            }
        )+
    };
}

typed_id! {
    /// Unique identifier for a batch detection job.
    JobId,
    /// Unique identifier for a subject tracking job.
    SubjectJobId,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_i64() {
        let id = JobId::from(17);
        let back: i64 = id.into();
        assert_eq!(back, 17);
        assert_eq!(id.as_i64(), 17);
    }

    #[test]
    fn display_and_from_str() {
        let id = SubjectJobId::new(204);
        let s = id.to_string();
        assert_eq!(s, "204");
        let parsed: SubjectJobId = s.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serde_is_transparent() {
        let id = JobId::new(9);
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "9");
        let back: JobId = serde_json::from_str(&json).unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn hash_set_usage() {
        use std::collections::HashSet;
        let mut set = HashSet::new();
        let id = JobId::new(3);
        set.insert(id);
        assert!(set.contains(&id));
        assert!(!set.contains(&JobId::new(4)));
    }

    #[test]
    fn newer_ids_sort_after_older() {
        let older = SubjectJobId::new(10);
        let newer = SubjectJobId::new(11);
        assert!(newer > older);
    }

    #[test]
    fn invalid_from_str() {
        let result = JobId::from_str("not-a-number");
        assert!(result.is_err());
    }

    #[test]
    fn copy_semantics() {
        let id = SubjectJobId::new(5);
        let copied = id;
        assert_eq!(id, copied);
    }
}
