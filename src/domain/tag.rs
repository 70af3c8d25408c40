//! User tags: the short, case-insensitive handle that addresses transfers.

use std::fmt;

use serde::Serialize;

/// Minimum tag length in characters.
pub const TAG_MIN_LEN: usize = 3;
/// Maximum tag length in characters.
pub const TAG_MAX_LEN: usize = 12;

/// A normalized, validated user tag.
///
/// Only constructible through [`Tag::parse`], so holding a `Tag` means the
/// value is lower-case, trimmed, 3–12 characters of `[a-z0-9_.-]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct Tag(String);

/// Returned when a raw tag fails the format rule after normalization.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid tag")]
pub struct InvalidTag;

/// Trims surrounding whitespace and lower-cases.
#[must_use]
pub fn normalize(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Whether an already-normalized tag satisfies the format rule.
#[must_use]
pub fn is_valid(tag: &str) -> bool {
    let allowed =
        |c: char| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '-' | '.');
    (TAG_MIN_LEN..=TAG_MAX_LEN).contains(&tag.chars().count()) && tag.chars().all(allowed)
}

impl Tag {
    /// Normalizes `raw` and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTag`] when the normalized value is out of range or
    /// contains a disallowed character.
    pub fn parse(raw: &str) -> Result<Self, InvalidTag> {
        let tag = normalize(raw);
        if is_valid(&tag) { Ok(Self(tag)) } else { Err(InvalidTag) }
    }

    /// Wraps a value read back from storage, where it was stored normalized.
    pub(crate) fn from_stored(value: String) -> Self {
        Self(value)
    }

    /// The normalized tag.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
