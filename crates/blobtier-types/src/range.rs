use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Inclusive `[start, end]` byte offsets used for ranged reads.
///
/// A range is only *valid* for an object of `size` bytes when
/// `start <= end < size`; use [`ByteRange::checked`] to enforce that. An
/// unchecked range with `end < start` is degenerate and has length zero,
/// which ranged readers treat as "yield nothing" rather than as an error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ByteRange {
    pub start: u64,
    pub end: u64,
}

impl ByteRange {
    /// Create a range without validating it.
    pub const fn new(start: u64, end: u64) -> Self {
        Self { start, end }
    }

    /// Create a range that must fit an object of `size` bytes.
    pub fn checked(start: u64, end: u64, size: u64) -> Result<Self, TypeError> {
        if start > end || end >= size {
            return Err(TypeError::RangeOutOfBounds { start, end, size });
        }
        Ok(Self { start, end })
    }

    /// Number of bytes covered: `end - start + 1`, or 0 when degenerate.
    ///
    /// `0-u64::MAX` covers one byte more than a `u64` can count and
    /// saturates to `u64::MAX`.
    pub fn len(&self) -> u64 {
        if self.end < self.start {
            0
        } else {
            (self.end - self.start).saturating_add(1)
        }
    }

    /// Returns `true` when the range covers no bytes.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clamp `end` to the last byte of an object of `size` bytes.
    ///
    /// Returns `None` when no byte of the range lies inside the object.
    pub fn clamp_to(&self, size: u64) -> Option<Self> {
        if self.is_empty() || self.start >= size {
            return None;
        }
        Some(Self { start: self.start, end: self.end.min(size - 1) })
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for ByteRange {
    type Err = TypeError;

    /// Parse `"start-end"`, optionally prefixed with `"bytes="` as in an
    /// HTTP `Range` header.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let body = s.trim();
        let body = body.strip_prefix("bytes=").unwrap_or(body);
        let (start, end) = body
            .split_once('-')
            .ok_or_else(|| TypeError::InvalidRange(s.to_string()))?;
        let start = start
            .trim()
            .parse::<u64>()
            .map_err(|_| TypeError::InvalidRange(s.to_string()))?;
        let end = end
            .trim()
            .parse::<u64>()
            .map_err(|_| TypeError::InvalidRange(s.to_string()))?;
        Ok(Self { start, end })
    }
}
