use serde::{Deserialize, Serialize};

use crate::error::{CodecError, Result};

/// Smallest value accepted for any codec limit.
pub const MIN_LIMIT: usize = 16;

/// Default ceiling on total encoded size: 32 MiB.
pub const DEFAULT_DATA_MAX_LEN: usize = 32 * 1024 * 1024;

/// Default ceiling on a single string: 16 MiB.
pub const DEFAULT_STRING_MAX_LEN: usize = 16 * 1024 * 1024;

/// Default ceiling on a single array count.
pub const DEFAULT_ARRAY_MAX_LEN: usize = 16 * 1024 * 1024;

/// Default number of extra bytes allocated when a buffer must be reallocated.
pub const DEFAULT_GROWTH_SLACK: usize = 256;

/// Validated codec size ceilings.
///
/// Fields are private so a `Limits` value can only exist in a valid state;
/// deserialization goes through [`Limits::new`] as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawLimits", into = "RawLimits")]
pub struct Limits {
    data_max_len: usize,
    string_max_len: usize,
    array_max_len: usize,
    growth_slack: usize,
}

impl Limits {
    /// Build limits, rejecting any value below [`MIN_LIMIT`].
    pub fn new(
        data_max_len: usize,
        string_max_len: usize,
        array_max_len: usize,
        growth_slack: usize,
    ) -> Result<Self> {
        for (field, value) in [
            ("data_max_len", data_max_len),
            ("string_max_len", string_max_len),
            ("array_max_len", array_max_len),
            ("growth_slack", growth_slack),
        ] {
            if value < MIN_LIMIT {
                return Err(CodecError::InvalidLimits {
                    field,
                    value,
                    min: MIN_LIMIT,
                });
            }
        }

        Ok(Self {
            data_max_len,
            string_max_len,
            array_max_len,
            growth_slack,
        })
    }

    /// Absolute ceiling on total encoded size.
    pub fn data_max_len(&self) -> usize {
        self.data_max_len
    }

    /// Ceiling on a single string's byte length.
    pub fn string_max_len(&self) -> usize {
        self.string_max_len
    }

    /// Ceiling on a single array's element count.
    pub fn array_max_len(&self) -> usize {
        self.array_max_len
    }

    /// Extra bytes allocated whenever the buffer must be reallocated.
    pub fn growth_slack(&self) -> usize {
        self.growth_slack
    }
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            data_max_len: DEFAULT_DATA_MAX_LEN,
            string_max_len: DEFAULT_STRING_MAX_LEN,
            array_max_len: DEFAULT_ARRAY_MAX_LEN,
            growth_slack: DEFAULT_GROWTH_SLACK,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(default)]
struct RawLimits {
    data_max_len: usize,
    string_max_len: usize,
    array_max_len: usize,
    growth_slack: usize,
}

impl Default for RawLimits {
    fn default() -> Self {
        Limits::default().into()
    }
}

impl From<Limits> for RawLimits {
    fn from(limits: Limits) -> Self {
        Self {
            data_max_len: limits.data_max_len,
            string_max_len: limits.string_max_len,
            array_max_len: limits.array_max_len,
            growth_slack: limits.growth_slack,
        }
    }
}

impl TryFrom<RawLimits> for Limits {
    type Error = CodecError;

    fn try_from(raw: RawLimits) -> Result<Self> {
        Limits::new(
            raw.data_max_len,
            raw.string_max_len,
            raw.array_max_len,
            raw.growth_slack,
        )
    }
}
