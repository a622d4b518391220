use std::fmt;

use serde::{Deserialize, Serialize};

use crate::StoreError;

/// Remaining generations for a user
///
/// Serialized as the signed limit used by the credential file: `-1` for
/// unlimited, otherwise the remaining count.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum Quota {
    Unlimited,
    Remaining(u32),
}

impl Quota {
    /// A user with nothing left must never pass authorization
    pub const fn is_exhausted(self) -> bool {
        matches!(self, Self::Remaining(0))
    }

    /// Quota after one successful generation
    #[must_use]
    pub const fn consume(self) -> Self {
        match self {
            Self::Unlimited => Self::Unlimited,
            Self::Remaining(n) => Self::Remaining(n.saturating_sub(1)),
        }
    }

    pub fn as_limit(self) -> i64 {
        match self {
            Self::Unlimited => -1,
            Self::Remaining(n) => i64::from(n),
        }
    }
}

impl TryFrom<i64> for Quota {
    type Error = StoreError;

    fn try_from(limit: i64) -> Result<Self, Self::Error> {
        match limit {
            -1 => Ok(Self::Unlimited),
            n => u32::try_from(n).map(Self::Remaining).map_err(|_| StoreError::InvalidLimit(n)),
        }
    }
}

impl From<Quota> for i64 {
    fn from(quota: Quota) -> Self {
        quota.as_limit()
    }
}

impl fmt::Display for Quota {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unlimited => f.write_str("Unlimited"),
            Self::Remaining(n) => write!(f, "{n} remaining"),
        }
    }
}
