//! Blacklist records and the per-operation blacklist check.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Blacklist state for a principal address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[repr(i32)]
pub enum BlacklistType {
    /// Not blocked.
    None = 0,
    /// Fully blocked: no operation is permitted.
    Full = 1,
    /// Write-blocked only: reads and deletes still proceed.
    WriteOnly = 2,
}

impl BlacklistType {
    /// Decode the driver's raw integer representation.
    pub fn from_i32(value: i32) -> Option<Self> {
        match value {
            0 => Some(Self::None),
            1 => Some(Self::Full),
            2 => Some(Self::WriteOnly),
            _ => None,
        }
    }
}

/// A blacklist record as read from the driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct BlacklistRecord {
    /// The blacklist state.
    #[serde(rename = "type")]
    pub kind: BlacklistType,
}

/// The category of operation a blacklist check is performed for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PerformType {
    /// A write (`PUT`).
    Put,
    /// A delete.
    Delete,
    /// A listing.
    List,
    /// A batch perform-files operation.
    Perform,
}

impl BlacklistRecord {
    /// Whether `perform_type` is blocked by this record.
    ///
    /// [`BlacklistType::Full`] blocks every operation;
    /// [`BlacklistType::WriteOnly`] blocks only [`PerformType::Put`].
    pub fn blocks(&self, perform_type: PerformType) -> bool {
        match self.kind {
            BlacklistType::None => false,
            BlacklistType::Full => true,
            BlacklistType::WriteOnly => matches!(perform_type, PerformType::Put),
        }
    }
}
