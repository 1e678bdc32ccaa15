//! OLP tranches.

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One of the three liquidity pool partitions, each carrying its own Greeks
/// and utility ratio.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tranche {
    #[serde(rename = "sOlp")]
    Short,
    #[serde(rename = "mOlp")]
    Mid,
    #[serde(rename = "lOlp")]
    Long,
}

impl Tranche {
    pub const ALL: [Tranche; 3] = [Tranche::Short, Tranche::Mid, Tranche::Long];

    /// Resolves the 2-bit vault index carried in instrument ids.
    pub fn from_vault_index(index: u8) -> Result<Self, ModelError> {
        match index {
            0 => Ok(Self::Short),
            1 => Ok(Self::Mid),
            2 => Ok(Self::Long),
            other => Err(ModelError::UnknownVaultIndex(other)),
        }
    }

    pub fn vault_index(&self) -> u8 {
        match self {
            Self::Short => 0,
            Self::Mid => 1,
            Self::Long => 2,
        }
    }

    pub fn key(&self) -> &'static str {
        match self {
            Self::Short => "sOlp",
            Self::Mid => "mOlp",
            Self::Long => "lOlp",
        }
    }
}

impl fmt::Display for Tranche {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

impl FromStr for Tranche {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sOlp" | "short" | "Short" => Ok(Self::Short),
            "mOlp" | "mid" | "Mid" => Ok(Self::Mid),
            "lOlp" | "long" | "Long" => Ok(Self::Long),
            _ => Err(ModelError::UnknownTranche(s.to_string())),
        }
    }
}
