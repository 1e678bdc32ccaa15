//! # Position Requests
//!
//! Trader orders queued on the ledger and awaiting execution.
//!
//! ## Description
//! An open request carries the quote amount the trader paid
//! (`amount_or_size`, raw quote-token units, token in `paths[0]`); a close
//! request carries the position size to close (raw underlying units).
//! Status codes mirror the ledger's request queue.

use crate::error::ModelError;
use crate::instrument::InstrumentId;
use serde::{Deserialize, Serialize};

/// Lifecycle of a queued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequestStatus {
    /// Not yet finalized on the source system. Halts batch iteration.
    Pending,
    /// Withdrawn by the trader. Skipped but consumed.
    Cancelled,
    /// Finalized and awaiting execution.
    Ready,
    /// Already settled by a previous commit.
    Executed,
}

impl RequestStatus {
    pub fn from_code(code: u8) -> Result<Self, ModelError> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Cancelled),
            2 => Ok(Self::Ready),
            3 => Ok(Self::Executed),
            other => Err(ModelError::UnknownStatus(other)),
        }
    }

    pub fn code(&self) -> u8 {
        match self {
            Self::Pending => 0,
            Self::Cancelled => 1,
            Self::Ready => 2,
            Self::Executed => 3,
        }
    }
}

/// One entry of the ledger's position request queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionRequest {
    pub index: u64,
    pub is_open: bool,
    pub account: String,
    pub instrument_id: InstrumentId,
    /// Quote amount in (open) or size (close), raw token units.
    #[serde(with = "crate::amount")]
    pub amount_or_size: u128,
    pub block_time: i64,
    pub status: RequestStatus,
    /// Size out (open) or amount out (close) once executed, raw units.
    #[serde(with = "crate::amount", default)]
    pub size_out_or_amount_out: u128,
    /// Execution price once executed, scaled by 10^30.
    #[serde(with = "crate::amount", default)]
    pub execution_price: u128,
    #[serde(default)]
    pub process_block_time: i64,
    #[serde(default)]
    pub paths: [String; 2],
}

impl PositionRequest {
    /// Token paid in by an open request. Empty for closes.
    pub fn quote_path(&self) -> &str {
        &self.paths[0]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        for code in 0..4 {
            assert_eq!(RequestStatus::from_code(code).unwrap().code(), code);
        }
        assert!(RequestStatus::from_code(9).is_err());
    }

    #[test]
    fn test_request_from_json_fixture() {
        let json = r#"{
            "index": 12,
            "is_open": true,
            "account": "0xtrader",
            "instrument_id": "0x1",
            "amount_or_size": "250000000",
            "block_time": 1700000000,
            "status": "Ready",
            "paths": ["USDC", ""]
        }"#;
        let req: PositionRequest = serde_json::from_str(json).unwrap();
        assert_eq!(req.amount_or_size, 250_000_000);
        assert_eq!(req.execution_price, 0);
        assert_eq!(req.quote_path(), "USDC");
    }
}
