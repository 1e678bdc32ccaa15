//! # Option Strategies
//!
//! The eight tradeable strategies and their ledger indices.
//!
//! ## Description
//! A strategy fixes the order side, the option direction and whether the
//! position is a single option or a two-leg vertical spread. The index is
//! the 4-bit value stored in instrument ids (0 is reserved for "not
//! supported").

use crate::error::ModelError;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Strategy {
    BuyCall,
    SellCall,
    BuyPut,
    SellPut,
    BuyCallSpread,
    SellCallSpread,
    BuyPutSpread,
    SellPutSpread,
}

impl Strategy {
    pub const ALL: [Strategy; 8] = [
        Strategy::BuyCall,
        Strategy::SellCall,
        Strategy::BuyPut,
        Strategy::SellPut,
        Strategy::BuyCallSpread,
        Strategy::SellCallSpread,
        Strategy::BuyPutSpread,
        Strategy::SellPutSpread,
    ];

    pub fn from_index(index: u8) -> Result<Self, ModelError> {
        match index {
            1 => Ok(Self::BuyCall),
            2 => Ok(Self::SellCall),
            3 => Ok(Self::BuyPut),
            4 => Ok(Self::SellPut),
            5 => Ok(Self::BuyCallSpread),
            6 => Ok(Self::SellCallSpread),
            7 => Ok(Self::BuyPutSpread),
            8 => Ok(Self::SellPutSpread),
            other => Err(ModelError::UnsupportedStrategy(other)),
        }
    }

    pub fn index(&self) -> u8 {
        match self {
            Self::BuyCall => 1,
            Self::SellCall => 2,
            Self::BuyPut => 3,
            Self::SellPut => 4,
            Self::BuyCallSpread => 5,
            Self::SellCallSpread => 6,
            Self::BuyPutSpread => 7,
            Self::SellPutSpread => 8,
        }
    }

    /// Builds a strategy from side, direction and shape.
    pub fn compose(is_buy: bool, is_call: bool, is_spread: bool) -> Self {
        match (is_buy, is_call, is_spread) {
            (true, true, false) => Self::BuyCall,
            (false, true, false) => Self::SellCall,
            (true, false, false) => Self::BuyPut,
            (false, false, false) => Self::SellPut,
            (true, true, true) => Self::BuyCallSpread,
            (false, true, true) => Self::SellCallSpread,
            (true, false, true) => Self::BuyPutSpread,
            (false, false, true) => Self::SellPutSpread,
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(
            self,
            Self::BuyCall | Self::BuyPut | Self::BuyCallSpread | Self::BuyPutSpread
        )
    }

    pub fn is_call(&self) -> bool {
        matches!(
            self,
            Self::BuyCall | Self::SellCall | Self::BuyCallSpread | Self::SellCallSpread
        )
    }

    pub fn is_spread(&self) -> bool {
        matches!(
            self,
            Self::BuyCallSpread | Self::SellCallSpread | Self::BuyPutSpread | Self::SellPutSpread
        )
    }

    pub fn leg_count(&self) -> usize {
        if self.is_spread() { 2 } else { 1 }
    }

    /// Same direction and shape, other side. The pool takes the opposite
    /// strategy of every trader open.
    pub fn opposite(&self) -> Self {
        Self::compose(!self.is_buy(), self.is_call(), self.is_spread())
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::BuyCall => "BuyCall",
            Self::SellCall => "SellCall",
            Self::BuyPut => "BuyPut",
            Self::SellPut => "SellPut",
            Self::BuyCallSpread => "BuyCallSpread",
            Self::SellCallSpread => "SellCallSpread",
            Self::BuyPutSpread => "BuyPutSpread",
            Self::SellPutSpread => "SellPutSpread",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
