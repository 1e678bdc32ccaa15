//! # Trade Fee Schedule
//!
//! ## Description
//! Fees are charged on underlying notional (`spot * size * rate`) and capped
//! at a fraction of the option notional, so deep out-of-the-money options
//! never pay more in fees than a set share of their premium.

use olp_models::Strategy;
use serde::{Deserialize, Serialize};

/// Fee rates per trade context plus the premium cap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FeeSchedule {
    /// Opening a single bought option.
    pub open_buy_naked: f64,
    /// Opening a single sold option.
    pub open_sell_naked: f64,
    /// Opening either side of a spread.
    pub open_combo: f64,
    pub close_naked: f64,
    pub close_combo: f64,
    /// Fee can not exceed `notional * cap_rate`.
    pub cap_rate: f64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            open_buy_naked: 0.0003,
            open_sell_naked: 0.0003,
            open_combo: 0.0003,
            close_naked: 0.0003,
            close_combo: 0.0003,
            cap_rate: 0.125,
        }
    }
}

impl FeeSchedule {
    /// Rate applicable to a trade.
    pub fn rate_for(&self, strategy: Strategy, is_open: bool) -> f64 {
        match (is_open, strategy.is_spread()) {
            (true, false) if strategy.is_buy() => self.open_buy_naked,
            (true, false) => self.open_sell_naked,
            (true, true) => self.open_combo,
            (false, false) => self.close_naked,
            (false, true) => self.close_combo,
        }
    }

    /// Capped trade fee in USD.
    ///
    /// # Parameters
    /// * `spot` - Underlying spot index
    /// * `size` - Position size in underlying units
    /// * `rate` - Fee rate from [`FeeSchedule::rate_for`]
    /// * `notional` - Option notional the cap is measured against
    ///
    /// # Returns
    /// `min(spot * size * rate, notional * cap_rate)`
    pub fn trade_fee(&self, spot: f64, size: f64, rate: f64, notional: f64) -> f64 {
        let fee = spot * size * rate;
        let cap = notional * self.cap_rate;
        fee.min(cap)
    }
}
