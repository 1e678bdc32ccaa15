//! # Pool Greeks
//!
//! Aggregate first and second order sensitivities of the option exposure a
//! tranche holds on one underlying.
//!
//! ## Description
//! Greeks are additive across positions, so trade exposure is folded into a
//! pool by plain vector addition or subtraction. Vega is expressed per one
//! volatility point and theta per calendar day.
//!
//! ## References
//! - Hull, J. C. Options, Futures, and Other Derivatives, ch. 19
//! - IEEE Std 1016-2009: Software Design Descriptions

use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Neg, Sub, SubAssign};

/// Delta/gamma/vega/theta vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Greeks {
    pub delta: f64,
    pub gamma: f64,
    pub vega: f64,
    pub theta: f64,
}

impl Greeks {
    pub const ZERO: Greeks = Greeks { delta: 0.0, gamma: 0.0, vega: 0.0, theta: 0.0 };

    pub fn new(delta: f64, gamma: f64, vega: f64, theta: f64) -> Self {
        Self { delta, gamma, vega, theta }
    }

    /// Multiplies every component by `factor`.
    pub fn scale(&self, factor: f64) -> Self {
        Self {
            delta: self.delta * factor,
            gamma: self.gamma * factor,
            vega: self.vega * factor,
            theta: self.theta * factor,
        }
    }

    /// The three components the risk premium reacts to, in model order.
    pub fn risk_components(&self) -> [f64; 3] {
        [self.delta, self.vega, self.theta]
    }

    pub fn is_finite(&self) -> bool {
        self.delta.is_finite() && self.gamma.is_finite() && self.vega.is_finite() && self.theta.is_finite()
    }
}

impl Add for Greeks {
    type Output = Greeks;

    fn add(self, rhs: Greeks) -> Greeks {
        Greeks {
            delta: self.delta + rhs.delta,
            gamma: self.gamma + rhs.gamma,
            vega: self.vega + rhs.vega,
            theta: self.theta + rhs.theta,
        }
    }
}

impl Sub for Greeks {
    type Output = Greeks;

    fn sub(self, rhs: Greeks) -> Greeks {
        self + (-rhs)
    }
}

impl Neg for Greeks {
    type Output = Greeks;

    fn neg(self) -> Greeks {
        self.scale(-1.0)
    }
}

impl AddAssign for Greeks {
    fn add_assign(&mut self, rhs: Greeks) {
        *self = *self + rhs;
    }
}

impl SubAssign for Greeks {
    fn sub_assign(&mut self, rhs: Greeks) {
        *self = *self - rhs;
    }
}
