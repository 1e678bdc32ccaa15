//! # Futures Option Pricing
//!
//! Black-76 mark price and position Greeks on the underlying futures.
//!
//! ## Description
//! Options are marked against the expiry-matched futures level, so the
//! carry is already embedded in the forward and the discount rate is zero.
//! Time is measured from the market snapshot's `as_of`, never from the
//! wall clock.
//!
//! ## References
//! - Black, F. (1976). The Pricing of Commodity Contracts.
//! - Abramowitz, M., & Stegun, I. A. (1964). Handbook of Mathematical Functions.
//! - IEEE Std 1016-2009: Software Design Descriptions

use olp_models::Greeks;
use std::f64::consts::PI;

pub const SECONDS_PER_DAY: f64 = 86_400.0;
pub const SECONDS_PER_YEAR: f64 = SECONDS_PER_DAY * 365.0;

/// Standard normal CDF Φ(x).
pub fn norm_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / 2.0_f64.sqrt()))
}

/// Standard normal PDF φ(x).
pub fn norm_pdf(x: f64) -> f64 {
    (-0.5 * x * x).exp() / (2.0 * PI).sqrt()
}

/// Abramowitz & Stegun 7.1.26, max error 1.5e-7.
fn erf(x: f64) -> f64 {
    const A: [f64; 5] = [0.254829592, -0.284496736, 1.421413741, -1.453152027, 1.061405429];
    const P: f64 = 0.3275911;

    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let t = 1.0 / (1.0 + P * x);
    let poly = ((((A[4] * t + A[3]) * t + A[2]) * t + A[1]) * t + A[0]) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Signed days between `as_of` and `expiry` (both unix seconds).
pub fn days_to_expiry(as_of: i64, expiry: i64) -> f64 {
    (expiry - as_of) as f64 / SECONDS_PER_DAY
}

/// Signed years to expiry, rounded to 6 decimals.
pub fn years_to_expiry(as_of: i64, expiry: i64) -> f64 {
    let years = days_to_expiry(as_of, expiry) / 365.0;
    (years * 1e6).round() / 1e6
}

fn d1(futures: f64, strike: f64, years: f64, vol: f64) -> f64 {
    ((futures / strike).ln() + 0.5 * vol * vol * years) / (vol * years.sqrt())
}

/// Black-76 premium with zero discounting.
///
/// # Parameters
/// * `futures` - Expiry-matched futures level
/// * `strike` - Option strike
/// * `years` - Time to expiry in years
/// * `vol` - Implied volatility (decimal)
///
/// # Returns
/// Option premium, or `0.0` when any input is non-positive.
pub fn black76_price(futures: f64, strike: f64, years: f64, vol: f64, is_call: bool) -> f64 {
    if futures <= 0.0 || strike <= 0.0 || vol <= 0.0 || years <= 0.0 {
        return 0.0;
    }
    let d1 = d1(futures, strike, years, vol);
    let d2 = d1 - vol * years.sqrt();
    if is_call {
        futures * norm_cdf(d1) - strike * norm_cdf(d2)
    } else {
        strike * norm_cdf(-d2) - futures * norm_cdf(-d1)
    }
}

/// Greeks of a `size`-unit position in one option leg.
///
/// # Description
/// Long positions carry positive size, short positions negative. Vega is
/// per volatility point and theta per calendar day. Degenerate inputs
/// (zero size, non-positive futures/strike/vol/time) yield zero Greeks.
pub fn position_greeks(
    futures: f64,
    strike: f64,
    years: f64,
    vol: f64,
    is_call: bool,
    is_buy: bool,
    size: f64,
) -> Greeks {
    if size == 0.0 || futures <= 0.0 || strike <= 0.0 || vol <= 0.0 || years <= 0.0 {
        return Greeks::ZERO;
    }
    let signed = if is_buy { size } else { -size };
    let sqrt_t = years.sqrt();
    let d1 = d1(futures, strike, years, vol);
    let pdf = norm_pdf(d1);

    let delta = if is_call {
        signed * norm_cdf(d1)
    } else {
        signed * (norm_cdf(d1) - 1.0)
    };
    let gamma = signed * pdf / (futures * vol * sqrt_t);
    let vega = signed * futures * sqrt_t * pdf / 100.0;
    let theta = -signed * (futures * pdf * vol / (2.0 * sqrt_t)) / 365.0;

    // -0.0 from a zero product reads badly in audit rows
    let theta = if theta == 0.0 { 0.0 } else { theta };

    Greeks { delta, gamma, vega, theta }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_call_parity_on_futures() {
        let (f, k, t, v) = (60_000.0, 62_000.0, 30.0 / 365.0, 0.55);
        let call = black76_price(f, k, t, v, true);
        let put = black76_price(f, k, t, v, false);
        assert!((call - put - (f - k)).abs() < 1e-6, "C - P should equal F - K");
    }

    #[test]
    fn test_degenerate_inputs_price_zero() {
        assert_eq!(black76_price(60_000.0, 60_000.0, 0.0, 0.5, true), 0.0);
        assert_eq!(black76_price(60_000.0, 60_000.0, 0.1, 0.0, false), 0.0);
        assert_eq!(position_greeks(60_000.0, 60_000.0, -0.1, 0.5, true, true, 1.0), Greeks::ZERO);
    }

    #[test]
    fn test_short_position_mirrors_long() {
        let long = position_greeks(3_000.0, 3_100.0, 0.05, 0.7, true, true, 2.0);
        let short = position_greeks(3_000.0, 3_100.0, 0.05, 0.7, true, false, 2.0);
        assert!(long.delta > 0.0 && long.delta < 2.0);
        assert!((long.delta + short.delta).abs() < 1e-12);
        assert!(long.theta < 0.0 && short.theta > 0.0);
    }

    #[test]
    fn test_put_delta_range() {
        let g = position_greeks(60_000.0, 60_000.0, 0.1, 0.5, false, true, 1.0);
        assert!(g.delta < 0.0 && g.delta > -1.0);
    }

    #[test]
    fn test_years_rounding() {
        assert_eq!(years_to_expiry(0, 365 * 86_400), 1.0);
        assert!(years_to_expiry(100, 0) < 0.0);
    }
}
