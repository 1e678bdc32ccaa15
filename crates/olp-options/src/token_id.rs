//! # Instrument Id Codec
//!
//! Bit layout of position token ids and the facts derived from them.
//!
//! ## Description
//! Field layout, most significant first:
//!
//! | bits      | field                               |
//! |-----------|-------------------------------------|
//! | 240..256  | underlying asset index              |
//! | 200..240  | expiry (unix seconds)               |
//! | 196..200  | strategy index                      |
//! | 194..196  | leg count - 1                       |
//! | 146..194  | leg 0: is_buy, strike (46 bits), is_call |
//! | 98..146   | leg 1                               |
//! | 50..98    | leg 2                               |
//! | 2..50     | leg 3                               |
//! | 0..2      | vault index                         |
//!
//! Only the first two legs are used by the tradeable strategies. Legs are
//! stored in ascending strike order.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::CodecError;
use chrono::{DateTime, Datelike};
use olp_models::{InstrumentId, Strategy, Tranche, UnderlyingAsset};
use serde::{Deserialize, Serialize};

const UNDERLYING_OFFSET: u32 = 240;
const EXPIRY_OFFSET: u32 = 200;
const EXPIRY_BITS: u32 = 40;
const STRATEGY_OFFSET: u32 = 196;
const LENGTH_OFFSET: u32 = 194;
const LEG_STRIDE: u32 = 48;
const LEG_IS_BUY_OFFSET: u32 = 193;
const LEG_STRIKE_OFFSET: u32 = 147;
const LEG_IS_CALL_OFFSET: u32 = 146;
const STRIKE_BITS: u32 = 46;
const MAX_LEGS: usize = 4;

const MONTHS: [&str; 12] = [
    "JAN", "FEB", "MAR", "APR", "MAY", "JUN", "JUL", "AUG", "SEP", "OCT", "NOV", "DEC",
];

/// One option leg of a position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionLeg {
    pub is_buy: bool,
    pub strike: u64,
    pub is_call: bool,
}

/// Read-only facts decoded from an instrument id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentFacts {
    pub underlying: UnderlyingAsset,
    pub expiry: i64,
    pub strategy: Strategy,
    /// Used legs only, ascending by strike.
    pub legs: Vec<OptionLeg>,
    pub tranche: Tranche,
}

impl InstrumentFacts {
    pub fn leg_count(&self) -> usize {
        self.legs.len()
    }

    /// Strikes ascending.
    pub fn strikes(&self) -> Vec<f64> {
        self.legs.iter().map(|leg| leg.strike as f64).collect()
    }

    fn is_put_spread(&self) -> bool {
        matches!(self.strategy, Strategy::BuyPutSpread | Strategy::SellPutSpread)
    }

    /// The leg defining directional exposure: the higher strike for put
    /// spreads, the lower strike otherwise.
    pub fn main_leg(&self) -> &OptionLeg {
        if self.is_put_spread() && self.legs.len() == 2 {
            &self.legs[1]
        } else {
            &self.legs[0]
        }
    }

    /// The capping leg of a spread.
    pub fn paired_leg(&self) -> Option<&OptionLeg> {
        if self.legs.len() != 2 {
            return None;
        }
        if self.is_put_spread() {
            Some(&self.legs[0])
        } else {
            Some(&self.legs[1])
        }
    }

    /// Exchange-style name of one leg, e.g. `BTC-26DEC25-100000-C`.
    pub fn leg_name(&self, leg: &OptionLeg) -> String {
        instrument_name(self.underlying, self.expiry, leg.strike, leg.is_call)
    }

    pub fn date_code(&self) -> String {
        date_code(self.expiry)
    }
}

/// Expiry date segment of an instrument name (`26DEC25`, `5JUN25`).
pub fn date_code(expiry: i64) -> String {
    match DateTime::from_timestamp(expiry, 0) {
        Some(dt) => format!(
            "{}{}{:02}",
            dt.day(),
            MONTHS[dt.month0() as usize],
            dt.year().rem_euclid(100)
        ),
        None => String::new(),
    }
}

pub fn instrument_name(asset: UnderlyingAsset, expiry: i64, strike: u64, is_call: bool) -> String {
    format!(
        "{}-{}-{}-{}",
        asset.ticker(),
        date_code(expiry),
        strike,
        if is_call { "C" } else { "P" }
    )
}

/// Components of an instrument name.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedInstrument {
    pub underlying: UnderlyingAsset,
    pub date_code: String,
    pub strike: f64,
    pub is_call: bool,
}

pub fn parse_instrument_name(name: &str) -> Option<ParsedInstrument> {
    let mut parts = name.split('-');
    let underlying = parts.next()?.parse().ok()?;
    let date_code = parts.next()?.to_string();
    let strike = parts.next()?.parse().ok()?;
    let is_call = match parts.next()? {
        "C" => true,
        "P" => false,
        _ => return None,
    };
    if parts.next().is_some() {
        return None;
    }
    Some(ParsedInstrument { underlying, date_code, strike, is_call })
}

/// Classifies ascending-strike legs into a strategy.
pub fn determine_strategy(legs: &[OptionLeg]) -> Option<Strategy> {
    match legs {
        [leg] => Some(Strategy::compose(leg.is_buy, leg.is_call, false)),
        [low, high] => {
            if low.strike >= high.strike || low.is_call != high.is_call || low.is_buy == high.is_buy {
                return None;
            }
            let is_call = low.is_call;
            // call spreads are bought via the low strike, put spreads via the high strike
            let is_buy = if is_call { low.is_buy } else { high.is_buy };
            Some(Strategy::compose(is_buy, is_call, true))
        }
        _ => None,
    }
}

/// Decodes and validates an instrument id.
///
/// # Returns
/// [`InstrumentFacts`] or a [`CodecError`] for unknown assets, unsupported
/// strategies, bad leg counts, zero strikes, an out-of-range vault index or
/// legs inconsistent with the encoded strategy.
pub fn decode(id: &InstrumentId) -> Result<InstrumentFacts, CodecError> {
    let underlying = UnderlyingAsset::from_index(id.bits(UNDERLYING_OFFSET, 16) as u16)?;
    let expiry = id.bits(EXPIRY_OFFSET, EXPIRY_BITS) as i64;
    let strategy = Strategy::from_index(id.bits(STRATEGY_OFFSET, 4) as u8)?;
    let leg_count = id.bits(LENGTH_OFFSET, 2) as usize + 1;
    if leg_count != strategy.leg_count() {
        return Err(CodecError::InvalidLegCount(leg_count));
    }

    let mut legs = Vec::with_capacity(leg_count);
    for i in 0..leg_count {
        let shift = LEG_STRIDE * i as u32;
        let leg = OptionLeg {
            is_buy: id.bits(LEG_IS_BUY_OFFSET - shift, 1) == 1,
            strike: id.bits(LEG_STRIKE_OFFSET - shift, STRIKE_BITS),
            is_call: id.bits(LEG_IS_CALL_OFFSET - shift, 1) == 1,
        };
        if leg.strike == 0 {
            return Err(CodecError::ZeroStrike(i));
        }
        legs.push(leg);
    }

    let derived = determine_strategy(&legs).ok_or(CodecError::UnsupportedLegs)?;
    if derived != strategy {
        return Err(CodecError::StrategyMismatch {
            encoded: strategy.to_string(),
            derived: derived.to_string(),
        });
    }

    let tranche = Tranche::from_vault_index(id.bits(0, 2) as u8)?;

    Ok(InstrumentFacts { underlying, expiry, strategy, legs, tranche })
}

/// Builds an instrument id. Legs may be passed in any order.
pub fn encode(
    underlying: UnderlyingAsset,
    expiry: i64,
    legs: &[OptionLeg],
    tranche: Tranche,
) -> Result<InstrumentId, CodecError> {
    if legs.is_empty() || legs.len() > 2 {
        return Err(CodecError::InvalidLegCount(legs.len()));
    }
    if expiry < 0 || expiry >= (1i64 << EXPIRY_BITS) {
        return Err(CodecError::ExpiryOutOfRange(expiry));
    }
    let mut sorted = legs.to_vec();
    sorted.sort_by_key(|leg| leg.strike);
    for (i, leg) in sorted.iter().enumerate() {
        if leg.strike == 0 {
            return Err(CodecError::ZeroStrike(i));
        }
        if leg.strike >= (1u64 << STRIKE_BITS) {
            return Err(CodecError::StrikeOverflow(leg.strike));
        }
    }
    let strategy = determine_strategy(&sorted).ok_or(CodecError::UnsupportedLegs)?;

    let mut id = InstrumentId::ZERO;
    id.set_bits(UNDERLYING_OFFSET, 16, underlying.index() as u64);
    id.set_bits(EXPIRY_OFFSET, EXPIRY_BITS, expiry as u64);
    id.set_bits(STRATEGY_OFFSET, 4, strategy.index() as u64);
    id.set_bits(LENGTH_OFFSET, 2, (sorted.len() - 1) as u64);
    for (i, leg) in sorted.iter().enumerate().take(MAX_LEGS) {
        let shift = LEG_STRIDE * i as u32;
        id.set_bits(LEG_IS_BUY_OFFSET - shift, 1, leg.is_buy as u64);
        id.set_bits(LEG_STRIKE_OFFSET - shift, STRIKE_BITS, leg.strike);
        id.set_bits(LEG_IS_CALL_OFFSET - shift, 1, leg.is_call as u64);
    }
    id.set_bits(0, 2, tranche.vault_index() as u64);
    Ok(id)
}

/// Legs of a vertical spread with the given side and direction.
pub fn spread_legs(strikes: [u64; 2], is_call: bool, is_buy: bool) -> [OptionLeg; 2] {
    let low = strikes[0].min(strikes[1]);
    let high = strikes[0].max(strikes[1]);
    let (low_buy, high_buy) = if is_call { (is_buy, !is_buy) } else { (!is_buy, is_buy) };
    [
        OptionLeg { is_buy: low_buy, strike: low, is_call },
        OptionLeg { is_buy: high_buy, strike: high, is_call },
    ]
}
