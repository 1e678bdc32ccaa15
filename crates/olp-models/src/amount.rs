//! Serde helpers for raw ledger integers.
//!
//! Ledger amounts routinely exceed 2^53, so they travel as decimal strings
//! in JSON. Plain numbers are accepted on input for hand-written fixtures.

use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum RawRepr {
    Text(String),
    Number(u64),
}

fn parse_raw<E: de::Error>(repr: RawRepr) -> Result<u128, E> {
    match repr {
        RawRepr::Number(n) => Ok(n as u128),
        RawRepr::Text(s) => s
            .trim()
            .parse::<u128>()
            .map_err(|e| E::custom(format!("invalid raw amount '{}': {}", s, e))),
    }
}

pub fn serialize<S: Serializer>(value: &u128, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u128, D::Error> {
    parse_raw(RawRepr::deserialize(deserializer)?)
}

/// Ledger USD figures are integers scaled by 10^30.
pub mod usd30 {
    pub const SCALE: f64 = 1e30;

    pub fn to_usd(raw: u128) -> f64 {
        raw as f64 / SCALE
    }
}
