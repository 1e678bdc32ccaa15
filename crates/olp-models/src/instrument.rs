//! # Instrument Id
//!
//! Opaque 256-bit identifier of an option position token.
//!
//! ## Description
//! Stored as four little-endian 64-bit limbs (limb 0 holds bits 0..64).
//! This type only offers bit-field access and text conversion; the field
//! layout lives with the codec in the options crate. Ids parse from
//! `0x`-prefixed hex or from decimal and always render as hex.

use crate::error::ModelError;
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrumentId([u64; 4]);

impl InstrumentId {
    pub const ZERO: InstrumentId = InstrumentId([0; 4]);

    pub fn from_limbs(limbs: [u64; 4]) -> Self {
        Self(limbs)
    }

    pub fn limbs(&self) -> [u64; 4] {
        self.0
    }

    /// Reads `len` bits (at most 64) starting at bit `offset`.
    pub fn bits(&self, offset: u32, len: u32) -> u64 {
        debug_assert!(len <= 64 && offset + len <= 256);
        let mut out = 0u64;
        for i in 0..len {
            let pos = offset + i;
            let bit = (self.0[(pos / 64) as usize] >> (pos % 64)) & 1;
            out |= bit << i;
        }
        out
    }

    /// Writes the low `len` bits of `value` at bit `offset`.
    pub fn set_bits(&mut self, offset: u32, len: u32, value: u64) {
        debug_assert!(len <= 64 && offset + len <= 256);
        for i in 0..len {
            let pos = offset + i;
            let limb = &mut self.0[(pos / 64) as usize];
            let mask = 1u64 << (pos % 64);
            if (value >> i) & 1 == 1 {
                *limb |= mask;
            } else {
                *limb &= !mask;
            }
        }
    }

    pub fn to_hex(&self) -> String {
        format!(
            "0x{:016x}{:016x}{:016x}{:016x}",
            self.0[3], self.0[2], self.0[1], self.0[0]
        )
    }

    fn parse_hex(digits: &str) -> Option<Self> {
        if digits.is_empty() || digits.len() > 64 {
            return None;
        }
        let mut limbs = [0u64; 4];
        for (i, c) in digits.chars().rev().enumerate() {
            let nibble = c.to_digit(16)? as u64;
            limbs[i / 16] |= nibble << ((i % 16) * 4);
        }
        Some(Self(limbs))
    }

    fn parse_decimal(digits: &str) -> Option<Self> {
        if digits.is_empty() {
            return None;
        }
        let mut limbs = [0u64; 4];
        for c in digits.chars() {
            let digit = c.to_digit(10)? as u128;
            let mut carry = digit;
            for limb in limbs.iter_mut() {
                let wide = (*limb as u128) * 10 + carry;
                *limb = wide as u64;
                carry = wide >> 64;
            }
            if carry != 0 {
                return None;
            }
        }
        Some(Self(limbs))
    }
}

impl fmt::Display for InstrumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for InstrumentId {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let parsed = match trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
            Some(hex) => Self::parse_hex(hex),
            None => Self::parse_decimal(trimmed),
        };
        parsed.ok_or_else(|| ModelError::InvalidInstrumentId(s.to_string()))
    }
}

impl Serialize for InstrumentId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for InstrumentId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
