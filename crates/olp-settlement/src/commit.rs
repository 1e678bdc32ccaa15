//! # Settlement Commit
//!
//! Commit payload construction, price packing and the committer seam.
//!
//! ## Description
//! Quantized prices travel to the ledger packed eight to a 256-bit word:
//! lane `j` of a word occupies bits `32*j .. 32*j + 32`. Lanes are capped
//! at 2^31. The ledger walks its own queue from the previous cursor to
//! `cursor_after`, consuming one lane per non-cancelled request, so lanes
//! are in request order. Each lane also names the instrument it priced, and
//! the ledger rejects a payload whose instruments disagree with its queue.
//!
//! ## References
//! - IEEE Std 1016-2009: Software Design Descriptions

use crate::error::PackError;
use async_trait::async_trait;
use olp_options::quantize::MAX_PRICE_TICKS;
use olp_models::InstrumentId;
use olp_options::PricedBatch;
use serde::{Serialize, Serializer};
use uuid::Uuid;

pub const LANES_PER_WORD: usize = 8;
const LANE_BITS: usize = 32;

/// One packed 256-bit word, little-endian 64-bit limbs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PriceWord([u64; 4]);

impl PriceWord {
    pub fn lane(&self, j: usize) -> u32 {
        let limb = self.0[j / 2];
        (limb >> ((j % 2) * LANE_BITS)) as u32
    }

    fn set_lane(&mut self, j: usize, value: u32) {
        let shift = (j % 2) * LANE_BITS;
        let limb = &mut self.0[j / 2];
        *limb &= !(0xFFFF_FFFFu64 << shift);
        *limb |= (value as u64) << shift;
    }

    pub fn to_hex(&self) -> String {
        let mut out = String::with_capacity(66);
        out.push_str("0x");
        for limb in self.0.iter().rev() {
            out.push_str(&format!("{limb:016x}"));
        }
        out
    }
}

impl Serialize for PriceWord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Packs quantized prices into ledger words.
pub fn pack_prices(prices: &[u32]) -> Result<Vec<PriceWord>, PackError> {
    let mut words = vec![PriceWord::default(); prices.len().div_ceil(LANES_PER_WORD)];
    for (index, &value) in prices.iter().enumerate() {
        if value as u64 > MAX_PRICE_TICKS {
            return Err(PackError::LaneOverflow { index, value });
        }
        words[index / LANES_PER_WORD].set_lane(index % LANES_PER_WORD, value);
    }
    Ok(words)
}

/// Reads back the first `count` lanes.
pub fn unpack_prices(words: &[PriceWord], count: usize) -> Vec<u32> {
    (0..count)
        .filter_map(|i| words.get(i / LANES_PER_WORD).map(|w| w.lane(i % LANES_PER_WORD)))
        .collect()
}

/// What one batch asks the ledger to settle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommitPayload {
    pub batch_id: Uuid,
    pub as_of: i64,
    /// First queue index not consumed by this batch.
    pub cursor_after: u64,
    /// Queue length reported by the ledger when the batch was loaded.
    pub ledger_end_index: u64,
    /// Indices of the priced requests, in lane order.
    pub request_indices: Vec<u64>,
    pub instrument_ids: Vec<InstrumentId>,
    pub mark_prices: Vec<PriceWord>,
    pub risk_premiums: Vec<PriceWord>,
}

impl CommitPayload {
    pub fn from_batch(batch: &PricedBatch, as_of: i64, ledger_end_index: u64) -> Result<Self, PackError> {
        Ok(Self {
            batch_id: Uuid::new_v4(),
            as_of,
            cursor_after: batch.cursor_after,
            ledger_end_index,
            request_indices: batch.priced.iter().map(|p| p.request.index).collect(),
            instrument_ids: batch.priced.iter().map(|p| p.request.instrument_id).collect(),
            mark_prices: pack_prices(&batch.mark_price_ticks())?,
            risk_premiums: pack_prices(&batch.risk_premium_ticks())?,
        })
    }

    pub fn len(&self) -> usize {
        self.request_indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.request_indices.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommitReceipt {
    /// Ledger reference, e.g. a transaction hash.
    pub reference: String,
    pub committed_at: i64,
}

/// Submits batches to the settlement ledger.
#[async_trait]
pub trait SettlementCommitter: Send + Sync {
    /// Submits one payload.
    ///
    /// # Returns
    /// The ledger receipt. Failures are classified by
    /// [`CommitError::classify`](crate::error::CommitError::classify), so
    /// implementations may return either a typed `CommitError` or the raw
    /// ledger message.
    async fn commit(&self, payload: &CommitPayload) -> anyhow::Result<CommitReceipt>;

    fn name(&self) -> &str;
}
