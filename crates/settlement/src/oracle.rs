//! Randomness oracle seam and the raw account decode.

use anchor_lang::prelude::Pubkey;
use async_trait::async_trait;

use crate::constants::{
    RANDOMNESS_MIN_ACCOUNT_LEN, RANDOMNESS_REVEAL_SLOT_OFFSET, RANDOMNESS_VALUE_LEN,
    RANDOMNESS_VALUE_OFFSET,
};
use crate::error::{Result, SettlementError};

/// Two-call randomness service. A commit creates a round; a later reveal
/// returns the raw randomness account bytes once oracles have published.
#[async_trait]
pub trait RandomnessOracle: Send + Sync {
    /// Creates a new randomness round on `queue` and returns its handle.
    async fn create_round(&self, queue: &Pubkey) -> Result<Pubkey>;

    /// Fetches the raw randomness account bytes for a round. Readiness is
    /// judged by [`decode_randomness`], not by the transport.
    async fn reveal(&self, round: &Pubkey) -> Result<Vec<u8>>;
}

/// Outcome-relevant slice of a randomness account.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RandomnessValue {
    /// Slot the oracles revealed in.
    pub reveal_slot: u64,
    /// The 32 revealed randomness bytes.
    pub value: [u8; RANDOMNESS_VALUE_LEN],
    /// Little-endian u32 of the first four value bytes, the draw the
    /// reveal transaction commits to.
    pub random_u32: u32,
    /// `random_u32 / u32::MAX * 100`, in [0, 100].
    pub percentage: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DecodedRandomness {
    /// Account exists but `reveal_slot` is still zero.
    Pending,
    Revealed(RandomnessValue),
}

/// Reads the reveal slot and value out of a raw randomness account.
///
/// Layout (after the 8-byte discriminator: authority, queue, seed
/// slothash, seed slot, oracle): `reveal_slot` is the little-endian u64
/// at bytes 144..152, the value is bytes 152..184.
pub fn decode_randomness(data: &[u8]) -> Result<DecodedRandomness> {
    if data.len() < RANDOMNESS_MIN_ACCOUNT_LEN {
        return Err(SettlementError::MalformedRandomness { len: data.len() });
    }

    let slot_bytes: [u8; 8] = data
        [RANDOMNESS_REVEAL_SLOT_OFFSET..RANDOMNESS_REVEAL_SLOT_OFFSET + 8]
        .try_into()
        .map_err(|_| SettlementError::MalformedRandomness { len: data.len() })?;
    let reveal_slot = u64::from_le_bytes(slot_bytes);
    if reveal_slot == 0 {
        return Ok(DecodedRandomness::Pending);
    }

    let value: [u8; RANDOMNESS_VALUE_LEN] = data
        [RANDOMNESS_VALUE_OFFSET..RANDOMNESS_VALUE_OFFSET + RANDOMNESS_VALUE_LEN]
        .try_into()
        .map_err(|_| SettlementError::MalformedRandomness { len: data.len() })?;

    let u32_bytes: [u8; 4] = value[..4]
        .try_into()
        .map_err(|_| SettlementError::MalformedRandomness { len: data.len() })?;
    let random_u32 = u32::from_le_bytes(u32_bytes);
    let percentage = random_u32 as f64 / u32::MAX as f64 * 100.0;

    Ok(DecodedRandomness::Revealed(RandomnessValue {
        reveal_slot,
        value,
        random_u32,
        percentage,
    }))
}
