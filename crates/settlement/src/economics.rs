//! Vault solvency arithmetic: expected value, return-to-player, funding
//! floors and the reserve held back for unopened boxes.

use crate::config::{PayoutMultipliers, TierBracket};
use crate::error::{Result, SettlementError};

/// Expected payout per box as a multiple of the box price, for one
/// calibration bracket. 0.94 means a 94% return to the player.
pub fn tier_ev(bracket: &TierBracket, multipliers: &PayoutMultipliers) -> f64 {
    (bracket.dud / 100.0) * multipliers.dud
        + (bracket.rebate / 100.0) * multipliers.rebate
        + (bracket.breakeven / 100.0) * multipliers.breakeven
        + (bracket.profit / 100.0) * multipliers.profit
        + (bracket.jackpot() / 100.0) * multipliers.jackpot
}

pub fn rtp(bracket: &TierBracket, multipliers: &PayoutMultipliers) -> f64 {
    tier_ev(bracket, multipliers) * 100.0
}

pub fn house_edge(bracket: &TierBracket, multipliers: &PayoutMultipliers) -> f64 {
    100.0 - rtp(bracket, multipliers)
}

/// Vault funding a project must show before its boxes go on sale. A flat
/// multiple of the box price, sized to absorb early jackpot clustering
/// rather than derived from a variance bound.
pub fn minimum_vault_funding(box_price: u64, funding_multiple: u64) -> Result<u64> {
    box_price
        .checked_mul(funding_multiple)
        .ok_or(SettlementError::MathOverflow)
}

/// Per-box reserve multiplier: the EV of whichever bracket pays players
/// best. Reserving at the most player-favourable odds keeps the vault
/// solvent no matter how long holders wait before opening.
pub fn expected_reserve(brackets: &[TierBracket; 3], multipliers: &PayoutMultipliers) -> f64 {
    brackets
        .iter()
        .map(|bracket| tier_ev(bracket, multipliers))
        .fold(0.0, f64::max)
}

/// Amount withheld from withdrawals to cover `unopened_count` boxes at the
/// given reserve multiplier. Rounds up to the next smallest token unit.
pub fn unopened_box_reserve(
    box_price: u64,
    unopened_count: u64,
    reserve_multiplier: f64,
) -> Result<u64> {
    if unopened_count == 0 {
        return Ok(0);
    }
    let raw = box_price as f64 * unopened_count as f64 * reserve_multiplier;
    if !raw.is_finite() || raw < 0.0 || raw >= u64::MAX as f64 {
        return Err(SettlementError::MathOverflow);
    }
    Ok(raw.ceil() as u64)
}

/// Reserve for a project's current calibration, the form the withdrawal
/// evaluator consumes.
pub fn withdrawal_reserve(
    box_price: u64,
    unopened_count: u64,
    brackets: &[TierBracket; 3],
    multipliers: &PayoutMultipliers,
) -> Result<u64> {
    let multiplier = expected_reserve(brackets, multipliers);
    unopened_box_reserve(box_price, unopened_count, multiplier)
}
