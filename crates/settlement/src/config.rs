//! Per-project calibration and process-level engine options. Project
//! settings arrive as JSON from the operator dashboard, so field names
//! follow that surface and missing keys fall back to the defaults.

use std::time::Duration;

use anchor_lang::prelude::Pubkey;
use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BASE_LUCK, DEFAULT_BREAKEVEN_MULTIPLIER, DEFAULT_COMMISSION_BPS,
    DEFAULT_DUD_MULTIPLIER, DEFAULT_FUNDING_MULTIPLE, DEFAULT_JACKPOT_MULTIPLIER,
    DEFAULT_LUCK_INTERVAL_SECONDS, DEFAULT_MAX_LUCK, DEFAULT_PROFIT_MULTIPLIER,
    DEFAULT_REBATE_MULTIPLIER, DEFAULT_REVEAL_RETRY_DELAY_SECS, DEFAULT_REVEAL_WINDOW_SECONDS,
    DEFAULT_TIER_BRACKETS, MAX_BOXES_PER_REQUEST, MAX_COMMISSION_BPS, MINT_TIME_CACHE_TTL_SECS,
    MINT_TIME_LOOKUP_TIMEOUT_SECS, SWEEP_CHUNK_DELAY_MS, SWEEP_CHUNK_SIZE,
};
use crate::error::{Result, SettlementError};

/// One row of the tier calibration. Boxes whose luck falls at or below
/// `luck_threshold` draw from these odds, with linear interpolation
/// between neighbouring rows.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TierBracket {
    pub luck_threshold: u8,
    pub dud: f64,
    pub rebate: f64,
    pub breakeven: f64,
    pub profit: f64,
}

impl TierBracket {
    /// Jackpot odds are never configured directly, they absorb whatever
    /// the four named tiers leave below 100.
    pub fn jackpot(&self) -> f64 {
        (100.0 - (self.dud + self.rebate + self.breakeven + self.profit)).max(0.0)
    }
}

/// Multiple of the box price paid for each tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PayoutMultipliers {
    pub dud: f64,
    pub rebate: f64,
    pub breakeven: f64,
    pub profit: f64,
    pub jackpot: f64,
}

impl Default for PayoutMultipliers {
    fn default() -> Self {
        Self {
            dud: DEFAULT_DUD_MULTIPLIER,
            rebate: DEFAULT_REBATE_MULTIPLIER,
            breakeven: DEFAULT_BREAKEVEN_MULTIPLIER,
            profit: DEFAULT_PROFIT_MULTIPLIER,
            jackpot: DEFAULT_JACKPOT_MULTIPLIER,
        }
    }
}

/// Everything an operator can tune per project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ProjectSettings {
    /// Luck granted to every box at reveal time regardless of hold.
    pub base_luck: u8,
    /// Cap on accrued luck.
    pub max_luck: u8,
    /// Seconds of holding that earn one point of luck.
    pub luck_interval_seconds: i64,
    pub tier_brackets: [TierBracket; 3],
    pub payout_multipliers: PayoutMultipliers,
    /// Seconds a committed box may wait for its reveal before refunds open.
    pub reveal_window_seconds: i64,
    /// Platform cut on box purchases, in basis points.
    pub commission_bps: u16,
    /// Box prices the vault must hold before boxes go on sale.
    pub funding_multiple: u64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            base_luck: DEFAULT_BASE_LUCK,
            max_luck: DEFAULT_MAX_LUCK,
            luck_interval_seconds: DEFAULT_LUCK_INTERVAL_SECONDS,
            tier_brackets: default_brackets(),
            payout_multipliers: PayoutMultipliers::default(),
            reveal_window_seconds: DEFAULT_REVEAL_WINDOW_SECONDS,
            commission_bps: DEFAULT_COMMISSION_BPS,
            funding_multiple: DEFAULT_FUNDING_MULTIPLE,
        }
    }
}

fn default_brackets() -> [TierBracket; 3] {
    DEFAULT_TIER_BRACKETS.map(|(luck_threshold, dud, rebate, breakeven, profit)| TierBracket {
        luck_threshold,
        dud,
        rebate,
        breakeven,
        profit,
    })
}

impl ProjectSettings {
    /// Rejects calibration that would make settlement misbehave rather
    /// than letting a bad config surface as a wrong payout later.
    pub fn validate(&self) -> Result<()> {
        if self.base_luck > self.max_luck {
            return Err(SettlementError::InvalidConfig(format!(
                "baseLuck {} exceeds maxLuck {}",
                self.base_luck, self.max_luck
            )));
        }
        if self.max_luck > 100 {
            return Err(SettlementError::InvalidConfig(format!(
                "maxLuck {} exceeds 100",
                self.max_luck
            )));
        }
        if self.luck_interval_seconds < 0 {
            return Err(SettlementError::InvalidConfig(
                "luckIntervalSeconds is negative".to_string(),
            ));
        }
        if self.reveal_window_seconds <= 0 {
            return Err(SettlementError::InvalidConfig(
                "revealWindowSeconds must be positive".to_string(),
            ));
        }
        if self.commission_bps > MAX_COMMISSION_BPS {
            return Err(SettlementError::InvalidConfig(format!(
                "commissionBps {} exceeds the {} cap",
                self.commission_bps, MAX_COMMISSION_BPS
            )));
        }
        if self.funding_multiple == 0 {
            return Err(SettlementError::InvalidConfig(
                "fundingMultiple must be at least 1".to_string(),
            ));
        }

        let mut prev_threshold = None;
        for (idx, bracket) in self.tier_brackets.iter().enumerate() {
            if let Some(prev) = prev_threshold {
                if bracket.luck_threshold <= prev {
                    return Err(SettlementError::InvalidConfig(format!(
                        "tierBrackets[{idx}] threshold {} does not ascend past {prev}",
                        bracket.luck_threshold
                    )));
                }
            }
            prev_threshold = Some(bracket.luck_threshold);

            let parts = [bracket.dud, bracket.rebate, bracket.breakeven, bracket.profit];
            if parts.iter().any(|p| !p.is_finite() || *p < 0.0) {
                return Err(SettlementError::InvalidConfig(format!(
                    "tierBrackets[{idx}] has a negative or non-finite percentage"
                )));
            }
            let sum: f64 = parts.iter().sum();
            if sum > 100.0 {
                return Err(SettlementError::InvalidConfig(format!(
                    "tierBrackets[{idx}] percentages sum to {sum}, above 100"
                )));
            }
        }

        let m = &self.payout_multipliers;
        let multipliers = [m.dud, m.rebate, m.breakeven, m.profit, m.jackpot];
        if multipliers.iter().any(|m| !m.is_finite() || *m < 0.0) {
            return Err(SettlementError::InvalidConfig(
                "payoutMultipliers must be finite and non-negative".to_string(),
            ));
        }

        Ok(())
    }
}

/// Process-level wiring for a [`crate::SettlementEngine`]. These are not
/// per-project knobs, they describe the deployment the engine talks to.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Program that owns box settlement accounts.
    pub program_id: Pubkey,
    /// Switchboard queue new randomness rounds are created on.
    pub queue: Pubkey,
    /// Wait between the two oracle polls a reveal is allowed.
    pub reveal_retry_delay: Duration,
    pub max_batch_boxes: usize,
    pub sweep_chunk_size: usize,
    pub sweep_chunk_delay: Duration,
    pub mint_time_timeout: Duration,
    pub mint_cache_ttl_seconds: i64,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            program_id: crate::ID,
            queue: Pubkey::default(),
            reveal_retry_delay: Duration::from_secs(DEFAULT_REVEAL_RETRY_DELAY_SECS),
            max_batch_boxes: MAX_BOXES_PER_REQUEST,
            sweep_chunk_size: SWEEP_CHUNK_SIZE,
            sweep_chunk_delay: Duration::from_millis(SWEEP_CHUNK_DELAY_MS),
            mint_time_timeout: Duration::from_secs(MINT_TIME_LOOKUP_TIMEOUT_SECS),
            mint_cache_ttl_seconds: MINT_TIME_CACHE_TTL_SECS,
        }
    }
}
