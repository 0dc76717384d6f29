//! Luck-weighted tier probabilities and outcome resolution.

use serde::Serialize;

use crate::config::{PayoutMultipliers, TierBracket};
use crate::error::{Result, SettlementError};

/// Outcome tiers in resolution order. `reward_tier` on the ledger account
/// stores the discriminant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutcomeTier {
    Dud,
    Rebate,
    Breakeven,
    Profit,
    Jackpot,
}

impl OutcomeTier {
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Dud => 0,
            Self::Rebate => 1,
            Self::Breakeven => 2,
            Self::Profit => 3,
            Self::Jackpot => 4,
        }
    }

    pub fn from_u8(raw: u8) -> Option<Self> {
        match raw {
            0 => Some(Self::Dud),
            1 => Some(Self::Rebate),
            2 => Some(Self::Breakeven),
            3 => Some(Self::Profit),
            4 => Some(Self::Jackpot),
            _ => None,
        }
    }

    pub fn multiplier(self, multipliers: &PayoutMultipliers) -> f64 {
        match self {
            Self::Dud => multipliers.dud,
            Self::Rebate => multipliers.rebate,
            Self::Breakeven => multipliers.breakeven,
            Self::Profit => multipliers.profit,
            Self::Jackpot => multipliers.jackpot,
        }
    }
}

impl std::fmt::Display for OutcomeTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Dud => "dud",
            Self::Rebate => "rebate",
            Self::Breakeven => "breakeven",
            Self::Profit => "profit",
            Self::Jackpot => "jackpot",
        };
        f.write_str(name)
    }
}

/// Interpolated odds for one luck score. Percentages, not fractions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TierDistribution {
    pub dud: f64,
    pub rebate: f64,
    pub breakeven: f64,
    pub profit: f64,
}

impl TierDistribution {
    /// Jackpot absorbs whatever the four named tiers leave below 100.
    pub fn jackpot(&self) -> f64 {
        (100.0 - (self.dud + self.rebate + self.breakeven + self.profit)).max(0.0)
    }
}

fn bracket_distribution(bracket: &TierBracket) -> TierDistribution {
    TierDistribution {
        dud: bracket.dud,
        rebate: bracket.rebate,
        breakeven: bracket.breakeven,
        profit: bracket.profit,
    }
}

fn lerp(start: f64, end: f64, ratio: f64) -> f64 {
    start + (end - start) * ratio
}

fn interpolate(lower: &TierBracket, upper: &TierBracket, luck: u8) -> TierDistribution {
    let span = f64::from(upper.luck_threshold) - f64::from(lower.luck_threshold);
    let ratio = if span <= 0.0 {
        1.0
    } else {
        ((f64::from(luck) - f64::from(lower.luck_threshold)) / span).clamp(0.0, 1.0)
    };
    TierDistribution {
        dud: lerp(lower.dud, upper.dud, ratio),
        rebate: lerp(lower.rebate, upper.rebate, ratio),
        breakeven: lerp(lower.breakeven, upper.breakeven, ratio),
        profit: lerp(lower.profit, upper.profit, ratio),
    }
}

/// Maps a luck score onto the calibration. At or below the first threshold
/// the first bracket applies unmodified; between thresholds each percentage
/// interpolates linearly; past the last threshold the last bracket holds
/// flat, since luck is capped at that threshold anyway.
pub fn distribution_for_luck(luck: u8, brackets: &[TierBracket; 3]) -> TierDistribution {
    if luck <= brackets[0].luck_threshold {
        bracket_distribution(&brackets[0])
    } else if luck <= brackets[1].luck_threshold {
        interpolate(&brackets[0], &brackets[1], luck)
    } else if luck <= brackets[2].luck_threshold {
        interpolate(&brackets[1], &brackets[2], luck)
    } else {
        bracket_distribution(&brackets[2])
    }
}

/// Walks the cumulative tier bounds in canonical order and picks the first
/// whose upper bound reaches the draw. A draw exactly on a boundary stays
/// in the lower tier.
pub fn resolve_outcome(distribution: &TierDistribution, random_percentage: f64) -> OutcomeTier {
    let mut cumulative = 0.0;

    cumulative += distribution.dud;
    if random_percentage <= cumulative {
        return OutcomeTier::Dud;
    }

    cumulative += distribution.rebate;
    if random_percentage <= cumulative {
        return OutcomeTier::Rebate;
    }

    cumulative += distribution.breakeven;
    if random_percentage <= cumulative {
        return OutcomeTier::Breakeven;
    }

    cumulative += distribution.profit;
    if random_percentage <= cumulative {
        return OutcomeTier::Profit;
    }

    OutcomeTier::Jackpot
}

/// Payout for a tier, truncated to the smallest token unit.
pub fn reward_amount(
    box_price: u64,
    tier: OutcomeTier,
    multipliers: &PayoutMultipliers,
) -> Result<u64> {
    let raw = box_price as f64 * tier.multiplier(multipliers);
    if !raw.is_finite() || raw < 0.0 || raw >= u64::MAX as f64 {
        return Err(SettlementError::MathOverflow);
    }
    Ok(raw as u64)
}
