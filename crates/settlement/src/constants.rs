//! Calibration defaults and wire offsets shared across the engine.

// Luck accrual.
pub const DEFAULT_BASE_LUCK: u8 = 5;
pub const DEFAULT_MAX_LUCK: u8 = 60;
pub const DEFAULT_LUCK_INTERVAL_SECONDS: i64 = 10_800;

/// Default tier calibration as (luck threshold, dud, rebate, breakeven,
/// profit) percentages. Jackpot takes whatever remains below 100.
pub const DEFAULT_TIER_BRACKETS: [(u8, f64, f64, f64, f64); 3] = [
    (5, 0.0, 72.0, 17.0, 9.0),
    (13, 0.0, 57.0, 26.0, 15.0),
    (60, 0.0, 44.0, 34.0, 20.0),
];

// Payout multiples applied to the box price once a tier resolves.
pub const DEFAULT_DUD_MULTIPLIER: f64 = 0.0;
pub const DEFAULT_REBATE_MULTIPLIER: f64 = 0.5;
pub const DEFAULT_BREAKEVEN_MULTIPLIER: f64 = 1.0;
pub const DEFAULT_PROFIT_MULTIPLIER: f64 = 1.5;
pub const DEFAULT_JACKPOT_MULTIPLIER: f64 = 4.0;

/// Purchase commission taken by the platform, in basis points.
pub const DEFAULT_COMMISSION_BPS: u16 = 500;
/// Commission past half the purchase price is rejected as a config error.
pub const MAX_COMMISSION_BPS: u16 = 5_000;

/// A project vault must hold this many box prices before boxes go on sale.
pub const DEFAULT_FUNDING_MULTIPLE: u64 = 30;

/// Seconds a committed box may wait on its oracle before it turns refundable.
pub const DEFAULT_REVEAL_WINDOW_SECONDS: i64 = 3_600;
/// Delay before the single oracle re-poll during a reveal.
pub const DEFAULT_REVEAL_RETRY_DELAY_SECS: u64 = 5;

// Retry advice attached to recoverable reveal failures.
pub const RETRY_AFTER_NOT_READY_SECS: u64 = 15;
pub const RETRY_AFTER_ORACLE_ERROR_SECS: u64 = 30;

// Status sweep pacing.
pub const MAX_BOXES_PER_REQUEST: usize = 50;
pub const SWEEP_CHUNK_SIZE: usize = 5;
pub const SWEEP_CHUNK_DELAY_MS: u64 = 200;

// Mint-time lookups for boxes that have no settlement account yet.
pub const MINT_TIME_CACHE_TTL_SECS: i64 = 300;
pub const MINT_TIME_LOOKUP_TIMEOUT_SECS: u64 = 3;

// Raw layout of a Switchboard randomness account. The engine never parses
// the full struct, only the reveal slot and the 32 revealed bytes.
pub const RANDOMNESS_MIN_ACCOUNT_LEN: usize = 184;
pub const RANDOMNESS_REVEAL_SLOT_OFFSET: usize = 144;
pub const RANDOMNESS_VALUE_OFFSET: usize = 152;
pub const RANDOMNESS_VALUE_LEN: usize = 32;

/// Seed prefix of a box settlement account, paired with the box mint.
pub const BOX_STATE_SEED: &[u8] = b"box_state";
