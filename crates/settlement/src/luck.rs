//! Hold-time luck accrual.

/// Seconds a box has been held, from its first on-ledger activity.
pub fn hold_seconds(created_at: i64, now: i64) -> i64 {
    now.saturating_sub(created_at)
}

/// Luck grows one point per full `interval_seconds` of holding, starting
/// from `base_luck` and capped at `max_luck`. Negative hold times (clock
/// skew between the ledger and this host) count as zero.
pub fn luck_score(hold_seconds: i64, base_luck: u8, max_luck: u8, interval_seconds: i64) -> u8 {
    if interval_seconds <= 0 {
        return max_luck;
    }
    let bonus = hold_seconds.max(0) / interval_seconds;
    u64::from(base_luck)
        .saturating_add(bonus as u64)
        .min(u64::from(max_luck)) as u8
}
