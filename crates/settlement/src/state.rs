use anchor_lang::prelude::*;
use serde::Serialize;

use crate::constants::BOX_STATE_SEED;
use crate::error::{Result, SettlementError};
use crate::store::BoxRecord;

/// Settlement account address for a box mint.
pub fn box_state_address(box_mint: &Pubkey, program_id: &Pubkey) -> Pubkey {
    Pubkey::find_program_address(&[BOX_STATE_SEED, box_mint.as_ref()], program_id).0
}

/// Per-box settlement account owned by the on-ledger program, derived from
/// `[b"box_state", box_mint]`. The engine only ever deserializes it; every
/// mutation goes through a submitted instruction.
#[account]
pub struct BoxAccount {
    /// Wallet that opened the box. Settlement re-verifies the current
    /// holder, which may differ if the box token changed hands.
    pub owner: Pubkey,

    /// Mint of the box token itself.
    pub box_mint: Pubkey,

    /// Project this box was purchased under.
    pub project: Pubkey,

    /// UNIX timestamp of the randomness commit. Zero until the box is
    /// opened, which is how an allocated-but-unopened account reads.
    pub committed_at: i64,

    /// Luck score frozen at commit time.
    pub luck: u8,

    /// Switchboard randomness account committed for this box.
    pub randomness_account: Pubkey,

    /// Random percentage in [0,100] used at reveal.
    pub random_percentage: f64,

    /// Resolved outcome tier, see [`crate::tiers::OutcomeTier`].
    pub reward_tier: u8,

    /// Payout in the project's smallest token unit. Set at reveal.
    pub reward_amount: u64,

    pub is_jackpot: bool,

    /// Jackpot winners may forgo the token payout for the honorary path.
    pub honorary_choice: bool,

    /// Whether the honorary transformation has been fulfilled externally.
    pub honorary_transformed: bool,

    pub revealed: bool,
    pub settled: bool,
    pub bump: u8,
}

impl BoxAccount {
    pub const LEN: usize = 32 + 32 + 32 + 8 + 1 + 32 + 8 + 1 + 8 + 1 + 1 + 1 + 1 + 1 + 1; // 160 bytes
}

/// Per-project configuration and vault bookkeeping account.
#[account]
pub struct ProjectAccount {
    /// Authority allowed to change project settings and withdraw.
    pub authority: Pubkey,
    /// Mint boxes are priced and paid out in.
    pub payment_mint: Pubkey,
    pub payment_decimals: u8,
    /// Token account holding the project's payout funds.
    pub vault: Pubkey,
    /// Box price in the smallest payment-token unit.
    pub box_price: u64,
    /// Platform commission on purchases, basis points.
    pub commission_bps: u16,
    pub total_boxes_created: u64,
    pub total_boxes_settled: u64,
    pub total_paid_out: u64,
    pub active: bool,
    pub bump: u8,
}

impl ProjectAccount {
    pub const LEN: usize = 32 + 32 + 1 + 32 + 8 + 2 + 8 + 8 + 8 + 1 + 1; // 133 bytes
}

pub fn parse_box_account(data: &[u8]) -> Result<BoxAccount> {
    let mut slice = data;
    BoxAccount::try_deserialize(&mut slice)
        .map_err(|e| SettlementError::Ledger(format!("box account: {e}")))
}

pub fn parse_project_account(data: &[u8]) -> Result<ProjectAccount> {
    let mut slice = data;
    ProjectAccount::try_deserialize(&mut slice)
        .map_err(|e| SettlementError::Ledger(format!("project account: {e}")))
}

/// Parses a raw SPL token account, used for holder and vault balance checks.
pub fn parse_token_account(data: &[u8]) -> Result<anchor_spl::token::TokenAccount> {
    let mut slice = data;
    anchor_spl::token::TokenAccount::try_deserialize(&mut slice)
        .map_err(|e| SettlementError::Ledger(format!("token account: {e}")))
}

/// Where a box sits in its lifecycle. The first four phases are read off
/// the ledger alone; the refund phases additionally need the record store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BoxPhase {
    Unopened,
    Committed,
    Revealed,
    Settled,
    RefundEligible,
    Refunded,
}

impl BoxPhase {
    /// Ledger-only view. An allocated account with `committed_at == 0`
    /// still counts as unopened.
    pub fn from_account(account: Option<&BoxAccount>) -> Self {
        match account {
            None => Self::Unopened,
            Some(state) if state.committed_at == 0 => Self::Unopened,
            Some(state) if !state.revealed => Self::Committed,
            Some(state) if !state.settled => Self::Revealed,
            Some(_) => Self::Settled,
        }
    }

    /// Full view including the record store's refund flags. A reveal that
    /// landed on the ledger always wins over a stale eligibility mark.
    pub fn from_parts(account: Option<&BoxAccount>, record: &BoxRecord) -> Self {
        if record.refunded_at.is_some() {
            return Self::Refunded;
        }
        let ledger = Self::from_account(account);
        if record.refund_eligible && matches!(ledger, Self::Unopened | Self::Committed) {
            return Self::RefundEligible;
        }
        ledger
    }
}

impl std::fmt::Display for BoxPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Unopened => "unopened",
            Self::Committed => "committed",
            Self::Revealed => "revealed",
            Self::Settled => "settled",
            Self::RefundEligible => "refund_eligible",
            Self::Refunded => "refunded",
        };
        f.write_str(name)
    }
}
