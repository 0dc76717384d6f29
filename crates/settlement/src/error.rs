use anchor_lang::prelude::Pubkey;

use crate::constants::{RETRY_AFTER_NOT_READY_SECS, RETRY_AFTER_ORACLE_ERROR_SECS};

#[derive(Debug, thiserror::Error)]
pub enum SettlementError {
    #[error("no settlement record for box {0}")]
    BoxNotFound(Pubkey),

    #[error("unknown project {0}")]
    ProjectNotFound(Pubkey),

    #[error("project {0} is not active")]
    ProjectInactive(Pubkey),

    #[error("wallet {owner} does not hold box {box_id}")]
    BoxNotHeld { box_id: Pubkey, owner: Pubkey },

    #[error("box {0} has no committed randomness")]
    NotCommitted(Pubkey),

    #[error("box {0} has not been revealed")]
    NotRevealed(Pubkey),

    #[error("reveal window for box {box_id} lapsed {elapsed}s after commit, window is {window}s")]
    RevealWindowExpired {
        box_id: Pubkey,
        elapsed: i64,
        window: i64,
    },

    #[error("box {0} is not marked refund eligible")]
    NotRefundEligible(Pubkey),

    #[error("box {0} was revealed on ledger after being marked refundable")]
    RefundSuperseded(Pubkey),

    #[error("vault holds {available} but {required} is required")]
    InsufficientVault { required: u64, available: u64 },

    #[error("{requested} boxes requested, per-request limit is {max}")]
    BatchTooLarge { requested: usize, max: usize },

    #[error("randomness account is {len} bytes, shorter than the reveal layout")]
    MalformedRandomness { len: usize },

    #[error("randomness round {0} has not revealed yet")]
    RandomnessNotReady(Pubkey),

    #[error("arithmetic overflow")]
    MathOverflow,

    #[error("invalid project settings: {0}")]
    InvalidConfig(String),

    #[error("oracle: {0}")]
    Oracle(String),

    #[error("ledger: {0}")]
    Ledger(String),

    #[error("store: {0}")]
    Store(String),

    #[error("mint time lookup: {0}")]
    MintTimeUnavailable(String),
}

pub type Result<T> = std::result::Result<T, SettlementError>;

impl SettlementError {
    /// Whether the same request can simply be retried later.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RandomnessNotReady(_)
                | Self::Oracle(_)
                | Self::Ledger(_)
                | Self::Store(_)
                | Self::MintTimeUnavailable(_)
        )
    }

    /// Suggested wait before retrying, for failures that carry one.
    pub fn retry_after_seconds(&self) -> Option<u64> {
        match self {
            Self::RandomnessNotReady(_) => Some(RETRY_AFTER_NOT_READY_SECS),
            Self::Oracle(_) => Some(RETRY_AFTER_ORACLE_ERROR_SECS),
            _ => None,
        }
    }
}
