//! Record-store and mint-time seams. Box and project rows live in the
//! platform's external database; the engine reads them and writes only
//! the refund and failure-audit marks. Everything else is mirrored from
//! ledger events by the persistence layer.

use anchor_lang::prelude::Pubkey;
use async_trait::async_trait;

use crate::config::ProjectSettings;
use crate::error::Result;

/// One box row, created by the purchase flow.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxRecord {
    pub box_id: Pubkey,
    pub project_id: Pubkey,
    pub owner: Pubkey,
    /// Purchase/mint timestamp. The authoritative basis for luck accrual;
    /// the sweep's estimated mint times never replace it.
    pub created_at: i64,
    /// Mirror of the ledger's commit stamp, zero until committed.
    pub committed_at: i64,
    pub revealed: bool,
    pub settled: bool,
    pub refund_eligible: bool,
    pub refunded_at: Option<i64>,
    pub reveal_failed_at: Option<i64>,
    pub reveal_failure_reason: Option<String>,
}

/// Project row carrying the per-project configuration surface.
#[derive(Debug, Clone)]
pub struct ProjectRecord {
    pub project_id: Pubkey,
    pub authority: Pubkey,
    pub payment_mint: Pubkey,
    pub vault: Pubkey,
    pub box_price: u64,
    pub settings: ProjectSettings,
    pub active: bool,
}

/// Offset/limit pagination for owner listings.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub offset: usize,
    pub limit: usize,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: 50,
        }
    }
}

#[async_trait]
pub trait BoxRecordStore: Send + Sync {
    async fn box_record(&self, box_id: &Pubkey) -> Result<Option<BoxRecord>>;

    async fn project_record(&self, project_id: &Pubkey) -> Result<Option<ProjectRecord>>;

    /// Rows one owner holds within a project, filtered before pagination
    /// so a page is never padded out by another project's boxes.
    async fn boxes_for_owner(
        &self,
        project: &Pubkey,
        owner: &Pubkey,
        page: Page,
    ) -> Result<Vec<BoxRecord>>;

    /// Boxes with `committed_at` in `(0, cutoff)`, unrevealed and not yet
    /// marked refund-eligible or refunded. The watchdog's work queue.
    async fn expired_commitments(
        &self,
        cutoff: i64,
        project: Option<&Pubkey>,
    ) -> Result<Vec<BoxRecord>>;

    /// Boxes neither settled nor refunded, the withdrawal reserve basis.
    async fn unopened_unsettled_count(&self, project: &Pubkey) -> Result<u64>;

    async fn mark_refund_eligible(&self, box_id: &Pubkey, failed_at: i64, reason: &str)
        -> Result<()>;

    async fn mark_refunded(&self, box_id: &Pubkey, refunded_at: i64) -> Result<()>;

    /// Audit trail for reveal failures; does not change eligibility.
    async fn record_reveal_failure(
        &self,
        box_id: &Pubkey,
        failed_at: i64,
        reason: &str,
    ) -> Result<()>;
}

/// First-activity lookup behind the sweep's luck estimates. Expensive for
/// implementations (transaction-history scans), so the engine time-boxes
/// and caches calls.
#[async_trait]
pub trait MintTimeSource: Send + Sync {
    /// UNIX timestamp of the first on-ledger activity for `box_id`,
    /// `None` when the identifier has no history yet.
    async fn first_activity(&self, box_id: &Pubkey) -> Result<Option<i64>>;
}
