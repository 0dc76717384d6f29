use std::collections::HashMap;

use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use tracing::{info, warn};

use crate::constants::DEFAULT_REVEAL_WINDOW_SECONDS;
use crate::error::{Result, SettlementError};
use crate::ledger::{BoxInstruction, Ledger};
use crate::oracle::RandomnessOracle;
use crate::store::{BoxRecord, BoxRecordStore, MintTimeSource, ProjectRecord};

use super::SettlementEngine;

pub const REVEAL_WINDOW_ELAPSED: &str = "reveal window elapsed";

/// Summary of one watchdog pass over expired commitments.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchdogReport {
    /// Rows the expiry query returned.
    pub scanned: usize,
    /// Boxes marked refund-eligible this pass.
    pub marked: Vec<String>,
    /// Boxes the ledger showed as revealed after all; left untouched.
    pub skipped_revealed: usize,
    /// Boxes that failed mid-check and were skipped.
    pub failed: usize,
    pub dry_run: bool,
}

/// Outcome of a refund request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundOutcome {
    pub box_id: String,
    pub refunded: bool,
    /// Tokens returned, always the full box price.
    pub amount: u64,
    pub already_refunded: bool,
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    /// Watchdog pass: marks boxes refund-eligible whose reveal window
    /// elapsed without an outcome landing on the ledger.
    ///
    /// Ensures:
    /// 1. Each candidate is re-read from the ledger first; a box that
    ///    turns out revealed is never marked.
    /// 2. The project's own window is re-checked per box, so projects
    ///    with a longer window than the default are not marked early.
    /// 3. One failing box never aborts the pass.
    pub async fn mark_expired_commitments(
        &self,
        project: Option<&Pubkey>,
        dry_run: bool,
    ) -> Result<WatchdogReport> {
        let now = Self::unix_now();
        let cutoff = now.saturating_sub(DEFAULT_REVEAL_WINDOW_SECONDS);
        let rows = self.inner.store.expired_commitments(cutoff, project).await?;

        let mut report = WatchdogReport {
            scanned: rows.len(),
            marked: Vec::new(),
            skipped_revealed: 0,
            failed: 0,
            dry_run,
        };
        let mut projects: HashMap<Pubkey, ProjectRecord> = HashMap::new();

        for row in rows {
            match self.check_expired_row(&row, now, dry_run, &mut projects).await {
                Ok(ExpiryCheck::Marked) => {
                    report.marked.push(row.box_id.to_string());
                    info!(
                        box_id = %row.box_id,
                        project = %row.project_id,
                        committed_at = row.committed_at,
                        dry_run,
                        "box_refund_marked"
                    );
                }
                Ok(ExpiryCheck::Revealed) => {
                    report.skipped_revealed += 1;
                    warn!(
                        box_id = %row.box_id,
                        "box revealed on ledger after expiry query, skipping refund mark"
                    );
                }
                Ok(ExpiryCheck::InsideWindow) => {}
                Err(err) => {
                    report.failed += 1;
                    warn!(box_id = %row.box_id, error = %err, "expiry check failed, skipping box");
                }
            }
        }

        Ok(report)
    }

    async fn check_expired_row(
        &self,
        row: &BoxRecord,
        now: i64,
        dry_run: bool,
        projects: &mut HashMap<Pubkey, ProjectRecord>,
    ) -> Result<ExpiryCheck> {
        let window = match projects.get(&row.project_id) {
            Some(project) => project.settings.reveal_window_seconds,
            None => {
                let loaded = self.load_project(&row.project_id).await?;
                let window = loaded.settings.reveal_window_seconds;
                projects.insert(row.project_id, loaded);
                window
            }
        };
        if now.saturating_sub(row.committed_at) <= window {
            return Ok(ExpiryCheck::InsideWindow);
        }

        // Expiry queries lag the ledger; only the fresh read decides.
        if let Some(account) = self.read_box_account(&row.box_id).await? {
            if account.revealed {
                return Ok(ExpiryCheck::Revealed);
            }
        }

        if !dry_run {
            self.inner
                .store
                .mark_refund_eligible(&row.box_id, now, REVEAL_WINDOW_ELAPSED)
                .await?;
        }
        Ok(ExpiryCheck::Marked)
    }

    /// Returns the full box price to the buyer of a refund-eligible box.
    ///
    /// Ensures:
    /// 1. Only a box the watchdog marked eligible is refunded.
    /// 2. A reveal that landed after the mark supersedes the refund.
    /// 3. The vault covers the box price before the transfer.
    /// 4. Refunding an already refunded box never moves tokens again.
    pub async fn refund_box(&self, box_id: &Pubkey) -> Result<RefundOutcome> {
        let record = self.load_box_record(box_id).await?;
        let project = self.load_project(&record.project_id).await?;

        if record.refunded_at.is_some() {
            info!(box_id = %box_id, "refund requested for already refunded box");
            return Ok(RefundOutcome {
                box_id: box_id.to_string(),
                refunded: true,
                amount: project.box_price,
                already_refunded: true,
            });
        }
        if !record.refund_eligible {
            return Err(SettlementError::NotRefundEligible(*box_id));
        }

        if let Some(account) = self.read_box_account(box_id).await? {
            if account.revealed {
                return Err(SettlementError::RefundSuperseded(*box_id));
            }
        }

        let amount = project.box_price;
        let available = self.vault_balance(&project.vault).await?;
        if available < amount {
            return Err(SettlementError::InsufficientVault {
                required: amount,
                available,
            });
        }

        let receipt = self
            .inner
            .ledger
            .submit(BoxInstruction::Refund {
                box_mint: *box_id,
                box_account: self.box_account_address(box_id),
                project: record.project_id,
                owner: record.owner,
                vault: project.vault,
                payout_account: self.associated_account(&record.owner, &project.payment_mint),
                amount,
            })
            .await?;
        self.inner.store.mark_refunded(box_id, Self::unix_now()).await?;

        info!(
            box_id = %box_id,
            project = %record.project_id,
            amount,
            signature = %receipt.signature,
            "box_refunded"
        );

        Ok(RefundOutcome {
            box_id: box_id.to_string(),
            refunded: true,
            amount,
            already_refunded: false,
        })
    }
}

enum ExpiryCheck {
    Marked,
    Revealed,
    InsideWindow,
}
