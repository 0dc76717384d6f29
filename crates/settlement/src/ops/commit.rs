use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use tracing::info;

use crate::error::{Result, SettlementError};
use crate::ledger::{BoxInstruction, Ledger};
use crate::luck::{hold_seconds, luck_score};
use crate::oracle::RandomnessOracle;
use crate::state;
use crate::store::{BoxRecordStore, MintTimeSource};

use super::SettlementEngine;

/// Outcome of a commit request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommitOutcome {
    pub box_id: String,
    /// Luck score frozen into the box for the rest of its life.
    pub luck: u8,
    /// Randomness round the box is now bound to.
    pub round: String,
    /// Ledger clock timestamp the commitment landed at.
    pub committed_at: i64,
    /// True when the box was already committed and the existing
    /// commitment was returned instead of creating a second round.
    pub already_committed: bool,
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    /// Commits an unopened box to a fresh randomness round.
    ///
    /// Ensures:
    /// 1. The box and its project exist and the project is active.
    /// 2. The caller of record still holds the box token.
    /// 3. Luck is computed from verified hold time and frozen on the ledger.
    /// 4. A box already committed keeps its original round; no second
    ///    round is ever created for it.
    pub async fn commit_box(&self, box_id: &Pubkey) -> Result<CommitOutcome> {
        let record = self.load_box_record(box_id).await?;
        let project = self.load_project(&record.project_id).await?;

        if let Some(account) = self.read_box_account(box_id).await? {
            if account.committed_at > 0 {
                info!(
                    box_id = %box_id,
                    round = %account.randomness_account,
                    "commit requested for already committed box"
                );
                return Ok(CommitOutcome {
                    box_id: box_id.to_string(),
                    luck: account.luck,
                    round: account.randomness_account.to_string(),
                    committed_at: account.committed_at,
                    already_committed: true,
                });
            }
        }

        if !project.active {
            return Err(SettlementError::ProjectInactive(record.project_id));
        }
        self.verify_box_holding(&record.owner, box_id).await?;

        let settings = &project.settings;
        let hold = hold_seconds(record.created_at, Self::unix_now());
        let luck = luck_score(
            hold,
            settings.base_luck,
            settings.max_luck,
            settings.luck_interval_seconds,
        );

        let round = self.inner.oracle.create_round(&self.inner.options.queue).await?;
        let receipt = self
            .inner
            .ledger
            .submit(BoxInstruction::CommitRandomness {
                box_mint: *box_id,
                box_account: self.box_account_address(box_id),
                project: record.project_id,
                owner: record.owner,
                round,
                luck,
            })
            .await?;

        // The ledger clock stamps the commitment, not our wall clock.
        let committed_at = match &receipt.emitted_state {
            Some(data) => state::parse_box_account(data)?.committed_at,
            None => self
                .read_box_account(box_id)
                .await?
                .map(|account| account.committed_at)
                .ok_or_else(|| {
                    SettlementError::Ledger(format!(
                        "box account for {box_id} unreadable after confirmed commit"
                    ))
                })?,
        };

        info!(
            box_id = %box_id,
            project = %record.project_id,
            luck,
            hold_seconds = hold,
            round = %round,
            signature = %receipt.signature,
            "box_committed"
        );

        Ok(CommitOutcome {
            box_id: box_id.to_string(),
            luck,
            round: round.to_string(),
            committed_at,
            already_committed: false,
        })
    }
}
