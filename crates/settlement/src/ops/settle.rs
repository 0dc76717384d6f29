use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, SettlementError};
use crate::ledger::{BoxInstruction, Ledger};
use crate::oracle::RandomnessOracle;
use crate::store::{BoxRecordStore, MintTimeSource, ProjectRecord};

use super::SettlementEngine;

/// Outcome of a settle request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettleOutcome {
    pub box_id: String,
    /// Tokens actually moved from the vault. Zero for duds and for
    /// jackpots taken as the honorary prize.
    pub transferred: u64,
    pub reward_amount: u64,
    pub is_jackpot: bool,
    /// True when a jackpot was taken as the honorary prize instead of
    /// the token payout.
    pub honorary: bool,
    pub new_vault_balance: u64,
    pub total_boxes_settled: u64,
    pub total_paid_out: u64,
    /// True when the box was already settled and the recorded outcome
    /// was returned instead of paying twice.
    pub already_settled: bool,
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    /// Pays out a revealed box and closes it.
    ///
    /// Ensures:
    /// 1. Only a revealed, not yet settled box is paid.
    /// 2. The payout goes to whoever holds the box token now, not to a
    ///    previous holder.
    /// 3. The vault covers the transfer before it is attempted.
    /// 4. A jackpot holder who elects the honorary prize gets the
    ///    election recorded with no token transfer; the election is
    ///    ignored for every other tier.
    /// 5. Settling an already settled box never moves tokens again.
    pub async fn settle_box(&self, box_id: &Pubkey, honorary: bool) -> Result<SettleOutcome> {
        let record = self.load_box_record(box_id).await?;
        let project = self.load_project(&record.project_id).await?;

        let account = self
            .read_box_account(box_id)
            .await?
            .ok_or(SettlementError::NotCommitted(*box_id))?;
        if !account.revealed {
            return Err(SettlementError::NotRevealed(*box_id));
        }
        if account.settled {
            info!(box_id = %box_id, "settle requested for already settled box");
            let (new_vault_balance, total_boxes_settled, total_paid_out) =
                self.vault_and_counters(&record.project_id, &project).await?;
            let transferred = if account.honorary_choice {
                0
            } else {
                account.reward_amount
            };
            return Ok(SettleOutcome {
                box_id: box_id.to_string(),
                transferred,
                reward_amount: account.reward_amount,
                is_jackpot: account.is_jackpot,
                honorary: account.honorary_choice,
                new_vault_balance,
                total_boxes_settled,
                total_paid_out,
                already_settled: true,
            });
        }

        self.verify_box_holding(&record.owner, box_id).await?;

        // The honorary election only exists for jackpots.
        let honorary_payout = honorary && account.is_jackpot;
        let transfer_amount = if honorary_payout {
            0
        } else {
            account.reward_amount
        };

        if transfer_amount > 0 {
            let available = self.vault_balance(&project.vault).await?;
            if available < transfer_amount {
                return Err(SettlementError::InsufficientVault {
                    required: transfer_amount,
                    available,
                });
            }
        }

        let payout_account = self.associated_account(&record.owner, &project.payment_mint);
        let create_payout_account =
            transfer_amount > 0 && self.read_token_account(&payout_account).await?.is_none();

        let receipt = self
            .inner
            .ledger
            .submit(BoxInstruction::SettleAndTransfer {
                box_mint: *box_id,
                box_account: self.box_account_address(box_id),
                project: record.project_id,
                owner: record.owner,
                holder_token_account: self.associated_account(&record.owner, box_id),
                vault: project.vault,
                payout_account,
                create_payout_account,
                honorary: honorary_payout,
            })
            .await?;

        let (new_vault_balance, total_boxes_settled, total_paid_out) =
            self.vault_and_counters(&record.project_id, &project).await?;

        info!(
            box_id = %box_id,
            project = %record.project_id,
            transferred = transfer_amount,
            reward_amount = account.reward_amount,
            is_jackpot = account.is_jackpot,
            honorary = honorary_payout,
            new_vault_balance,
            signature = %receipt.signature,
            "box_settled"
        );

        Ok(SettleOutcome {
            box_id: box_id.to_string(),
            transferred: transfer_amount,
            reward_amount: account.reward_amount,
            is_jackpot: account.is_jackpot,
            honorary: honorary_payout,
            new_vault_balance,
            total_boxes_settled,
            total_paid_out,
            already_settled: false,
        })
    }

    /// Fresh vault balance and lifetime counters after a settle. A
    /// project account that vanished mid-flight is reported as zeros
    /// rather than failing a settle that already landed.
    async fn vault_and_counters(
        &self,
        project_id: &Pubkey,
        project: &ProjectRecord,
    ) -> Result<(u64, u64, u64)> {
        let balance = self.vault_balance(&project.vault).await?;
        match self.read_project_account(project_id).await? {
            Some(account) => Ok((balance, account.total_boxes_settled, account.total_paid_out)),
            None => {
                warn!(project = %project_id, "project account missing while reading counters");
                Ok((balance, 0, 0))
            }
        }
    }
}
