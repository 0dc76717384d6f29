use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use tracing::info;

use crate::economics::{minimum_vault_funding, withdrawal_reserve};
use crate::error::Result;
use crate::ledger::Ledger;
use crate::oracle::RandomnessOracle;
use crate::store::{BoxRecordStore, MintTimeSource};

use super::SettlementEngine;

/// Verdict on a requested vault withdrawal.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawalEvaluation {
    pub project_id: String,
    pub approved: bool,
    pub requested: u64,
    pub vault_balance: u64,
    /// Tokens withheld to cover every unopened, unsettled box at the
    /// most player-favourable bracket.
    pub reserve: u64,
    pub unopened_boxes: u64,
    /// Largest amount that would be approved right now.
    pub withdrawable: u64,
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    /// Decides whether a project authority may withdraw `amount` from
    /// the vault.
    ///
    /// Ensures:
    /// 1. The balance, the outstanding box count and the reserve are
    ///    recomputed from fresh reads on every call.
    /// 2. Approval requires the post-withdrawal balance to still cover
    ///    the reserve; draining exactly to the reserve is allowed.
    pub async fn evaluate_withdrawal(
        &self,
        project_id: &Pubkey,
        amount: u64,
    ) -> Result<WithdrawalEvaluation> {
        let project = self.load_project(project_id).await?;
        let vault_balance = self.vault_balance(&project.vault).await?;
        let unopened_boxes = self.inner.store.unopened_unsettled_count(project_id).await?;
        let settings = &project.settings;
        let reserve = withdrawal_reserve(
            project.box_price,
            unopened_boxes,
            &settings.tier_brackets,
            &settings.payout_multipliers,
        )?;
        let withdrawable = vault_balance.saturating_sub(reserve);
        let approved = amount <= withdrawable;

        info!(
            project = %project_id,
            requested = amount,
            vault_balance,
            reserve,
            unopened_boxes,
            approved,
            "withdrawal_evaluated"
        );

        Ok(WithdrawalEvaluation {
            project_id: project_id.to_string(),
            approved,
            requested: amount,
            vault_balance,
            reserve,
            unopened_boxes,
            withdrawable,
        })
    }

    /// Vault funding floor a project must meet before selling boxes.
    pub async fn project_minimum_funding(&self, project_id: &Pubkey) -> Result<u64> {
        let project = self.load_project(project_id).await?;
        minimum_vault_funding(project.box_price, project.settings.funding_multiple)
    }
}
