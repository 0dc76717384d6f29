use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, SettlementError};
use crate::ledger::{BoxInstruction, Ledger};
use crate::oracle::{decode_randomness, DecodedRandomness, RandomnessOracle, RandomnessValue};
use crate::store::{BoxRecordStore, MintTimeSource};
use crate::tiers::{distribution_for_luck, resolve_outcome, reward_amount, OutcomeTier};

use super::SettlementEngine;

/// Outcome of a reveal request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RevealOutcome {
    pub box_id: String,
    pub tier: OutcomeTier,
    pub reward_amount: u64,
    pub is_jackpot: bool,
    pub random_percentage: f64,
    /// True when the box was already revealed and the recorded outcome
    /// was returned instead of drawing again.
    pub already_revealed: bool,
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    /// Resolves a committed box against its randomness round.
    ///
    /// Ensures:
    /// 1. Only a committed, not yet revealed box is drawn.
    /// 2. A reveal past the project's window is rejected; the watchdog
    ///    converts such boxes to the refund path.
    /// 3. The outcome is a pure function of the frozen luck and the
    ///    oracle value, and lands on the ledger before it is reported.
    /// 4. Drawing an already revealed box returns the recorded outcome.
    pub async fn reveal_box(&self, box_id: &Pubkey) -> Result<RevealOutcome> {
        let record = self.load_box_record(box_id).await?;
        let project = self.load_project(&record.project_id).await?;

        let account = self
            .read_box_account(box_id)
            .await?
            .ok_or(SettlementError::NotCommitted(*box_id))?;
        if account.committed_at == 0 {
            return Err(SettlementError::NotCommitted(*box_id));
        }
        if account.revealed {
            let tier = OutcomeTier::from_u8(account.reward_tier).ok_or_else(|| {
                SettlementError::Ledger(format!(
                    "box {box_id} carries unknown reward tier {}",
                    account.reward_tier
                ))
            })?;
            info!(box_id = %box_id, tier = %tier, "reveal requested for already revealed box");
            return Ok(RevealOutcome {
                box_id: box_id.to_string(),
                tier,
                reward_amount: account.reward_amount,
                is_jackpot: account.is_jackpot,
                random_percentage: account.random_percentage,
                already_revealed: true,
            });
        }

        let now = Self::unix_now();
        let elapsed = now.saturating_sub(account.committed_at);
        let window = project.settings.reveal_window_seconds;
        if elapsed > window {
            return Err(SettlementError::RevealWindowExpired {
                box_id: *box_id,
                elapsed,
                window,
            });
        }

        let value = self
            .fetch_randomness(box_id, &account.randomness_account, now)
            .await?;

        let distribution = distribution_for_luck(account.luck, &project.settings.tier_brackets);
        let tier = resolve_outcome(&distribution, value.percentage);
        let amount = reward_amount(project.box_price, tier, &project.settings.payout_multipliers)?;
        let is_jackpot = tier == OutcomeTier::Jackpot;

        let receipt = self
            .inner
            .ledger
            .submit(BoxInstruction::RevealAndRecord {
                box_mint: *box_id,
                box_account: self.box_account_address(box_id),
                project: record.project_id,
                owner: record.owner,
                round: account.randomness_account,
                random_percentage: value.percentage,
                reward_tier: tier.as_u8(),
                reward_amount: amount,
                is_jackpot,
            })
            .await?;

        info!(
            box_id = %box_id,
            project = %record.project_id,
            luck = account.luck,
            tier = %tier,
            reward_amount = amount,
            is_jackpot,
            random_percentage = value.percentage,
            signature = %receipt.signature,
            "box_revealed"
        );

        Ok(RevealOutcome {
            box_id: box_id.to_string(),
            tier,
            reward_amount: amount,
            is_jackpot,
            random_percentage: value.percentage,
            already_revealed: false,
        })
    }

    /// Fetches the revealed oracle value for a round, retrying exactly
    /// once after a short delay when the value is not yet published.
    /// Terminal oracle failures are recorded on the box row before they
    /// surface; a still-pending round is left unmarked since the caller
    /// is expected to retry.
    async fn fetch_randomness(
        &self,
        box_id: &Pubkey,
        round: &Pubkey,
        now: i64,
    ) -> Result<RandomnessValue> {
        let mut attempts = 0u32;
        loop {
            attempts += 1;
            let data = match self.inner.oracle.reveal(round).await {
                Ok(data) => data,
                Err(err) => {
                    self.record_reveal_failure(box_id, now, &err).await;
                    return Err(err);
                }
            };
            match decode_randomness(&data) {
                Ok(DecodedRandomness::Revealed(value)) => return Ok(value),
                Ok(DecodedRandomness::Pending) if attempts == 1 => {
                    tokio::time::sleep(self.inner.options.reveal_retry_delay).await;
                }
                Ok(DecodedRandomness::Pending) => {
                    return Err(SettlementError::RandomnessNotReady(*round));
                }
                Err(err) => {
                    self.record_reveal_failure(box_id, now, &err).await;
                    return Err(err);
                }
            }
        }
    }

    async fn record_reveal_failure(&self, box_id: &Pubkey, failed_at: i64, err: &SettlementError) {
        let reason = err.to_string();
        if let Err(store_err) = self
            .inner
            .store
            .record_reveal_failure(box_id, failed_at, &reason)
            .await
        {
            warn!(box_id = %box_id, error = %store_err, "failed to record reveal failure");
        }
    }
}
