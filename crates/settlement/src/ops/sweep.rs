use std::collections::BTreeMap;
use std::sync::Arc;

use anchor_lang::prelude::Pubkey;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Result, SettlementError};
use crate::ledger::Ledger;
use crate::luck::{hold_seconds, luck_score};
use crate::oracle::RandomnessOracle;
use crate::state::{BoxAccount, BoxPhase};
use crate::store::{BoxRecordStore, MintTimeSource, Page, ProjectRecord};
use crate::tiers::OutcomeTier;

use super::{CachedMintTime, SettlementEngine};

/// Ledger-backed fields of a committed box, shaped for display.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxStateView {
    pub committed_at: i64,
    pub luck: u8,
    pub randomness_account: String,
    pub revealed: bool,
    pub settled: bool,
    pub random_percentage: Option<f64>,
    pub reward_tier: Option<OutcomeTier>,
    pub reward_amount: u64,
    pub is_jackpot: bool,
    pub honorary_choice: bool,
    pub honorary_transformed: bool,
}

impl BoxStateView {
    fn from_account(account: &BoxAccount) -> Self {
        Self {
            committed_at: account.committed_at,
            luck: account.luck,
            randomness_account: account.randomness_account.to_string(),
            revealed: account.revealed,
            settled: account.settled,
            random_percentage: account.revealed.then_some(account.random_percentage),
            reward_tier: OutcomeTier::from_u8(account.reward_tier).filter(|_| account.revealed),
            reward_amount: account.reward_amount,
            is_jackpot: account.is_jackpot,
            honorary_choice: account.honorary_choice,
            honorary_transformed: account.honorary_transformed,
        }
    }
}

/// One box's row in a batch status report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxStatusEntry {
    pub box_id: String,
    pub exists: bool,
    pub phase: BoxPhase,
    pub current_luck_score: u8,
    pub hold_time_seconds: i64,
    /// True when the luck shown was derived from an estimated mint
    /// time rather than a real first-activity timestamp. Display only;
    /// commits always recompute from the verified purchase record.
    pub luck_estimated: bool,
    pub box_state: Option<BoxStateView>,
    pub error: Option<String>,
}

impl BoxStatusEntry {
    fn failed(box_id: &Pubkey, base_luck: u8, message: String) -> Self {
        Self {
            box_id: box_id.to_string(),
            exists: false,
            phase: BoxPhase::Unopened,
            current_luck_score: base_luck,
            hold_time_seconds: 0,
            luck_estimated: false,
            box_state: None,
            error: Some(message),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchStatusReport {
    /// One entry per requested box, failures included.
    pub results: BTreeMap<String, BoxStatusEntry>,
    /// Failure messages keyed by box, mirroring the `error` field of
    /// the matching result entry.
    pub errors: BTreeMap<String, String>,
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger + 'static,
    O: RandomnessOracle + 'static,
    S: BoxRecordStore + 'static,
    M: MintTimeSource + 'static,
{
    /// Reads the current phase of up to the configured maximum of boxes
    /// in one call.
    ///
    /// Ensures:
    /// 1. An oversized request is rejected before any ledger read.
    /// 2. Reads run chunked with a bounded number outstanding, with a
    ///    short pause between chunks.
    /// 3. One failing box never poisons the batch; it gets an error
    ///    entry and the rest complete.
    pub async fn batch_status(
        &self,
        project_id: &Pubkey,
        box_ids: &[Pubkey],
    ) -> Result<BatchStatusReport> {
        if box_ids.len() > self.inner.options.max_batch_boxes {
            return Err(SettlementError::BatchTooLarge {
                requested: box_ids.len(),
                max: self.inner.options.max_batch_boxes,
            });
        }
        let project = Arc::new(self.load_project(project_id).await?);

        let mut results = BTreeMap::new();
        let mut errors = BTreeMap::new();
        let chunk_size = self.inner.options.sweep_chunk_size.max(1);
        for (index, chunk) in box_ids.chunks(chunk_size).enumerate() {
            if index > 0 {
                tokio::time::sleep(self.inner.options.sweep_chunk_delay).await;
            }
            let mut handles = Vec::with_capacity(chunk.len());
            for box_id in chunk {
                let this = self.clone();
                let project = Arc::clone(&project);
                let box_id = *box_id;
                handles.push((
                    box_id,
                    tokio::spawn(async move {
                        let _permit =
                            this.inner.sweep_gate.acquire().await.map_err(|_| {
                                SettlementError::Ledger("status sweep gate closed".into())
                            })?;
                        this.box_status(&box_id, &project).await
                    }),
                ));
            }
            for (box_id, handle) in handles {
                let key = box_id.to_string();
                match handle.await {
                    Ok(Ok(entry)) => {
                        results.insert(key, entry);
                    }
                    Ok(Err(err)) => {
                        let message = err.to_string();
                        warn!(box_id = %box_id, error = %message, "box status lookup failed");
                        results.insert(
                            key.clone(),
                            BoxStatusEntry::failed(&box_id, project.settings.base_luck, message.clone()),
                        );
                        errors.insert(key, message);
                    }
                    Err(join_err) => {
                        let message = format!("status task failed: {join_err}");
                        warn!(box_id = %box_id, error = %message, "box status task aborted");
                        results.insert(
                            key.clone(),
                            BoxStatusEntry::failed(&box_id, project.settings.base_luck, message.clone()),
                        );
                        errors.insert(key, message);
                    }
                }
            }
        }

        info!(
            project = %project_id,
            requested = box_ids.len(),
            failed = errors.len(),
            "batch_status_complete"
        );
        Ok(BatchStatusReport { results, errors })
    }

    /// Batch status over every box an owner holds in a project, paged.
    pub async fn batch_status_for_owner(
        &self,
        project_id: &Pubkey,
        owner: &Pubkey,
        page: Page,
    ) -> Result<BatchStatusReport> {
        let rows = self
            .inner
            .store
            .boxes_for_owner(project_id, owner, page)
            .await?;
        let box_ids: Vec<Pubkey> = rows.into_iter().map(|row| row.box_id).collect();
        self.batch_status(project_id, &box_ids).await
    }
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    async fn box_status(&self, box_id: &Pubkey, project: &ProjectRecord) -> Result<BoxStatusEntry> {
        let account = self.read_box_account(box_id).await?;
        let phase = BoxPhase::from_account(account.as_ref());

        // A committed box reports the luck frozen on the ledger. Only
        // an unopened box gets the estimated accrual view.
        if let Some(state) = account.as_ref().filter(|state| state.committed_at > 0) {
            return Ok(BoxStatusEntry {
                box_id: box_id.to_string(),
                exists: true,
                phase,
                current_luck_score: state.luck,
                hold_time_seconds: 0,
                luck_estimated: false,
                box_state: Some(BoxStateView::from_account(state)),
                error: None,
            });
        }

        let settings = &project.settings;
        let (mint_time, estimated) = self.estimated_mint_time(box_id).await;
        let hold = hold_seconds(mint_time, Self::unix_now());
        let luck = luck_score(
            hold,
            settings.base_luck,
            settings.max_luck,
            settings.luck_interval_seconds,
        );
        Ok(BoxStatusEntry {
            box_id: box_id.to_string(),
            exists: account.is_some(),
            phase,
            current_luck_score: luck,
            hold_time_seconds: hold,
            luck_estimated: estimated,
            box_state: None,
            error: None,
        })
    }

    /// Best-effort mint time for an unopened box, answering from the
    /// cache when fresh. A lookup that fails or times out falls back to
    /// a value jittered within one cache window of now, flagged as
    /// estimated so callers never treat it as authoritative.
    async fn estimated_mint_time(&self, box_id: &Pubkey) -> (i64, bool) {
        let now = Self::unix_now();
        let ttl = self.inner.options.mint_cache_ttl_seconds;
        {
            let mut cache = self.cache_lock();
            if let Some(entry) = cache.get(box_id) {
                if ttl > 0 && now.saturating_sub(entry.cached_at) < ttl {
                    return (entry.mint_time, entry.estimated);
                }
                cache.remove(box_id);
            }
        }

        let lookup = tokio::time::timeout(
            self.inner.options.mint_time_timeout,
            self.inner.mint_time.first_activity(box_id),
        )
        .await;
        let (mint_time, estimated) = match lookup {
            Ok(Ok(Some(first_activity))) => (first_activity, false),
            Ok(Ok(None)) => (now, true),
            Ok(Err(err)) => {
                warn!(box_id = %box_id, error = %err, "mint time lookup failed, using fallback");
                (now.saturating_sub(fallback_jitter(box_id, now, ttl)), true)
            }
            Err(_) => {
                warn!(box_id = %box_id, "mint time lookup timed out, using fallback");
                (now.saturating_sub(fallback_jitter(box_id, now, ttl)), true)
            }
        };

        let mut cache = self.cache_lock();
        if ttl > 0 {
            cache.retain(|_, entry| now.saturating_sub(entry.cached_at) < ttl);
        }
        cache.insert(
            *box_id,
            CachedMintTime {
                mint_time,
                cached_at: now,
                estimated,
            },
        );
        (mint_time, estimated)
    }
}

/// Deterministic per-box offset within one cache window, so fallback
/// holds neither collapse to zero nor agree across boxes.
fn fallback_jitter(box_id: &Pubkey, now: i64, ttl: i64) -> i64 {
    if ttl <= 0 {
        return 0;
    }
    let digest = solana_program::hash::hashv(&[box_id.as_ref(), &now.to_le_bytes()]);
    let mut seed = [0u8; 8];
    seed.copy_from_slice(&digest.to_bytes()[..8]);
    (u64::from_le_bytes(seed) % ttl as u64) as i64
}
