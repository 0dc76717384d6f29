//! Engine operations, one module per lifecycle transition.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{SystemTime, UNIX_EPOCH};

use anchor_lang::prelude::Pubkey;
use anchor_spl::associated_token::get_associated_token_address;
use tokio::sync::Semaphore;

use crate::config::EngineOptions;
use crate::error::{Result, SettlementError};
use crate::ledger::Ledger;
use crate::oracle::RandomnessOracle;
use crate::state::{self, BoxAccount, ProjectAccount};
use crate::store::{BoxRecord, BoxRecordStore, MintTimeSource, ProjectRecord};

pub mod commit;
pub mod refund;
pub mod reveal;
pub mod settle;
pub mod sweep;
pub mod withdraw;

pub use commit::CommitOutcome;
pub use refund::{RefundOutcome, WatchdogReport};
pub use reveal::RevealOutcome;
pub use settle::SettleOutcome;
pub use sweep::{BatchStatusReport, BoxStateView, BoxStatusEntry};
pub use withdraw::WithdrawalEvaluation;

pub(crate) struct CachedMintTime {
    pub mint_time: i64,
    pub cached_at: i64,
    pub estimated: bool,
}

pub(crate) struct EngineInner<L, O, S, M> {
    pub(crate) ledger: L,
    pub(crate) oracle: O,
    pub(crate) store: S,
    pub(crate) mint_time: M,
    pub(crate) options: EngineOptions,
    pub(crate) mint_cache: Mutex<HashMap<Pubkey, CachedMintTime>>,
    pub(crate) sweep_gate: Semaphore,
}

/// Drives boxes from purchase to payout against four external seams: the
/// ledger that holds authoritative state, the randomness oracle, the
/// record store and the mint-time source. The engine itself keeps no
/// correctness-critical state; everything is re-read before each
/// transition. Cloning is cheap and clones share the mint-time cache and
/// the sweep gate.
pub struct SettlementEngine<L, O, S, M> {
    pub(crate) inner: Arc<EngineInner<L, O, S, M>>,
}

impl<L, O, S, M> Clone for SettlementEngine<L, O, S, M> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<L, O, S, M> SettlementEngine<L, O, S, M>
where
    L: Ledger,
    O: RandomnessOracle,
    S: BoxRecordStore,
    M: MintTimeSource,
{
    pub fn new(ledger: L, oracle: O, store: S, mint_time: M) -> Self {
        Self::with_options(ledger, oracle, store, mint_time, EngineOptions::default())
    }

    pub fn with_options(
        ledger: L,
        oracle: O,
        store: S,
        mint_time: M,
        options: EngineOptions,
    ) -> Self {
        let sweep_gate = Semaphore::new(options.sweep_chunk_size.max(1));
        Self {
            inner: Arc::new(EngineInner {
                ledger,
                oracle,
                store,
                mint_time,
                options,
                mint_cache: Mutex::new(HashMap::new()),
                sweep_gate,
            }),
        }
    }

    pub fn options(&self) -> &EngineOptions {
        &self.inner.options
    }

    pub(crate) fn unix_now() -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs() as i64)
    }

    pub(crate) async fn load_box_record(&self, box_id: &Pubkey) -> Result<BoxRecord> {
        self.inner
            .store
            .box_record(box_id)
            .await?
            .ok_or(SettlementError::BoxNotFound(*box_id))
    }

    /// Loads a project row and rejects it before any ledger call if its
    /// calibration would misprice outcomes.
    pub(crate) async fn load_project(&self, project_id: &Pubkey) -> Result<ProjectRecord> {
        let project = self
            .inner
            .store
            .project_record(project_id)
            .await?
            .ok_or(SettlementError::ProjectNotFound(*project_id))?;
        project.settings.validate()?;
        Ok(project)
    }

    pub(crate) fn box_account_address(&self, box_mint: &Pubkey) -> Pubkey {
        state::box_state_address(box_mint, &self.inner.options.program_id)
    }

    pub(crate) async fn read_box_account(&self, box_mint: &Pubkey) -> Result<Option<BoxAccount>> {
        let address = self.box_account_address(box_mint);
        match self.inner.ledger.read_account(&address).await? {
            Some(data) => Ok(Some(state::parse_box_account(&data)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn read_project_account(
        &self,
        project_id: &Pubkey,
    ) -> Result<Option<ProjectAccount>> {
        match self.inner.ledger.read_account(project_id).await? {
            Some(data) => Ok(Some(state::parse_project_account(&data)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn read_token_account(
        &self,
        address: &Pubkey,
    ) -> Result<Option<anchor_spl::token::TokenAccount>> {
        match self.inner.ledger.read_account(address).await? {
            Some(data) => Ok(Some(state::parse_token_account(&data)?)),
            None => Ok(None),
        }
    }

    pub(crate) async fn vault_balance(&self, vault: &Pubkey) -> Result<u64> {
        self.read_token_account(vault)
            .await?
            .map(|account| account.amount)
            .ok_or_else(|| SettlementError::Ledger(format!("vault account {vault} not found")))
    }

    /// Associated token account a wallet would hold `mint` in.
    pub(crate) fn associated_account(&self, wallet: &Pubkey, mint: &Pubkey) -> Pubkey {
        get_associated_token_address(wallet, mint)
    }

    /// Verifies the box token sits in `owner`'s wallet with a balance of
    /// exactly one, neither escrowed nor transferred away.
    pub(crate) async fn verify_box_holding(&self, owner: &Pubkey, box_mint: &Pubkey) -> Result<()> {
        let holding_address = self.associated_account(owner, box_mint);
        let held = self
            .read_token_account(&holding_address)
            .await?
            .map(|account| account.owner == *owner && account.mint == *box_mint && account.amount == 1)
            .unwrap_or(false);
        if held {
            Ok(())
        } else {
            Err(SettlementError::BoxNotHeld {
                box_id: *box_mint,
                owner: *owner,
            })
        }
    }

    pub(crate) fn cache_lock(&self) -> std::sync::MutexGuard<'_, HashMap<Pubkey, CachedMintTime>> {
        match self.inner.mint_cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
