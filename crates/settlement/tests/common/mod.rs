//! In-memory stand-ins for the four engine seams. The fake ledger applies
//! real instruction semantics so post-submit reads observe fresh state.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use anchor_lang::prelude::Pubkey;
use anchor_lang::AccountSerialize;
use anchor_spl::associated_token::get_associated_token_address;
use anchor_spl::token::spl_token;
use async_trait::async_trait;
use solana_program::program_option::COption;
use solana_program::program_pack::Pack;

use box_settlement::config::{EngineOptions, ProjectSettings};
use box_settlement::constants::{
    RANDOMNESS_MIN_ACCOUNT_LEN, RANDOMNESS_REVEAL_SLOT_OFFSET, RANDOMNESS_VALUE_OFFSET,
};
use box_settlement::ledger::{BoxInstruction, Ledger, LedgerReceipt};
use box_settlement::oracle::RandomnessOracle;
use box_settlement::state::{box_state_address, parse_box_account, parse_project_account, BoxAccount, ProjectAccount};
use box_settlement::store::{BoxRecord, BoxRecordStore, MintTimeSource, Page, ProjectRecord};
use box_settlement::{Result, SettlementEngine, SettlementError};

pub const BOX_PRICE: u64 = 1_000_000;
pub const VAULT_FUNDING: u64 = 30_000_000;

pub fn wall_now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_secs() as i64)
}

fn serialize_box(state: &BoxAccount) -> Vec<u8> {
    let mut data = Vec::new();
    state.try_serialize(&mut data).unwrap();
    data
}

fn serialize_project(account: &ProjectAccount) -> Vec<u8> {
    let mut data = Vec::new();
    account.try_serialize(&mut data).unwrap();
    data
}

fn pack_token_account(mint: &Pubkey, owner: &Pubkey, amount: u64) -> Vec<u8> {
    let account = spl_token::state::Account {
        mint: *mint,
        owner: *owner,
        amount,
        delegate: COption::None,
        state: spl_token::state::AccountState::Initialized,
        is_native: COption::None,
        delegated_amount: 0,
        close_authority: COption::None,
    };
    let mut data = vec![0u8; spl_token::state::Account::LEN];
    spl_token::state::Account::pack(account, &mut data).unwrap();
    data
}

fn unpack_token_account(data: &[u8]) -> spl_token::state::Account {
    spl_token::state::Account::unpack(data).unwrap()
}

// ---------------------------------------------------------------------------
// Ledger

#[derive(Default)]
struct LedgerInner {
    accounts: Mutex<HashMap<Pubkey, Vec<u8>>>,
    submissions: Mutex<Vec<String>>,
    created_payout_accounts: Mutex<Vec<Pubkey>>,
    read_failures: Mutex<HashSet<Pubkey>>,
    submit_failures: Mutex<HashMap<Pubkey, String>>,
    clock: Mutex<Option<i64>>,
    reads: Mutex<u64>,
}

#[derive(Clone, Default)]
pub struct MemoryLedger {
    inner: Arc<LedgerInner>,
}

impl MemoryLedger {
    fn now(&self) -> i64 {
        self.inner.clock.lock().unwrap().unwrap_or_else(wall_now)
    }

    /// Pins the ledger clock used to stamp commits. `None` follows the
    /// wall clock again.
    pub fn set_clock(&self, at: Option<i64>) {
        *self.inner.clock.lock().unwrap() = at;
    }

    pub fn set_project_account(&self, address: Pubkey, account: &ProjectAccount) {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .insert(address, serialize_project(account));
    }

    pub fn set_token_account(&self, address: Pubkey, mint: &Pubkey, owner: &Pubkey, amount: u64) {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .insert(address, pack_token_account(mint, owner, amount));
    }

    pub fn token_balance(&self, address: &Pubkey) -> u64 {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .map(|data| unpack_token_account(data).amount)
            .unwrap_or(0)
    }

    pub fn box_account(&self, address: &Pubkey) -> Option<BoxAccount> {
        self.inner
            .accounts
            .lock()
            .unwrap()
            .get(address)
            .map(|data| parse_box_account(data).unwrap())
    }

    /// Edits a stored box account in place, for crafting states the
    /// engine would not produce itself.
    pub fn mutate_box(&self, address: &Pubkey, mutate: impl FnOnce(&mut BoxAccount)) {
        let mut accounts = self.inner.accounts.lock().unwrap();
        let data = accounts.get(address).expect("box account to mutate");
        let mut state = parse_box_account(data).unwrap();
        mutate(&mut state);
        accounts.insert(*address, serialize_box(&state));
    }

    pub fn fail_reads_for(&self, address: Pubkey) {
        self.inner.read_failures.lock().unwrap().insert(address);
    }

    pub fn fail_submits_for(&self, box_mint: Pubkey, message: &str) {
        self.inner
            .submit_failures
            .lock()
            .unwrap()
            .insert(box_mint, message.to_string());
    }

    pub fn clear_submit_failure(&self, box_mint: &Pubkey) {
        self.inner.submit_failures.lock().unwrap().remove(box_mint);
    }

    pub fn reads(&self) -> u64 {
        *self.inner.reads.lock().unwrap()
    }

    pub fn submission_count(&self, name: &str) -> usize {
        self.inner
            .submissions
            .lock()
            .unwrap()
            .iter()
            .filter(|entry| entry.as_str() == name)
            .count()
    }

    pub fn created_payout_accounts(&self) -> Vec<Pubkey> {
        self.inner.created_payout_accounts.lock().unwrap().clone()
    }

    fn transfer(
        accounts: &mut HashMap<Pubkey, Vec<u8>>,
        from: &Pubkey,
        to: &Pubkey,
        to_owner: &Pubkey,
        amount: u64,
    ) -> Result<()> {
        let source = accounts
            .get(from)
            .map(|data| unpack_token_account(data))
            .ok_or_else(|| SettlementError::Ledger(format!("token account {from} missing")))?;
        if source.amount < amount {
            return Err(SettlementError::Ledger(format!(
                "transfer of {amount} exceeds balance {}",
                source.amount
            )));
        }
        let mint = source.mint;
        accounts.insert(
            *from,
            pack_token_account(&mint, &source.owner, source.amount - amount),
        );
        let destination_amount = accounts
            .get(to)
            .map(|data| unpack_token_account(data).amount)
            .unwrap_or(0);
        accounts.insert(
            *to,
            pack_token_account(&mint, to_owner, destination_amount + amount),
        );
        Ok(())
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn submit(&self, instruction: BoxInstruction) -> Result<LedgerReceipt> {
        self.inner
            .submissions
            .lock()
            .unwrap()
            .push(instruction.name().to_string());
        if let Some(message) = self
            .inner
            .submit_failures
            .lock()
            .unwrap()
            .get(&instruction.box_mint())
        {
            return Err(SettlementError::Ledger(message.clone()));
        }

        let mut accounts = self.inner.accounts.lock().unwrap();
        let emitted = match instruction {
            BoxInstruction::CommitRandomness {
                box_mint,
                box_account,
                project,
                owner,
                round,
                luck,
            } => {
                if let Some(data) = accounts.get(&box_account) {
                    if parse_box_account(data)?.committed_at != 0 {
                        return Err(SettlementError::Ledger(
                            "box already committed".to_string(),
                        ));
                    }
                }
                let state = BoxAccount {
                    owner,
                    box_mint,
                    project,
                    committed_at: self.now(),
                    luck,
                    randomness_account: round,
                    random_percentage: 0.0,
                    reward_tier: 0,
                    reward_amount: 0,
                    is_jackpot: false,
                    honorary_choice: false,
                    honorary_transformed: false,
                    revealed: false,
                    settled: false,
                    bump: 255,
                };
                let data = serialize_box(&state);
                accounts.insert(box_account, data.clone());
                data
            }
            BoxInstruction::RevealAndRecord {
                box_account,
                random_percentage,
                reward_tier,
                reward_amount,
                is_jackpot,
                ..
            } => {
                let data = accounts
                    .get(&box_account)
                    .ok_or_else(|| SettlementError::Ledger("box account missing".to_string()))?;
                let mut state = parse_box_account(data)?;
                if state.committed_at == 0 {
                    return Err(SettlementError::Ledger("box not committed".to_string()));
                }
                if state.revealed {
                    return Err(SettlementError::Ledger("box already revealed".to_string()));
                }
                state.random_percentage = random_percentage;
                state.reward_tier = reward_tier;
                state.reward_amount = reward_amount;
                state.is_jackpot = is_jackpot;
                state.revealed = true;
                let data = serialize_box(&state);
                accounts.insert(box_account, data.clone());
                data
            }
            BoxInstruction::SettleAndTransfer {
                box_account,
                project,
                owner,
                vault,
                payout_account,
                create_payout_account,
                honorary,
                ..
            } => {
                let data = accounts
                    .get(&box_account)
                    .ok_or_else(|| SettlementError::Ledger("box account missing".to_string()))?;
                let mut state = parse_box_account(data)?;
                if !state.revealed {
                    return Err(SettlementError::Ledger("box not revealed".to_string()));
                }
                if state.settled {
                    return Err(SettlementError::Ledger("box already settled".to_string()));
                }
                let amount = if honorary { 0 } else { state.reward_amount };
                if amount > 0 {
                    if create_payout_account && !accounts.contains_key(&payout_account) {
                        self.inner
                            .created_payout_accounts
                            .lock()
                            .unwrap()
                            .push(payout_account);
                    }
                    Self::transfer(&mut accounts, &vault, &payout_account, &owner, amount)?;
                }
                state.settled = true;
                state.honorary_choice = honorary;
                let data = serialize_box(&state);
                accounts.insert(box_account, data.clone());

                let project_data = accounts
                    .get(&project)
                    .ok_or_else(|| SettlementError::Ledger("project account missing".to_string()))?;
                let mut project_state = parse_project_account(project_data)?;
                project_state.total_boxes_settled += 1;
                project_state.total_paid_out += amount;
                accounts.insert(project, serialize_project(&project_state));
                data
            }
            BoxInstruction::Refund {
                box_account,
                owner,
                vault,
                payout_account,
                amount,
                ..
            } => {
                if let Some(data) = accounts.get(&box_account) {
                    let state = parse_box_account(data)?;
                    if state.revealed {
                        return Err(SettlementError::Ledger(
                            "revealed box cannot be refunded".to_string(),
                        ));
                    }
                }
                Self::transfer(&mut accounts, &vault, &payout_account, &owner, amount)?;
                accounts.get(&box_account).cloned().unwrap_or_default()
            }
        };

        let signature = format!("sig-{}", self.inner.submissions.lock().unwrap().len());
        Ok(LedgerReceipt {
            signature,
            emitted_state: Some(emitted),
        })
    }

    async fn read_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        *self.inner.reads.lock().unwrap() += 1;
        if self.inner.read_failures.lock().unwrap().contains(address) {
            return Err(SettlementError::Ledger(format!("read of {address} failed")));
        }
        Ok(self.inner.accounts.lock().unwrap().get(address).cloned())
    }
}

// ---------------------------------------------------------------------------
// Oracle

struct RoundState {
    pending_remaining: u32,
    value: Option<u32>,
}

struct OracleInner {
    rounds: Mutex<HashMap<Pubkey, RoundState>>,
    created: Mutex<Vec<Pubkey>>,
    polls: Mutex<HashMap<Pubkey, u32>>,
    failing: Mutex<HashSet<Pubkey>>,
    default_pending_polls: Mutex<u32>,
    next_value: Mutex<u32>,
}

impl Default for OracleInner {
    fn default() -> Self {
        Self {
            rounds: Mutex::new(HashMap::new()),
            created: Mutex::new(Vec::new()),
            polls: Mutex::new(HashMap::new()),
            failing: Mutex::new(HashSet::new()),
            default_pending_polls: Mutex::new(0),
            next_value: Mutex::new(value_for_percentage(50.0)),
        }
    }
}

#[derive(Clone, Default)]
pub struct MemoryOracle {
    inner: Arc<OracleInner>,
}

/// First four value bytes that decode to roughly this percentage.
pub fn value_for_percentage(percentage: f64) -> u32 {
    ((percentage / 100.0) * u32::MAX as f64) as u32
}

fn randomness_bytes(reveal_slot: u64, value: u32) -> Vec<u8> {
    let mut data = vec![0u8; RANDOMNESS_MIN_ACCOUNT_LEN];
    data[RANDOMNESS_REVEAL_SLOT_OFFSET..RANDOMNESS_REVEAL_SLOT_OFFSET + 8]
        .copy_from_slice(&reveal_slot.to_le_bytes());
    data[RANDOMNESS_VALUE_OFFSET..RANDOMNESS_VALUE_OFFSET + 4]
        .copy_from_slice(&value.to_le_bytes());
    data
}

impl MemoryOracle {
    /// Percentage the next drawn round resolves to.
    pub fn set_next_percentage(&self, percentage: f64) {
        *self.inner.next_value.lock().unwrap() = value_for_percentage(percentage);
    }

    /// How many polls every new round answers with "not yet" before
    /// revealing.
    pub fn set_pending_polls(&self, polls: u32) {
        *self.inner.default_pending_polls.lock().unwrap() = polls;
    }

    pub fn fail_round(&self, round: &Pubkey) {
        self.inner.failing.lock().unwrap().insert(*round);
    }

    pub fn created(&self) -> Vec<Pubkey> {
        self.inner.created.lock().unwrap().clone()
    }

    pub fn polls(&self, round: &Pubkey) -> u32 {
        self.inner.polls.lock().unwrap().get(round).copied().unwrap_or(0)
    }
}

#[async_trait]
impl RandomnessOracle for MemoryOracle {
    async fn create_round(&self, _queue: &Pubkey) -> Result<Pubkey> {
        let round = Pubkey::new_unique();
        self.inner.rounds.lock().unwrap().insert(
            round,
            RoundState {
                pending_remaining: *self.inner.default_pending_polls.lock().unwrap(),
                value: None,
            },
        );
        self.inner.created.lock().unwrap().push(round);
        Ok(round)
    }

    async fn reveal(&self, round: &Pubkey) -> Result<Vec<u8>> {
        *self.inner.polls.lock().unwrap().entry(*round).or_insert(0) += 1;
        if self.inner.failing.lock().unwrap().contains(round) {
            return Err(SettlementError::Oracle(format!(
                "randomness account {round} unavailable"
            )));
        }
        let mut rounds = self.inner.rounds.lock().unwrap();
        let state = rounds
            .get_mut(round)
            .ok_or_else(|| SettlementError::Oracle(format!("unknown round {round}")))?;
        if state.pending_remaining > 0 {
            state.pending_remaining -= 1;
            return Ok(randomness_bytes(0, 0));
        }
        let value = *state
            .value
            .get_or_insert_with(|| *self.inner.next_value.lock().unwrap());
        Ok(randomness_bytes(987_654, value))
    }
}

// ---------------------------------------------------------------------------
// Record store

#[derive(Default)]
struct StoreInner {
    boxes: Mutex<HashMap<Pubkey, BoxRecord>>,
    projects: Mutex<HashMap<Pubkey, ProjectRecord>>,
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl MemoryStore {
    pub fn insert_box(&self, record: BoxRecord) {
        self.inner.boxes.lock().unwrap().insert(record.box_id, record);
    }

    pub fn insert_project(&self, record: ProjectRecord) {
        self.inner
            .projects
            .lock()
            .unwrap()
            .insert(record.project_id, record);
    }

    pub fn box_row(&self, box_id: &Pubkey) -> Option<BoxRecord> {
        self.inner.boxes.lock().unwrap().get(box_id).cloned()
    }

    pub fn update_box(&self, box_id: &Pubkey, update: impl FnOnce(&mut BoxRecord)) {
        let mut boxes = self.inner.boxes.lock().unwrap();
        let record = boxes.get_mut(box_id).expect("box row to update");
        update(record);
    }

    pub fn set_committed(&self, box_id: &Pubkey, committed_at: i64) {
        self.update_box(box_id, |record| record.committed_at = committed_at);
    }

    pub fn set_project_active(&self, project_id: &Pubkey, active: bool) {
        let mut projects = self.inner.projects.lock().unwrap();
        let record = projects.get_mut(project_id).expect("project row");
        record.active = active;
    }
}

#[async_trait]
impl BoxRecordStore for MemoryStore {
    async fn box_record(&self, box_id: &Pubkey) -> Result<Option<BoxRecord>> {
        Ok(self.inner.boxes.lock().unwrap().get(box_id).cloned())
    }

    async fn project_record(&self, project_id: &Pubkey) -> Result<Option<ProjectRecord>> {
        Ok(self.inner.projects.lock().unwrap().get(project_id).cloned())
    }

    async fn boxes_for_owner(
        &self,
        project: &Pubkey,
        owner: &Pubkey,
        page: Page,
    ) -> Result<Vec<BoxRecord>> {
        let mut rows: Vec<BoxRecord> = self
            .inner
            .boxes
            .lock()
            .unwrap()
            .values()
            .filter(|record| record.project_id == *project && record.owner == *owner)
            .cloned()
            .collect();
        rows.sort_by_key(|record| record.box_id.to_string());
        Ok(rows.into_iter().skip(page.offset).take(page.limit).collect())
    }

    async fn expired_commitments(
        &self,
        cutoff: i64,
        project: Option<&Pubkey>,
    ) -> Result<Vec<BoxRecord>> {
        let mut rows: Vec<BoxRecord> = self
            .inner
            .boxes
            .lock()
            .unwrap()
            .values()
            .filter(|record| {
                record.committed_at > 0
                    && record.committed_at < cutoff
                    && !record.revealed
                    && !record.refund_eligible
                    && record.refunded_at.is_none()
                    && project.map_or(true, |id| record.project_id == *id)
            })
            .cloned()
            .collect();
        rows.sort_by_key(|record| record.box_id.to_string());
        Ok(rows)
    }

    async fn unopened_unsettled_count(&self, project: &Pubkey) -> Result<u64> {
        Ok(self
            .inner
            .boxes
            .lock()
            .unwrap()
            .values()
            .filter(|record| {
                record.project_id == *project && !record.settled && record.refunded_at.is_none()
            })
            .count() as u64)
    }

    async fn mark_refund_eligible(
        &self,
        box_id: &Pubkey,
        failed_at: i64,
        reason: &str,
    ) -> Result<()> {
        let mut boxes = self.inner.boxes.lock().unwrap();
        let record = boxes
            .get_mut(box_id)
            .ok_or_else(|| SettlementError::Store(format!("box row {box_id} missing")))?;
        record.refund_eligible = true;
        record.reveal_failed_at = Some(failed_at);
        record.reveal_failure_reason = Some(reason.to_string());
        Ok(())
    }

    async fn mark_refunded(&self, box_id: &Pubkey, refunded_at: i64) -> Result<()> {
        let mut boxes = self.inner.boxes.lock().unwrap();
        let record = boxes
            .get_mut(box_id)
            .ok_or_else(|| SettlementError::Store(format!("box row {box_id} missing")))?;
        record.refunded_at = Some(refunded_at);
        Ok(())
    }

    async fn record_reveal_failure(
        &self,
        box_id: &Pubkey,
        failed_at: i64,
        reason: &str,
    ) -> Result<()> {
        let mut boxes = self.inner.boxes.lock().unwrap();
        let record = boxes
            .get_mut(box_id)
            .ok_or_else(|| SettlementError::Store(format!("box row {box_id} missing")))?;
        record.reveal_failed_at = Some(failed_at);
        record.reveal_failure_reason = Some(reason.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Mint-time source

#[derive(Default)]
struct MintTimesInner {
    times: Mutex<HashMap<Pubkey, i64>>,
    failing: Mutex<HashSet<Pubkey>>,
    delay: Mutex<Option<Duration>>,
    lookups: Mutex<Vec<Pubkey>>,
}

#[derive(Clone, Default)]
pub struct MemoryMintTimes {
    inner: Arc<MintTimesInner>,
}

impl MemoryMintTimes {
    pub fn set(&self, box_id: &Pubkey, first_activity: i64) {
        self.inner.times.lock().unwrap().insert(*box_id, first_activity);
    }

    pub fn fail(&self, box_id: &Pubkey) {
        self.inner.failing.lock().unwrap().insert(*box_id);
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.inner.delay.lock().unwrap() = Some(delay);
    }

    pub fn lookups(&self) -> usize {
        self.inner.lookups.lock().unwrap().len()
    }
}

#[async_trait]
impl MintTimeSource for MemoryMintTimes {
    async fn first_activity(&self, box_id: &Pubkey) -> Result<Option<i64>> {
        self.inner.lookups.lock().unwrap().push(*box_id);
        let delay = *self.inner.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.inner.failing.lock().unwrap().contains(box_id) {
            return Err(SettlementError::MintTimeUnavailable(format!(
                "no transaction history for {box_id}"
            )));
        }
        Ok(self.inner.times.lock().unwrap().get(box_id).copied())
    }
}

// ---------------------------------------------------------------------------
// Harness

pub struct Harness {
    pub engine: SettlementEngine<MemoryLedger, MemoryOracle, MemoryStore, MemoryMintTimes>,
    pub ledger: MemoryLedger,
    pub oracle: MemoryOracle,
    pub store: MemoryStore,
    pub mint_times: MemoryMintTimes,
    pub project_id: Pubkey,
    pub authority: Pubkey,
    pub payment_mint: Pubkey,
    pub vault: Pubkey,
    pub owner: Pubkey,
}

pub fn harness() -> Harness {
    harness_with(ProjectSettings::default())
}

pub fn harness_with(settings: ProjectSettings) -> Harness {
    let options = EngineOptions {
        reveal_retry_delay: Duration::from_millis(5),
        sweep_chunk_delay: Duration::from_millis(1),
        mint_time_timeout: Duration::from_millis(50),
        ..EngineOptions::default()
    };
    harness_with_options(settings, options)
}

pub fn harness_with_options(settings: ProjectSettings, options: EngineOptions) -> Harness {
    let ledger = MemoryLedger::default();
    let oracle = MemoryOracle::default();
    let store = MemoryStore::default();
    let mint_times = MemoryMintTimes::default();

    let project_id = Pubkey::new_unique();
    let authority = Pubkey::new_unique();
    let payment_mint = Pubkey::new_unique();
    let vault = Pubkey::new_unique();
    let owner = Pubkey::new_unique();

    store.insert_project(ProjectRecord {
        project_id,
        authority,
        payment_mint,
        vault,
        box_price: BOX_PRICE,
        settings: settings.clone(),
        active: true,
    });
    ledger.set_project_account(
        project_id,
        &ProjectAccount {
            authority,
            payment_mint,
            payment_decimals: 6,
            vault,
            box_price: BOX_PRICE,
            commission_bps: settings.commission_bps,
            total_boxes_created: 0,
            total_boxes_settled: 0,
            total_paid_out: 0,
            active: true,
            bump: 255,
        },
    );
    ledger.set_token_account(vault, &payment_mint, &authority, VAULT_FUNDING);

    let engine = SettlementEngine::with_options(
        ledger.clone(),
        oracle.clone(),
        store.clone(),
        mint_times.clone(),
        options,
    );

    Harness {
        engine,
        ledger,
        oracle,
        store,
        mint_times,
        project_id,
        authority,
        payment_mint,
        vault,
        owner,
    }
}

impl Harness {
    pub fn box_address(&self, box_id: &Pubkey) -> Pubkey {
        box_state_address(box_id, &self.engine.options().program_id)
    }

    pub fn box_account(&self, box_id: &Pubkey) -> Option<BoxAccount> {
        self.ledger.box_account(&self.box_address(box_id))
    }

    pub fn owner_payment_account(&self) -> Pubkey {
        get_associated_token_address(&self.owner, &self.payment_mint)
    }

    pub fn holder_account(&self, box_id: &Pubkey) -> Pubkey {
        get_associated_token_address(&self.owner, box_id)
    }

    /// Seeds a purchased, unopened box held for `held_seconds`.
    pub fn add_box(&self, held_seconds: i64) -> Pubkey {
        self.add_box_with_balance(held_seconds, 1)
    }

    pub fn add_box_with_balance(&self, held_seconds: i64, balance: u64) -> Pubkey {
        let box_id = Pubkey::new_unique();
        self.store.insert_box(BoxRecord {
            box_id,
            project_id: self.project_id,
            owner: self.owner,
            created_at: wall_now() - held_seconds,
            committed_at: 0,
            revealed: false,
            settled: false,
            refund_eligible: false,
            refunded_at: None,
            reveal_failed_at: None,
            reveal_failure_reason: None,
        });
        self.ledger.set_token_account(
            get_associated_token_address(&self.owner, &box_id),
            &box_id,
            &self.owner,
            balance,
        );
        box_id
    }
}
