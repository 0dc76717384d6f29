//! Off-chain settlement engine for luck-weighted boxes. Commits on-chain
//! randomness for an opened box, resolves the reward tier once the oracle
//! reveals, pays out from the project vault and refunds boxes whose reveal
//! window lapsed.

use anchor_lang::prelude::*;

pub mod config;
pub mod constants;
pub mod economics;
pub mod error;
pub mod ledger;
pub mod luck;
pub mod ops;
pub mod oracle;
pub mod state;
pub mod store;
pub mod tiers;

declare_id!("Fg6PaFpoGXkYsidMpWTK6W2BeZ7FEfcYkg476zPFsLnS");

pub use config::{EngineOptions, PayoutMultipliers, ProjectSettings, TierBracket};
pub use error::{Result, SettlementError};
pub use ledger::{BoxInstruction, Ledger, LedgerReceipt};
pub use ops::SettlementEngine;
pub use oracle::RandomnessOracle;
pub use state::{BoxAccount, BoxPhase, ProjectAccount};
pub use store::{BoxRecord, BoxRecordStore, MintTimeSource, ProjectRecord};
pub use tiers::OutcomeTier;
