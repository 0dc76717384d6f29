//! Typed instructions for the on-ledger settlement program and the
//! transport seam that executes them.

use anchor_lang::prelude::*;
use async_trait::async_trait;
use solana_program::hash::hash;
use solana_program::instruction::{AccountMeta, Instruction};

use crate::error::{Result, SettlementError};

/// One settlement transition, expressed as typed fields rather than wire
/// bytes. [`BoxInstruction::encode`] produces the canonical instruction;
/// transports that sign and send are free to build on it.
#[derive(Debug, Clone, PartialEq)]
pub enum BoxInstruction {
    /// Records a randomness round and frozen luck on the box, stamping
    /// `committed_at` from the ledger clock.
    CommitRandomness {
        box_mint: Pubkey,
        box_account: Pubkey,
        project: Pubkey,
        owner: Pubkey,
        round: Pubkey,
        luck: u8,
    },
    /// Writes the resolved outcome and flips `revealed`.
    RevealAndRecord {
        box_mint: Pubkey,
        box_account: Pubkey,
        project: Pubkey,
        owner: Pubkey,
        round: Pubkey,
        random_percentage: f64,
        reward_tier: u8,
        reward_amount: u64,
        is_jackpot: bool,
    },
    /// Pays the reward from the vault, bumps the project counters and
    /// flips `settled`. `honorary` suppresses the transfer on jackpots.
    SettleAndTransfer {
        box_mint: Pubkey,
        box_account: Pubkey,
        project: Pubkey,
        owner: Pubkey,
        holder_token_account: Pubkey,
        vault: Pubkey,
        payout_account: Pubkey,
        create_payout_account: bool,
        honorary: bool,
    },
    /// Returns the box price for a commitment whose reveal never landed.
    Refund {
        box_mint: Pubkey,
        box_account: Pubkey,
        project: Pubkey,
        owner: Pubkey,
        vault: Pubkey,
        payout_account: Pubkey,
        amount: u64,
    },
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, PartialEq)]
struct CommitRandomnessArgs {
    randomness_account: Pubkey,
    luck: u8,
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, PartialEq)]
struct RevealAndRecordArgs {
    random_percentage: f64,
    reward_tier: u8,
    reward_amount: u64,
    is_jackpot: bool,
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, PartialEq)]
struct SettleAndTransferArgs {
    create_payout_account: bool,
    honorary: bool,
}

#[derive(AnchorSerialize, AnchorDeserialize, Debug, PartialEq)]
struct RefundArgs {
    amount: u64,
}

impl BoxInstruction {
    pub fn name(&self) -> &'static str {
        match self {
            Self::CommitRandomness { .. } => "commit_randomness",
            Self::RevealAndRecord { .. } => "reveal_and_record",
            Self::SettleAndTransfer { .. } => "settle_and_transfer",
            Self::Refund { .. } => "refund",
        }
    }

    /// Mint of the box this instruction touches, for logging and fakes.
    pub fn box_mint(&self) -> Pubkey {
        match self {
            Self::CommitRandomness { box_mint, .. }
            | Self::RevealAndRecord { box_mint, .. }
            | Self::SettleAndTransfer { box_mint, .. }
            | Self::Refund { box_mint, .. } => *box_mint,
        }
    }

    /// Builds the wire instruction: the 8-byte global sighash of the
    /// instruction name followed by the borsh-serialized arguments.
    /// `authority` is the backend signer the transport will sign with.
    pub fn encode(&self, program_id: &Pubkey, authority: &Pubkey) -> Result<Instruction> {
        let mut data = sighash(self.name()).to_vec();

        let accounts = match self {
            Self::CommitRandomness {
                box_mint,
                box_account,
                project,
                owner,
                round,
                luck,
            } => {
                let args = CommitRandomnessArgs {
                    randomness_account: *round,
                    luck: *luck,
                };
                data.extend(encode_args(&args)?);
                vec![
                    AccountMeta::new_readonly(*owner, false),
                    AccountMeta::new_readonly(*box_mint, false),
                    AccountMeta::new(*box_account, false),
                    AccountMeta::new_readonly(*project, false),
                    AccountMeta::new_readonly(*round, false),
                    AccountMeta::new(*authority, true),
                    AccountMeta::new_readonly(anchor_lang::system_program::ID, false),
                ]
            }
            Self::RevealAndRecord {
                box_mint,
                box_account,
                project,
                owner,
                round,
                random_percentage,
                reward_tier,
                reward_amount,
                is_jackpot,
            } => {
                let args = RevealAndRecordArgs {
                    random_percentage: *random_percentage,
                    reward_tier: *reward_tier,
                    reward_amount: *reward_amount,
                    is_jackpot: *is_jackpot,
                };
                data.extend(encode_args(&args)?);
                vec![
                    AccountMeta::new_readonly(*owner, false),
                    AccountMeta::new_readonly(*box_mint, false),
                    AccountMeta::new(*box_account, false),
                    AccountMeta::new_readonly(*project, false),
                    AccountMeta::new_readonly(*round, false),
                    AccountMeta::new_readonly(*authority, true),
                ]
            }
            Self::SettleAndTransfer {
                box_mint,
                box_account,
                project,
                owner,
                holder_token_account,
                vault,
                payout_account,
                create_payout_account,
                honorary,
            } => {
                let args = SettleAndTransferArgs {
                    create_payout_account: *create_payout_account,
                    honorary: *honorary,
                };
                data.extend(encode_args(&args)?);
                vec![
                    AccountMeta::new_readonly(*owner, false),
                    AccountMeta::new_readonly(*box_mint, false),
                    AccountMeta::new(*box_account, false),
                    AccountMeta::new(*project, false),
                    AccountMeta::new_readonly(*holder_token_account, false),
                    AccountMeta::new(*vault, false),
                    AccountMeta::new(*payout_account, false),
                    AccountMeta::new(*authority, true),
                    AccountMeta::new_readonly(anchor_spl::token::ID, false),
                    AccountMeta::new_readonly(anchor_spl::associated_token::ID, false),
                    AccountMeta::new_readonly(anchor_lang::system_program::ID, false),
                ]
            }
            Self::Refund {
                box_mint,
                box_account,
                project,
                owner,
                vault,
                payout_account,
                amount,
            } => {
                let args = RefundArgs { amount: *amount };
                data.extend(encode_args(&args)?);
                vec![
                    AccountMeta::new_readonly(*owner, false),
                    AccountMeta::new_readonly(*box_mint, false),
                    AccountMeta::new(*box_account, false),
                    AccountMeta::new_readonly(*project, false),
                    AccountMeta::new(*vault, false),
                    AccountMeta::new(*payout_account, false),
                    AccountMeta::new(*authority, true),
                    AccountMeta::new_readonly(anchor_spl::token::ID, false),
                ]
            }
        };

        Ok(Instruction {
            program_id: *program_id,
            accounts,
            data,
        })
    }
}

fn encode_args<T: AnchorSerialize>(args: &T) -> Result<Vec<u8>> {
    args.try_to_vec()
        .map_err(|e| SettlementError::Ledger(format!("encode args: {e}")))
}

fn sighash(name: &str) -> [u8; 8] {
    let preimage = format!("global:{name}");
    let mut out = [0u8; 8];
    out.copy_from_slice(&hash(preimage.as_bytes()).to_bytes()[..8]);
    out
}

/// Result of a confirmed ledger submission. `emitted_state` carries the
/// post-transaction box account bytes when the transport captures them,
/// sparing the caller a follow-up read.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    pub signature: String,
    pub emitted_state: Option<Vec<u8>>,
}

/// Opaque transaction execution. Implementations sign, send, confirm, and
/// surface rejections as [`crate::SettlementError::Ledger`].
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn submit(&self, instruction: BoxInstruction) -> Result<LedgerReceipt>;

    /// Raw account fetch, `None` when the account does not exist.
    async fn read_account(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;
}
