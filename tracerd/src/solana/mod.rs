use std::str::FromStr;

use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use mockall::automock;
use serde::{Deserialize, Serialize};
use solana_client::client_error::{ClientError, ClientErrorKind};
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use solana_sdk::transaction::TransactionError;
use solana_transaction_status::option_serializer::OptionSerializer;
use solana_transaction_status::{
    EncodedConfirmedTransactionWithStatusMeta, EncodedTransaction, UiCompiledInstruction,
    UiInstruction, UiMessage, UiTransactionEncoding,
};
use spl_token_2022::extension::{BaseStateWithExtensions, StateWithExtensions};
use spl_token_2022::state::Mint;
use spl_token_metadata_interface::state::TokenMetadata;
use thiserror::Error;
use tracing::{debug, error};

use crate::types::ChainName;
use crate::url::Url;

pub mod accounts;
pub mod classifier;
pub mod decoder;
pub mod instruction;

/// Sentinel the bridge program uses for native SOL in place of a mint.
pub const SOL_SENTINEL: &str = "SoL1111111111111111111111111111111111111111";
pub const SOL_DECIMALS: u8 = 9;

/// The Solana networks the bridge program is deployed on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SolanaNetwork {
    Mainnet,
    Devnet,
}

impl SolanaNetwork {
    /// Probe order: production first, then the test network.
    pub const PROBE_ORDER: [SolanaNetwork; 2] = [SolanaNetwork::Mainnet, SolanaNetwork::Devnet];

    pub fn chain_name(self) -> ChainName {
        match self {
            SolanaNetwork::Mainnet => ChainName::Solana,
            SolanaNetwork::Devnet => ChainName::SolanaDevnet,
        }
    }

    pub fn bridge_program(self) -> Pubkey {
        match self {
            SolanaNetwork::Mainnet => {
                parse_pubkey("HNCne2FkVaNghhjKXapxJzPaBvAKDG1Ge3gqhZyfVWLM")
            }
            SolanaNetwork::Devnet => parse_pubkey("7c6mteAcTXaQ1MFBCrnuzoZVTTAEfZwa6wgy4bqX3KXC"),
        }
    }
}

fn parse_pubkey(s: &str) -> Pubkey {
    Pubkey::from_str(s).expect("hardcoded pubkey is valid")
}

#[derive(Error, Debug)]
pub enum RpcError {
    #[error("Solana JSON-RPC request failed")]
    Request,
    #[error("unsupported transaction encoding in RPC response")]
    Encoding,
    #[error("account data does not match the expected token layout")]
    TokenLayout,
}

type Result<T> = error_stack::Result<T, RpcError>;

/// An instruction with program id, account list and raw data already
/// resolved against the transaction's account keys.
#[derive(Clone, Debug, PartialEq)]
pub struct Instruction {
    pub program_id: Pubkey,
    pub accounts: Vec<Pubkey>,
    pub data: Vec<u8>,
}

/// A fetched transaction, flattened to what classification needs.
#[derive(Clone, Debug)]
pub struct SolanaTransaction {
    pub signature: Signature,
    pub block_time: Option<i64>,
    pub err: Option<TransactionError>,
    pub instructions: Vec<Instruction>,
    pub inner_instructions: Vec<Instruction>,
}

/// One entry of `getSignaturesForAddress`.
#[derive(Clone, Debug, PartialEq)]
pub struct SignatureRecord {
    pub signature: Signature,
    pub block_time: Option<i64>,
}

/// RPC capabilities of one Solana network, including the token-metadata
/// lookups for a mint handle.
#[automock]
#[async_trait]
pub trait SolanaRpcClient: Send + Sync {
    async fn transaction(&self, signature: &Signature) -> Result<Option<SolanaTransaction>>;
    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>>;
    async fn signatures_for_address(&self, address: &Pubkey) -> Result<Vec<SignatureRecord>>;
    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8>;
    async fn token_symbol(&self, mint: &Pubkey) -> Result<Option<String>>;
}

pub struct Client {
    inner: RpcClient,
}

impl Client {
    pub fn new(url: &Url) -> Self {
        Self {
            inner: RpcClient::new(url.as_str().to_owned()),
        }
    }
}

#[async_trait]
impl SolanaRpcClient for Client {
    async fn transaction(&self, signature: &Signature) -> Result<Option<SolanaTransaction>> {
        match self
            .inner
            .get_transaction(signature, UiTransactionEncoding::Json)
            .await
        {
            Ok(tx) => SolanaTransaction::from_encoded(*signature, tx).map(Some),
            Err(err) if is_not_found(&err) => Ok(None),
            Err(err) => Err(Report::new(err).change_context(RpcError::Request)),
        }
    }

    async fn account_data(&self, address: &Pubkey) -> Result<Option<Vec<u8>>> {
        let response = self
            .inner
            .get_account_with_commitment(address, CommitmentConfig::finalized())
            .await
            .map_err(Report::new)
            .change_context(RpcError::Request)?;

        Ok(response.value.map(|account| account.data))
    }

    async fn signatures_for_address(&self, address: &Pubkey) -> Result<Vec<SignatureRecord>> {
        let statuses = self
            .inner
            .get_signatures_for_address(address)
            .await
            .map_err(Report::new)
            .change_context(RpcError::Request)?;

        Ok(statuses
            .into_iter()
            .filter_map(|status| {
                let signature = Signature::from_str(&status.signature)
                    .inspect_err(|err| debug!(?err, "skipping unparsable signature"))
                    .ok()?;
                Some(SignatureRecord {
                    signature,
                    block_time: status.block_time,
                })
            })
            .collect())
    }

    async fn mint_decimals(&self, mint: &Pubkey) -> Result<u8> {
        let data = self
            .account_data(mint)
            .await?
            .ok_or_else(|| Report::new(RpcError::TokenLayout))
            .attach_printable("mint account does not exist")?;
        let state = StateWithExtensions::<Mint>::unpack(&data)
            .map_err(Report::new)
            .change_context(RpcError::TokenLayout)?;

        Ok(state.base.decimals)
    }

    async fn token_symbol(&self, mint: &Pubkey) -> Result<Option<String>> {
        let Some(data) = self.account_data(mint).await? else {
            return Ok(None);
        };
        let Ok(state) = StateWithExtensions::<Mint>::unpack(&data) else {
            return Ok(None);
        };

        // Legacy SPL mints carry no metadata extension; callers fall back to
        // the mint address.
        Ok(state
            .get_variable_len_extension::<TokenMetadata>()
            .map(|metadata| metadata.symbol)
            .ok())
    }
}

/// Lookup failures (unknown signature, pruned history) surface as RPC-level
/// errors rather than transport errors; those mean "not on this network".
fn is_not_found(err: &ClientError) -> bool {
    matches!(err.kind(), ClientErrorKind::RpcError(_))
}

impl SolanaTransaction {
    /// Unpacks the JSON-encoded RPC shape, resolving instruction account
    /// indices against the transaction's account keys. Inner instructions
    /// are flattened; classification only cares what was invoked, not by
    /// whom.
    fn from_encoded(
        signature: Signature,
        tx: EncodedConfirmedTransactionWithStatusMeta,
    ) -> Result<Self> {
        let block_time = tx.block_time;
        let meta = tx
            .transaction
            .meta
            .ok_or_else(|| Report::new(RpcError::Encoding))
            .attach_printable("transaction has no meta")?;

        let (account_keys, compiled) = match tx.transaction.transaction {
            EncodedTransaction::Json(ui_transaction) => match ui_transaction.message {
                UiMessage::Raw(raw_message) => {
                    let account_keys: Vec<Pubkey> = raw_message
                        .account_keys
                        .iter()
                        .filter_map(|key| Pubkey::from_str(key).ok())
                        .collect();
                    (account_keys, raw_message.instructions)
                }
                UiMessage::Parsed(_) => {
                    error!("RPC returned a parsed message, but a raw message was requested");
                    return Err(Report::new(RpcError::Encoding));
                }
            },
            _ => {
                error!("RPC returned a non-JSON encoded transaction");
                return Err(Report::new(RpcError::Encoding));
            }
        };

        let instructions = compiled
            .iter()
            .filter_map(|instruction| resolve_instruction(instruction, &account_keys))
            .collect();

        let inner_instructions = match meta.inner_instructions {
            OptionSerializer::Some(groups) => groups
                .iter()
                .flat_map(|group| group.instructions.iter())
                .filter_map(|instruction| match instruction {
                    UiInstruction::Compiled(compiled) => {
                        resolve_instruction(compiled, &account_keys)
                    }
                    UiInstruction::Parsed(_) => None,
                })
                .collect(),
            _ => vec![],
        };

        Ok(Self {
            signature,
            block_time,
            err: meta.err,
            instructions,
            inner_instructions,
        })
    }
}

fn resolve_instruction(
    instruction: &UiCompiledInstruction,
    account_keys: &[Pubkey],
) -> Option<Instruction> {
    let program_id = *account_keys.get(usize::from(instruction.program_id_index))?;
    let accounts = instruction
        .accounts
        .iter()
        .filter_map(|index| account_keys.get(usize::from(*index)).copied())
        .collect();
    let data = bs58::decode(&instruction.data).into_vec().ok()?;

    Some(Instruction {
        program_id,
        accounts,
        data,
    })
}
