use bridge_primitives::{format_units, MessageHash};
use error_stack::{Report, ResultExt};
use ethers_core::types::{Address, Log, TransactionReceipt};
use tracing::debug;

use crate::error::ResolutionError;
use crate::evm::events::{
    self, MessageInitiated, MessageRegistered, MessageSuccessfullyRelayed, TransferFinalized,
    TransferInitialized,
};
use crate::evm::json_rpc::{Erc20Client, EthereumClient};
use crate::evm::{is_bridge_owned, EvmNetwork, ETH_DECIMALS, ETH_SENTINEL};
use crate::types::{
    ExecuteTxDetails, ExecutionStatus, InitialTxDetails, TxContainer, TxMessageRef,
};

type Result<T> = error_stack::Result<T, ResolutionError>;

/// What a Base transaction turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum EvmClassification {
    /// The transaction started a transfer towards Solana.
    Initiation {
        details: InitialTxDetails,
        message_hash: MessageHash,
    },
    /// A destination-side transaction validating and/or executing one or
    /// more messages coming from Solana.
    Container(TxContainer),
}

/// Per-receipt bridge event flags; one scan, every policy decision reads
/// from here.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct ReceiptFlags {
    pub bridge_owned: bool,
    pub validation: bool,
    pub execution: bool,
    pub message_init: bool,
    pub transfer_init: bool,
    pub transfer_finalized: bool,
}

pub fn scan(network: EvmNetwork, receipt: &TransactionReceipt) -> ReceiptFlags {
    let mut flags = ReceiptFlags::default();

    for log in &receipt.logs {
        flags.bridge_owned |= is_bridge_owned(network, log.address);
        flags.validation |= is_validation_log(network, log);
        flags.execution |= is_execution_log(network, log);
        flags.message_init |= is_message_init_log(network, log);
        flags.transfer_init |= is_transfer_init_log(network, log);
        flags.transfer_finalized |= is_transfer_finalized_log(network, log);
    }

    flags
}

/// Classifies a receipt already known to live on `network`.
///
/// A receipt showing an initiation together with a validation or execution
/// violates the bridge contract's invariants and is rejected rather than
/// silently picked apart.
pub async fn classify<C>(
    client: &C,
    network: EvmNetwork,
    receipt: &TransactionReceipt,
) -> Result<EvmClassification>
where
    C: EthereumClient + Erc20Client + Sync,
{
    let flags = scan(network, receipt);

    if !flags.bridge_owned {
        return Err(Report::new(ResolutionError::TransactionNotRecognized));
    }

    if flags.message_init && (flags.validation || flags.execution) {
        return Err(Report::new(ResolutionError::AmbiguousClassification)
            .attach_printable("receipt shows message initiation next to validation or execution"));
    }

    if flags.message_init {
        let message_hash = extract_message_hash(network, receipt)?;
        let details = initiation_details(client, network, receipt).await?;
        return Ok(EvmClassification::Initiation {
            details,
            message_hash,
        });
    }

    if flags.validation || flags.execution {
        return container(client, network, receipt).await.map(EvmClassification::Container);
    }

    debug!("bridge-owned log without a known event signature");
    Err(Report::new(ResolutionError::TransactionNotRecognized))
}

/// Pulls the correlation identifier out of whichever bridge log carries it.
pub fn extract_message_hash(network: EvmNetwork, receipt: &TransactionReceipt) -> Result<MessageHash> {
    for log in &receipt.logs {
        if is_validation_log(network, log) {
            let event: MessageRegistered = events::decode(log)?;
            return Ok(MessageHash::from(event.message_hash.to_fixed_bytes()));
        }
        if is_execution_log(network, log) {
            let event: MessageSuccessfullyRelayed = events::decode(log)?;
            return Ok(MessageHash::from(event.message_hash.to_fixed_bytes()));
        }
        if is_message_init_log(network, log) {
            let event: MessageInitiated = events::decode(log)?;
            return Ok(MessageHash::from(event.message_hash.to_fixed_bytes()));
        }
    }

    Err(Report::new(ResolutionError::DecodeMismatch)
        .attach_printable("no bridge log carries a message hash"))
}

/// Builds the immutable initiation record from a receipt whose
/// transfer-initialized log names the asset and amount.
pub async fn initiation_details<C>(
    client: &C,
    network: EvmNetwork,
    receipt: &TransactionReceipt,
) -> Result<InitialTxDetails>
where
    C: EthereumClient + Erc20Client + Sync,
{
    let log = receipt
        .logs
        .iter()
        .find(|log| is_transfer_init_log(network, log))
        .ok_or_else(|| Report::new(ResolutionError::DecodeMismatch))
        .attach_printable("initiation without a transfer-initialized log")?;
    let event: TransferInitialized = events::decode(log)?;

    let (timestamp, asset, decimals) =
        resolve_asset_context(client, receipt, event.local_token).await?;

    Ok(InitialTxDetails {
        amount: format_units(&event.amount.to_string(), decimals),
        asset,
        chain: network.chain_name(),
        sender_address: format!("{:#x}", receipt.from),
        transaction_hash: format!("{:#x}", receipt.transaction_hash),
        timestamp,
    })
}

/// Builds the execution record from the receipt of a successful relay.
pub async fn execution_details<C>(
    client: &C,
    network: EvmNetwork,
    receipt: &TransactionReceipt,
) -> Result<ExecuteTxDetails>
where
    C: EthereumClient + Erc20Client + Sync,
{
    let log = receipt
        .logs
        .iter()
        .find(|log| is_transfer_finalized_log(network, log))
        .ok_or_else(|| Report::new(ResolutionError::DecodeMismatch))
        .attach_printable("execution without a transfer-finalized log")?;
    let event: TransferFinalized = events::decode(log)?;

    let (timestamp, asset, decimals) =
        resolve_asset_context(client, receipt, event.local_token).await?;

    Ok(ExecuteTxDetails {
        status: ExecutionStatus::Success,
        amount: format_units(&event.amount.to_string(), decimals),
        asset,
        chain: network.chain_name(),
        receiver_address: Some(format!("{:#x}", event.to)),
        transaction_hash: Some(format!("{:#x}", receipt.transaction_hash)),
        timestamp: Some(timestamp),
    })
}

/// Fetches the receipt's block timestamp and, unless the token is the
/// native-asset sentinel, its symbol and decimals. The block and metadata
/// lookups are independent and run concurrently.
async fn resolve_asset_context<C>(
    client: &C,
    receipt: &TransactionReceipt,
    token: Address,
) -> Result<(u64, String, u8)>
where
    C: EthereumClient + Erc20Client + Sync,
{
    if format!("{token:#x}") == ETH_SENTINEL {
        let timestamp = block_timestamp(client, receipt).await?;
        return Ok((timestamp, "ETH".to_owned(), ETH_DECIMALS));
    }

    let (timestamp, symbol, decimals) = futures::try_join!(
        block_timestamp(client, receipt),
        async {
            client
                .token_symbol(token)
                .await
                .change_context(ResolutionError::UpstreamUnavailable)
        },
        async {
            client
                .token_decimals(token)
                .await
                .change_context(ResolutionError::UpstreamUnavailable)
        },
    )?;

    Ok((timestamp, symbol, decimals))
}

async fn block_timestamp<C>(client: &C, receipt: &TransactionReceipt) -> Result<u64>
where
    C: EthereumClient + Sync,
{
    let block_hash = receipt
        .block_hash
        .ok_or_else(|| Report::new(ResolutionError::DecodeMismatch))
        .attach_printable("receipt has no block hash")?;
    let block = client
        .block_by_hash(block_hash)
        .await
        .change_context(ResolutionError::UpstreamUnavailable)?
        .ok_or_else(|| Report::new(ResolutionError::UpstreamUnavailable))
        .attach_printable("block behind the receipt is unavailable")?;

    Ok(block.timestamp.as_u64())
}

/// Partitions every validation / execution log in the receipt into the
/// pre-validated and executed message lists, keeping log positions so
/// callers can order entries.
async fn container<C>(
    client: &C,
    network: EvmNetwork,
    receipt: &TransactionReceipt,
) -> Result<TxContainer>
where
    C: EthereumClient + Sync,
{
    let timestamp = block_timestamp(client, receipt).await?;
    let mut pre_validated = Vec::new();
    let mut executed = Vec::new();

    for (position, log) in (0u64..).zip(receipt.logs.iter()) {
        let log_index = log.log_index.map_or(position, |index| index.as_u64());

        if is_validation_log(network, log) {
            let event: MessageRegistered = events::decode(log)?;
            pre_validated.push(TxMessageRef {
                message_hash: MessageHash::from(event.message_hash.to_fixed_bytes()),
                log_index,
            });
        } else if is_execution_log(network, log) {
            let event: MessageSuccessfullyRelayed = events::decode(log)?;
            executed.push(TxMessageRef {
                message_hash: MessageHash::from(event.message_hash.to_fixed_bytes()),
                log_index,
            });
        }
    }

    Ok(TxContainer {
        chain: network.chain_name(),
        transaction_hash: format!("{:#x}", receipt.transaction_hash),
        timestamp,
        pre_validated,
        executed,
    })
}

pub fn is_validation_log(network: EvmNetwork, log: &Log) -> bool {
    log.address == network.validator_address() && events::has_signature::<MessageRegistered>(log)
}

pub fn is_execution_log(network: EvmNetwork, log: &Log) -> bool {
    log.address == network.bridge_address()
        && events::has_signature::<MessageSuccessfullyRelayed>(log)
}

pub fn is_message_init_log(network: EvmNetwork, log: &Log) -> bool {
    log.address == network.bridge_address() && events::has_signature::<MessageInitiated>(log)
}

pub fn is_transfer_init_log(network: EvmNetwork, log: &Log) -> bool {
    log.address == network.bridge_address() && events::has_signature::<TransferInitialized>(log)
}

pub fn is_transfer_finalized_log(network: EvmNetwork, log: &Log) -> bool {
    log.address == network.bridge_address() && events::has_signature::<TransferFinalized>(log)
}
