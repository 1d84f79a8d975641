use error_stack::{Report, ResultExt};
use ethers_contract::{EthEvent, EthLogDecode};
use ethers_core::abi::RawLog;
use ethers_core::types::{Address, Bytes, Log, H256, U256};

use crate::error::ResolutionError;

/// Emitted by the transport contract when a message bound for the remote
/// ledger is created. Topic 1 carries the correlation identifier.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "MessageInitiated",
    abi = "MessageInitiated(bytes32,address,bytes)"
)]
pub struct MessageInitiated {
    #[ethevent(indexed)]
    pub message_hash: H256,
    pub sender: Address,
    pub message: Bytes,
}

/// Emitted by the validator contract once a remote message is attested on
/// this chain. Carries the handle of the remote outgoing-message account,
/// which the backward search needs.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "MessageRegistered",
    abi = "MessageRegistered(bytes32,bytes32)"
)]
pub struct MessageRegistered {
    #[ethevent(indexed)]
    pub message_hash: H256,
    pub outgoing_message_pubkey: H256,
}

/// Emitted by the transport contract when a registered message is relayed
/// successfully. The correlation identifier sits in topic 2.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "MessageSuccessfullyRelayed",
    abi = "MessageSuccessfullyRelayed(address,bytes32)"
)]
pub struct MessageSuccessfullyRelayed {
    #[ethevent(indexed)]
    pub relayer: Address,
    #[ethevent(indexed)]
    pub message_hash: H256,
}

/// Emitted when a relay attempt reverted. Terminal for the message; no
/// amount or receiver is exposed.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "FailedToRelayMessage",
    abi = "FailedToRelayMessage(address,bytes32)"
)]
pub struct FailedToRelayMessage {
    #[ethevent(indexed)]
    pub relayer: Address,
    #[ethevent(indexed)]
    pub message_hash: H256,
}

/// Token movement attached to an initiation on this chain.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "TransferInitialized",
    abi = "TransferInitialized(address,bytes32,bytes32,uint256)"
)]
pub struct TransferInitialized {
    pub local_token: Address,
    pub remote_token: H256,
    pub to: H256,
    pub amount: U256,
}

/// Token movement attached to an execution on this chain.
#[derive(Clone, Debug, PartialEq, EthEvent)]
#[ethevent(
    name = "TransferFinalized",
    abi = "TransferFinalized(address,bytes32,address,uint256)"
)]
pub struct TransferFinalized {
    pub local_token: Address,
    pub remote_token: H256,
    pub to: Address,
    pub amount: U256,
}

/// True when the log's first topic is the signature of event `E`.
pub fn has_signature<E: EthEvent>(log: &Log) -> bool {
    log.topics.first() == Some(&E::signature())
}

/// Decodes a log into its statically declared event type. Decoding happens
/// once, here; downstream code only ever sees the typed event.
pub fn decode<E: EthLogDecode>(log: &Log) -> error_stack::Result<E, ResolutionError> {
    E::decode_log(&RawLog::from(log.clone()))
        .map_err(Report::new)
        .change_context(ResolutionError::DecodeMismatch)
}
