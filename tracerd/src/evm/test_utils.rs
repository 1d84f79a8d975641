use async_trait::async_trait;
use ethers_contract::EthEvent;
use ethers_core::abi::{encode, Token};
use ethers_core::types::{
    Address, Block, Filter, Log, TransactionReceipt, H256, U256, U64,
};
use ethers_providers::ProviderError;
use mockall::mock;

use crate::evm::events::{
    FailedToRelayMessage, MessageInitiated, MessageRegistered, MessageSuccessfullyRelayed,
    TransferFinalized, TransferInitialized,
};
use crate::evm::json_rpc::{Erc20Client, EthereumClient};
use crate::evm::EvmNetwork;

mock! {
    pub EvmRpc {}

    #[async_trait]
    impl EthereumClient for EvmRpc {
        async fn block_number(&self) -> error_stack::Result<U64, ProviderError>;
        async fn latest_block(&self) -> error_stack::Result<Block<H256>, ProviderError>;
        async fn block_by_hash(
            &self,
            hash: H256,
        ) -> error_stack::Result<Option<Block<H256>>, ProviderError>;
        async fn transaction_receipt(
            &self,
            hash: H256,
        ) -> error_stack::Result<Option<TransactionReceipt>, ProviderError>;
        async fn logs(&self, filter: &Filter) -> error_stack::Result<Vec<Log>, ProviderError>;
    }

    #[async_trait]
    impl Erc20Client for EvmRpc {
        async fn token_symbol(&self, token: Address) -> error_stack::Result<String, ProviderError>;
        async fn token_decimals(&self, token: Address) -> error_stack::Result<u8, ProviderError>;
    }
}

pub fn block_with_timestamp(timestamp: u64) -> Block<H256> {
    Block {
        number: Some(U64::from(1u64)),
        timestamp: timestamp.into(),
        ..Block::default()
    }
}

pub fn receipt_with_logs(sender: Address, logs: Vec<Log>) -> TransactionReceipt {
    TransactionReceipt {
        transaction_hash: H256::repeat_byte(0xaa),
        block_hash: Some(H256::repeat_byte(0xbb)),
        from: sender,
        logs,
        ..TransactionReceipt::default()
    }
}

pub fn message_init_log(network: EvmNetwork, message_hash: H256) -> Log {
    Log {
        address: network.bridge_address(),
        topics: vec![MessageInitiated::signature(), message_hash],
        data: encode(&[
            Token::Address(Address::repeat_byte(0x01)),
            Token::Bytes(vec![0xde, 0xad]),
        ])
        .into(),
        ..Log::default()
    }
}

pub fn message_registered_log(
    network: EvmNetwork,
    message_hash: H256,
    outgoing_message_pubkey: H256,
) -> Log {
    Log {
        address: network.validator_address(),
        topics: vec![MessageRegistered::signature(), message_hash],
        data: encode(&[Token::FixedBytes(
            outgoing_message_pubkey.as_bytes().to_vec(),
        )])
        .into(),
        transaction_hash: Some(H256::repeat_byte(0xcd)),
        block_hash: Some(H256::repeat_byte(0xbb)),
        ..Log::default()
    }
}

pub fn relayed_log(network: EvmNetwork, message_hash: H256) -> Log {
    Log {
        address: network.bridge_address(),
        topics: vec![
            MessageSuccessfullyRelayed::signature(),
            Address::repeat_byte(0x02).into(),
            message_hash,
        ],
        transaction_hash: Some(H256::repeat_byte(0xce)),
        ..Log::default()
    }
}

pub fn failed_relay_log(network: EvmNetwork, message_hash: H256) -> Log {
    Log {
        address: network.bridge_address(),
        topics: vec![
            FailedToRelayMessage::signature(),
            Address::repeat_byte(0x02).into(),
            message_hash,
        ],
        transaction_hash: Some(H256::repeat_byte(0xfa)),
        ..Log::default()
    }
}

pub fn transfer_init_log(network: EvmNetwork, local_token: Address, amount: U256) -> Log {
    Log {
        address: network.bridge_address(),
        topics: vec![TransferInitialized::signature()],
        data: encode(&[
            Token::Address(local_token),
            Token::FixedBytes(vec![0x22; 32]),
            Token::FixedBytes(vec![0x33; 32]),
            Token::Uint(amount),
        ])
        .into(),
        ..Log::default()
    }
}

pub fn transfer_finalized_log(
    network: EvmNetwork,
    local_token: Address,
    to: Address,
    amount: U256,
) -> Log {
    Log {
        address: network.bridge_address(),
        topics: vec![TransferFinalized::signature()],
        data: encode(&[
            Token::Address(local_token),
            Token::FixedBytes(vec![0x22; 32]),
            Token::Address(to),
            Token::Uint(amount),
        ])
        .into(),
        ..Log::default()
    }
}
