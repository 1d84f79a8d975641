use bridge_primitives::MessageHash;
use error_stack::{Report, ResultExt};
use ethers_contract::EthEvent;
use ethers_core::types::{Filter, Log, TransactionReceipt, H256};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::ResolutionError;
use crate::evm::classifier::{self, EvmClassification};
use crate::evm::events::{
    self, FailedToRelayMessage, MessageInitiated, MessageRegistered, MessageSuccessfullyRelayed,
};
use crate::evm::json_rpc::{Erc20Client, EthereumClient};
use crate::evm::search::{self, SearchConfig};
use crate::evm::EvmNetwork;
use crate::types::{ExecuteTxDetails, InitialTxDetails, ValidationTxDetails};

type Result<T> = error_stack::Result<T, ResolutionError>;

/// What the destination side of Base knows about a message that originated
/// on Solana.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct EvmDelivery {
    pub validation: Option<ValidationTxDetails>,
    pub execution: Option<ExecuteTxDetails>,
    /// Handle of the outgoing-message account on Solana, taken from the
    /// registration event. Only needed to continue the backward search.
    pub outgoing_message_pubkey: Option<H256>,
}

/// The Base-side decoder: one instance per process, safe to share because
/// the discovered network identity is threaded through every call instead of
/// being stored.
pub struct EvmDecoder<C> {
    mainnet: C,
    sepolia: C,
    search: SearchConfig,
}

impl<C> EvmDecoder<C>
where
    C: EthereumClient + Erc20Client + Send + Sync,
{
    pub fn new(mainnet: C, sepolia: C, search: SearchConfig) -> Self {
        Self {
            mainnet,
            sepolia,
            search,
        }
    }

    fn client(&self, network: EvmNetwork) -> &C {
        match network {
            EvmNetwork::Mainnet => &self.mainnet,
            EvmNetwork::Sepolia => &self.sepolia,
        }
    }

    /// Determines which bridge phase a Base transaction represents,
    /// discovering the network along the way.
    pub async fn classify_by_transaction(
        &self,
        tx_hash: H256,
    ) -> Result<(EvmNetwork, EvmClassification)> {
        let (network, receipt) = self.probe_receipt(tx_hash).await?;
        info!(network = ?network, tx_hash = %format!("{tx_hash:#x}"), "classifying Base transaction");

        let classification = classifier::classify(self.client(network), network, &receipt).await?;
        Ok((network, classification))
    }

    /// Two-candidate probe: the receipt lookup itself decides which network
    /// the transaction lives on.
    async fn probe_receipt(&self, tx_hash: H256) -> Result<(EvmNetwork, TransactionReceipt)> {
        let mut upstream_failure = None;

        for network in EvmNetwork::PROBE_ORDER {
            match self.client(network).transaction_receipt(tx_hash).await {
                Ok(Some(receipt)) => return Ok((network, receipt)),
                Ok(None) => debug!(network = ?network, "transaction not on this network"),
                Err(err) => {
                    debug!(network = ?network, "receipt probe failed");
                    upstream_failure = Some(err);
                }
            }
        }

        match upstream_failure {
            Some(err) => Err(err.change_context(ResolutionError::UpstreamUnavailable)),
            None => Err(Report::new(ResolutionError::TransactionNotRecognized)
                .attach_printable("transaction not found on any candidate network")),
        }
    }

    /// Finds the validation and execution of a message that originated on
    /// Solana. The execution-failure search runs only as a fallback once the
    /// success search came back empty.
    pub async fn resolve_forward(
        &self,
        message_hash: MessageHash,
        network: EvmNetwork,
        min_timestamp: Option<u64>,
    ) -> Result<EvmDelivery> {
        let client = self.client(network);
        let from_block = search::start_block(client, network, min_timestamp).await?;
        let topic = H256::from(message_hash.to_fixed_bytes());

        let validation = self.find_validation(network, topic, from_block).await?;
        let execution = self.find_execution(network, topic, from_block).await?;

        if validation.is_none() && execution.is_none() {
            return Err(Report::new(ResolutionError::CorrelationNotFound)
                .attach_printable("message has not reached Base yet"));
        }

        let outgoing_message_pubkey = validation.as_ref().map(|(_, pubkey)| *pubkey);
        Ok(EvmDelivery {
            validation: validation.map(|(details, _)| details),
            execution,
            outgoing_message_pubkey,
        })
    }

    /// Finds and hydrates the Base transaction that initiated a message
    /// later settled on Solana.
    pub async fn resolve_backward(
        &self,
        message_hash: MessageHash,
        network: EvmNetwork,
    ) -> Result<InitialTxDetails> {
        let client = self.client(network);
        let topic = H256::from(message_hash.to_fixed_bytes());
        let filter = Filter::new()
            .address(network.bridge_address())
            .topic0(MessageInitiated::signature())
            .topic1(topic);

        let logs =
            search::search_logs(client, filter, network.deployment_block(), &self.search).await?;
        let Some(log) = logs.first() else {
            return Err(Report::new(ResolutionError::CorrelationNotFound)
                .attach_printable("no initiation event for the message hash"));
        };

        let receipt = self.receipt_behind_log(network, log).await?;
        classifier::initiation_details(client, network, &receipt).await
    }

    async fn find_validation(
        &self,
        network: EvmNetwork,
        topic: H256,
        from_block: u64,
    ) -> Result<Option<(ValidationTxDetails, H256)>> {
        let client = self.client(network);
        let filter = Filter::new()
            .address(network.validator_address())
            .topic0(MessageRegistered::signature())
            .topic1(topic);

        let logs = search::search_logs(client, filter, from_block, &self.search).await?;
        let Some(log) = logs.first() else {
            return Ok(None);
        };

        let event: MessageRegistered = events::decode(log)?;
        let details = self.tx_details_behind_log(network, log).await?;
        Ok(Some((details, event.outgoing_message_pubkey)))
    }

    async fn find_execution(
        &self,
        network: EvmNetwork,
        topic: H256,
        from_block: u64,
    ) -> Result<Option<ExecuteTxDetails>> {
        let client = self.client(network);
        let success = Filter::new()
            .address(network.bridge_address())
            .topic0(MessageSuccessfullyRelayed::signature())
            .topic2(topic);

        let logs = search::search_logs(client, success, from_block, &self.search).await?;
        if let Some(log) = logs.first() {
            let receipt = self.receipt_behind_log(network, log).await?;
            return classifier::execution_details(client, network, &receipt)
                .await
                .map(Some);
        }

        let failed = Filter::new()
            .address(network.bridge_address())
            .topic0(FailedToRelayMessage::signature())
            .topic2(topic);

        let logs = search::search_logs(client, failed, from_block, &self.search).await?;
        Ok(logs.first().map(|log| {
            ExecuteTxDetails::failed(
                network.chain_name(),
                log.transaction_hash.map(|hash| format!("{hash:#x}")),
            )
        }))
    }

    async fn receipt_behind_log(
        &self,
        network: EvmNetwork,
        log: &Log,
    ) -> Result<TransactionReceipt> {
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| Report::new(ResolutionError::DecodeMismatch))
            .attach_printable("log carries no transaction hash")?;

        self.client(network)
            .transaction_receipt(tx_hash)
            .await
            .change_context(ResolutionError::UpstreamUnavailable)?
            .ok_or_else(|| Report::new(ResolutionError::UpstreamUnavailable))
            .attach_printable("receipt behind a returned log is unavailable")
    }

    async fn tx_details_behind_log(
        &self,
        network: EvmNetwork,
        log: &Log,
    ) -> Result<ValidationTxDetails> {
        let tx_hash = log
            .transaction_hash
            .ok_or_else(|| Report::new(ResolutionError::DecodeMismatch))
            .attach_printable("log carries no transaction hash")?;
        let block_hash = log
            .block_hash
            .ok_or_else(|| Report::new(ResolutionError::DecodeMismatch))
            .attach_printable("log carries no block hash")?;

        let block = self
            .client(network)
            .block_by_hash(block_hash)
            .await
            .change_context(ResolutionError::UpstreamUnavailable)?
            .ok_or_else(|| Report::new(ResolutionError::UpstreamUnavailable))
            .attach_printable("block behind a returned log is unavailable")?;

        Ok(ValidationTxDetails {
            chain: network.chain_name(),
            transaction_hash: format!("{tx_hash:#x}"),
            timestamp: block.timestamp.as_u64(),
        })
    }
}

#[cfg(test)]
mod tests {
    use ethers_core::types::{Address, U256, U64};

    use super::*;
    use crate::evm::test_utils::{
        block_with_timestamp, failed_relay_log, message_init_log, message_registered_log,
        receipt_with_logs, relayed_log, transfer_finalized_log, transfer_init_log, MockEvmRpc,
    };
    use crate::types::ExecutionStatus;

    fn msg_hash() -> MessageHash {
        MessageHash::from([0x42u8; 32])
    }

    fn topic() -> H256 {
        H256::from(msg_hash().to_fixed_bytes())
    }

    fn current_height() -> U64 {
        U64::from(EvmNetwork::Mainnet.deployment_block().saturating_add(5_000))
    }

    fn filter_topic0(filter: &Filter) -> Option<H256> {
        filter.topics[0]
            .as_ref()
            .and_then(|topic| match topic {
                ethers_core::types::ValueOrArray::Value(Some(hash)) => Some(*hash),
                _ => None,
            })
    }

    fn decoder(client: MockEvmRpc) -> EvmDecoder<MockEvmRpc> {
        // Classification probes never reach sepolia in these tests; resolve
        // calls address mainnet directly.
        EvmDecoder::new(client, MockEvmRpc::new(), SearchConfig::default())
    }

    #[tokio::test]
    async fn probe_falls_back_to_the_test_network() {
        let tx_hash = H256::repeat_byte(0x99);
        let network = EvmNetwork::Sepolia;

        let mut mainnet = MockEvmRpc::new();
        mainnet
            .expect_transaction_receipt()
            .times(1)
            .returning(|_| Ok(None));

        let mut sepolia = MockEvmRpc::new();
        sepolia.expect_transaction_receipt().times(1).returning(move |_| {
            Ok(Some(receipt_with_logs(
                Address::repeat_byte(0x07),
                vec![
                    message_init_log(network, topic()),
                    transfer_init_log(network, Address::repeat_byte(0x10), U256::from(2_000_000u64)),
                ],
            )))
        });
        sepolia
            .expect_block_by_hash()
            .returning(|_| Ok(Some(block_with_timestamp(1_700_000_000))));
        sepolia
            .expect_token_symbol()
            .returning(|_| Ok("USDC".to_owned()));
        sepolia.expect_token_decimals().returning(|_| Ok(6));

        let decoder = EvmDecoder::new(mainnet, sepolia, SearchConfig::default());
        let (discovered, classification) =
            decoder.classify_by_transaction(tx_hash).await.unwrap();

        assert_eq!(discovered, EvmNetwork::Sepolia);
        match classification {
            EvmClassification::Initiation {
                details,
                message_hash,
            } => {
                assert_eq!(message_hash, msg_hash());
                assert_eq!(details.amount, "2");
                assert_eq!(details.asset, "USDC");
                assert_eq!(details.chain, crate::types::ChainName::BaseSepolia);
            }
            other => panic!("expected initiation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn probe_reports_nothing_found_as_not_recognized() {
        let mut mainnet = MockEvmRpc::new();
        mainnet.expect_transaction_receipt().returning(|_| Ok(None));
        let mut sepolia = MockEvmRpc::new();
        sepolia.expect_transaction_receipt().returning(|_| Ok(None));

        let decoder = EvmDecoder::new(mainnet, sepolia, SearchConfig::default());
        let err = decoder
            .classify_by_transaction(H256::zero())
            .await
            .unwrap_err();

        assert_eq!(
            *err.current_context(),
            ResolutionError::TransactionNotRecognized
        );
    }

    #[tokio::test]
    async fn forward_resolution_reports_validation_and_success_execution() {
        let network = EvmNetwork::Mainnet;
        let pubkey = H256::repeat_byte(0x77);

        let mut client = MockEvmRpc::new();
        client
            .expect_block_number()
            .returning(|| Ok(current_height()));
        client.expect_logs().returning(move |filter| {
            let topic0 = filter_topic0(filter).unwrap();
            if topic0 == MessageRegistered::signature() {
                Ok(vec![message_registered_log(network, topic(), pubkey)])
            } else if topic0 == MessageSuccessfullyRelayed::signature() {
                Ok(vec![relayed_log(network, topic())])
            } else {
                panic!("failure search must not run when a success log exists");
            }
        });
        client
            .expect_block_by_hash()
            .returning(|_| Ok(Some(block_with_timestamp(1_700_000_100))));
        client.expect_transaction_receipt().returning(move |_| {
            Ok(Some(receipt_with_logs(
                Address::repeat_byte(0x08),
                vec![transfer_finalized_log(
                    network,
                    Address::repeat_byte(0x10),
                    Address::repeat_byte(0x21),
                    U256::from(1_230_000u64),
                )],
            )))
        });
        client
            .expect_token_symbol()
            .returning(|_| Ok("USDC".to_owned()));
        client.expect_token_decimals().returning(|_| Ok(6));

        let delivery = decoder(client)
            .resolve_forward(msg_hash(), network, None)
            .await
            .unwrap();

        let validation = delivery.validation.unwrap();
        assert_eq!(validation.timestamp, 1_700_000_100);
        assert_eq!(delivery.outgoing_message_pubkey, Some(pubkey));

        let execution = delivery.execution.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Success);
        assert_eq!(execution.amount, "1.23");
        assert_eq!(
            execution.receiver_address.as_deref(),
            Some(format!("{:#x}", Address::repeat_byte(0x21)).as_str())
        );
    }

    #[tokio::test]
    async fn forward_resolution_falls_back_to_the_failure_search() {
        let network = EvmNetwork::Mainnet;

        let mut client = MockEvmRpc::new();
        client
            .expect_block_number()
            .returning(|| Ok(current_height()));
        client.expect_logs().returning(move |filter| {
            let topic0 = filter_topic0(filter).unwrap();
            if topic0 == FailedToRelayMessage::signature() {
                Ok(vec![failed_relay_log(network, topic())])
            } else {
                Ok(vec![])
            }
        });

        let delivery = decoder(client)
            .resolve_forward(msg_hash(), network, None)
            .await
            .unwrap();

        assert!(delivery.validation.is_none());
        let execution = delivery.execution.unwrap();
        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.amount, "0");
        assert!(execution.receiver_address.is_none());
        assert!(execution.transaction_hash.is_some());
    }

    #[tokio::test]
    async fn forward_resolution_with_no_hits_is_pending() {
        let mut client = MockEvmRpc::new();
        client
            .expect_block_number()
            .returning(|| Ok(current_height()));
        client.expect_logs().returning(|_| Ok(vec![]));

        let err = decoder(client)
            .resolve_forward(msg_hash(), EvmNetwork::Mainnet, None)
            .await
            .unwrap_err();

        assert_eq!(*err.current_context(), ResolutionError::CorrelationNotFound);
    }

    #[tokio::test]
    async fn backward_resolution_hydrates_the_initiation() {
        let network = EvmNetwork::Mainnet;
        let init_tx = H256::repeat_byte(0xd1);

        let mut client = MockEvmRpc::new();
        client
            .expect_block_number()
            .returning(|| Ok(current_height()));
        client.expect_logs().returning(move |_| {
            let mut log = message_init_log(network, topic());
            log.transaction_hash = Some(init_tx);
            Ok(vec![log])
        });
        client
            .expect_transaction_receipt()
            .withf(move |hash| *hash == init_tx)
            .returning(move |_| {
                Ok(Some(receipt_with_logs(
                    Address::repeat_byte(0x07),
                    vec![
                        message_init_log(network, topic()),
                        transfer_init_log(
                            network,
                            Address::repeat_byte(0x10),
                            U256::from(5_000_000u64),
                        ),
                    ],
                )))
            });
        client
            .expect_block_by_hash()
            .returning(|_| Ok(Some(block_with_timestamp(1_700_000_000))));
        client
            .expect_token_symbol()
            .returning(|_| Ok("USDC".to_owned()));
        client.expect_token_decimals().returning(|_| Ok(6));

        let details = decoder(client)
            .resolve_backward(msg_hash(), network)
            .await
            .unwrap();

        assert_eq!(details.amount, "5");
        assert_eq!(details.asset, "USDC");
        assert_eq!(details.transaction_hash, format!("{:#x}", H256::repeat_byte(0xaa)));
    }

    #[tokio::test]
    async fn backward_resolution_without_initiation_is_not_found() {
        let mut client = MockEvmRpc::new();
        client
            .expect_block_number()
            .returning(|| Ok(current_height()));
        client.expect_logs().returning(|_| Ok(vec![]));

        let err = decoder(client)
            .resolve_backward(msg_hash(), EvmNetwork::Mainnet)
            .await
            .unwrap_err();

        assert_eq!(*err.current_context(), ResolutionError::CorrelationNotFound);
    }
}
