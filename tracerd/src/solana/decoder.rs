use bridge_primitives::{format_units, MessageHash};
use error_stack::{Report, ResultExt};
use serde::Serialize;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use tracing::{debug, info};

use crate::error::ResolutionError;
use crate::msg_hash;
use crate::solana::accounts::{
    decode_account, IncomingMessage, IncomingPayload, IncomingTransfer, OutgoingMessage,
    OutgoingPayload, INCOMING_MESSAGE_DISCRIMINATOR, OUTGOING_MESSAGE_DISCRIMINATOR,
};
use crate::solana::classifier::{self, DeliveryKind, IdentifiedTx};
use crate::solana::instruction;
use crate::solana::{
    SignatureRecord, SolanaNetwork, SolanaRpcClient, SolanaTransaction, SOL_DECIMALS, SOL_SENTINEL,
};
use crate::types::{ExecuteTxDetails, ExecutionStatus, InitialTxDetails, ValidationTxDetails};

type Result<T> = error_stack::Result<T, ResolutionError>;

/// Seed of the incoming-message PDA under the bridge program.
const INCOMING_MESSAGE_SEED: &[u8] = b"incoming_message";

/// What the destination side of Solana knows about a message that
/// originated on Base.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SolanaDelivery {
    pub validation: Option<ValidationTxDetails>,
    pub execution: Option<ExecuteTxDetails>,
}

/// What a Solana transaction turned out to be.
#[derive(Debug, Clone, PartialEq)]
pub enum SolanaClassification {
    /// The transaction started a transfer towards Base.
    Initiation {
        details: InitialTxDetails,
        message_hash: MessageHash,
    },
    /// A destination-side proof or relay of a message coming from Base.
    Delivery {
        delivery: SolanaDelivery,
        message_hash: Option<MessageHash>,
    },
    /// A state-root publication; bridge-owned but not part of any single
    /// transfer.
    OutputRoot { account: String },
}

/// The Solana-side decoder; stateless per request, network identity is an
/// explicit value.
pub struct SolanaDecoder<C> {
    mainnet: C,
    devnet: C,
}

impl<C> SolanaDecoder<C>
where
    C: SolanaRpcClient,
{
    pub fn new(mainnet: C, devnet: C) -> Self {
        Self { mainnet, devnet }
    }

    fn client(&self, network: SolanaNetwork) -> &C {
        match network {
            SolanaNetwork::Mainnet => &self.mainnet,
            SolanaNetwork::Devnet => &self.devnet,
        }
    }

    /// Determines which bridge phase a Solana transaction represents,
    /// discovering the network along the way.
    pub async fn classify_by_transaction(
        &self,
        signature: &Signature,
    ) -> Result<(SolanaNetwork, SolanaClassification)> {
        let (network, tx) = self.probe_transaction(signature).await?;
        info!(network = ?network, signature = %signature, "classifying Solana transaction");

        let client = self.client(network);
        let classification = match classifier::identify(client, &tx).await? {
            IdentifiedTx::OutgoingMessage { data, .. } => {
                let message: OutgoingMessage =
                    decode_account(&OUTGOING_MESSAGE_DISCRIMINATOR, &data)?;
                let details = self
                    .initiation_details(network, &message, &tx.signature, tx.block_time)
                    .await?;
                SolanaClassification::Initiation {
                    details,
                    message_hash: msg_hash::derive(&message)?,
                }
            }
            IdentifiedTx::IncomingMessage { address, data } => {
                let message: IncomingMessage =
                    decode_account(&INCOMING_MESSAGE_DISCRIMINATOR, &data)?;
                let delivery = self.delivery_details(network, &address, &message).await?;
                SolanaClassification::Delivery {
                    delivery,
                    message_hash: instruction::extract_message_hash(&tx),
                }
            }
            IdentifiedTx::OutputRoot { address } => SolanaClassification::OutputRoot {
                account: address.to_string(),
            },
        };

        Ok((network, classification))
    }

    /// Finds the validation and execution of a message that originated on
    /// Base. The incoming-message account is not searched for: its address
    /// derives deterministically from the message hash.
    pub async fn resolve_forward(
        &self,
        message_hash: MessageHash,
        network: SolanaNetwork,
    ) -> Result<SolanaDelivery> {
        let (address, _) = Pubkey::find_program_address(
            &[INCOMING_MESSAGE_SEED, message_hash.as_bytes()],
            &network.bridge_program(),
        );

        let data = self
            .client(network)
            .account_data(&address)
            .await
            .change_context(ResolutionError::UpstreamUnavailable)?
            .ok_or_else(|| Report::new(ResolutionError::CorrelationNotFound))
            .attach_printable("message has not reached Solana yet")?;
        let message: IncomingMessage = decode_account(&INCOMING_MESSAGE_DISCRIMINATOR, &data)?;

        self.delivery_details(network, &address, &message).await
    }

    /// Hydrates the initiation behind an outgoing-message account handle
    /// (obtained out-of-band from the Base registration event).
    pub async fn resolve_backward(
        &self,
        outgoing_message: &Pubkey,
        network: SolanaNetwork,
    ) -> Result<(InitialTxDetails, MessageHash)> {
        let client = self.client(network);

        let data = client
            .account_data(outgoing_message)
            .await
            .change_context(ResolutionError::UpstreamUnavailable)?
            .ok_or_else(|| Report::new(ResolutionError::CorrelationNotFound))
            .attach_printable("outgoing message account does not exist")?;
        let message: OutgoingMessage = decode_account(&OUTGOING_MESSAGE_DISCRIMINATOR, &data)?;

        let records = client
            .signatures_for_address(outgoing_message)
            .await
            .change_context(ResolutionError::UpstreamUnavailable)?;
        let record = match records.as_slice() {
            [record] => record,
            _ => {
                return Err(Report::new(ResolutionError::DecodeMismatch).attach_printable(
                    format!(
                        "expected exactly one signature for an outgoing message, got {}",
                        records.len()
                    ),
                ))
            }
        };

        let details = self
            .initiation_details(network, &message, &record.signature, record.block_time)
            .await?;
        Ok((details, msg_hash::derive(&message)?))
    }

    async fn probe_transaction(
        &self,
        signature: &Signature,
    ) -> Result<(SolanaNetwork, SolanaTransaction)> {
        let mut upstream_failure = None;

        for network in SolanaNetwork::PROBE_ORDER {
            match self.client(network).transaction(signature).await {
                Ok(Some(tx)) => return Ok((network, tx)),
                Ok(None) => debug!(network = ?network, "transaction not on this network"),
                Err(err) => {
                    debug!(network = ?network, "transaction probe failed");
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

    /// Classifies every transaction touching the incoming-message account by
    /// its instruction discriminators. List position is not trusted: more
    /// than two signatures, or an unexpected order, must not misattribute
    /// the phases.
    async fn delivery_details(
        &self,
        network: SolanaNetwork,
        address: &Pubkey,
        message: &IncomingMessage,
    ) -> Result<SolanaDelivery> {
        let client = self.client(network);
        let records = client
            .signatures_for_address(address)
            .await
            .change_context(ResolutionError::UpstreamUnavailable)?;

        let mut validation = None;
        let mut execution = None;

        for record in &records {
            if validation.is_some() && execution.is_some() {
                break;
            }

            let Some(tx) = client
                .transaction(&record.signature)
                .await
                .change_context(ResolutionError::UpstreamUnavailable)?
            else {
                continue;
            };

            match classifier::delivery_kind(&tx) {
                Some(DeliveryKind::Validation) if validation.is_none() => {
                    validation = Some(ValidationTxDetails {
                        chain: network.chain_name(),
                        transaction_hash: record.signature.to_string(),
                        timestamp: unix_seconds(record.block_time),
                    });
                }
                Some(DeliveryKind::Execution) if execution.is_none() => {
                    execution = Some(if tx.err.is_some() {
                        ExecuteTxDetails::failed(
                            network.chain_name(),
                            Some(record.signature.to_string()),
                        )
                    } else {
                        self.execution_details(network, message, record).await?
                    });
                }
                _ => {}
            }
        }

        Ok(SolanaDelivery {
            validation,
            execution,
        })
    }

    async fn execution_details(
        &self,
        network: SolanaNetwork,
        message: &IncomingMessage,
        record: &SignatureRecord,
    ) -> Result<ExecuteTxDetails> {
        let IncomingPayload::Transfer(transfer) = &message.payload else {
            return Err(Report::new(ResolutionError::DecodeMismatch)
                .attach_printable("executed incoming message carries no transfer"));
        };

        let (amount, asset, receiver) = match transfer {
            IncomingTransfer::Sol { to, amount } => (
                format_units(&amount.to_string(), SOL_DECIMALS),
                "SOL".to_owned(),
                Pubkey::new_from_array(*to),
            ),
            IncomingTransfer::Spl {
                local_token,
                to,
                amount,
            }
            | IncomingTransfer::WrappedToken {
                local_token,
                to,
                amount,
            } => {
                let (amount, asset) = self
                    .token_amount(network, &Pubkey::new_from_array(*local_token), *amount)
                    .await?;
                (amount, asset, Pubkey::new_from_array(*to))
            }
        };

        Ok(ExecuteTxDetails {
            status: ExecutionStatus::Success,
            amount,
            asset,
            chain: network.chain_name(),
            receiver_address: Some(receiver.to_string()),
            transaction_hash: Some(record.signature.to_string()),
            timestamp: Some(unix_seconds(record.block_time)),
        })
    }

    async fn initiation_details(
        &self,
        network: SolanaNetwork,
        message: &OutgoingMessage,
        signature: &Signature,
        block_time: Option<i64>,
    ) -> Result<InitialTxDetails> {
        let (amount, asset) = match &message.payload {
            OutgoingPayload::Transfer(transfer) => {
                let mint = Pubkey::new_from_array(transfer.local_token);
                if mint.to_string() == SOL_SENTINEL {
                    (
                        format_units(&transfer.amount.to_string(), SOL_DECIMALS),
                        "SOL".to_owned(),
                    )
                } else {
                    self.token_amount(network, &mint, transfer.amount).await?
                }
            }
            // Pure calls move no asset.
            OutgoingPayload::Call(_) => ("0".to_owned(), String::new()),
        };

        Ok(InitialTxDetails {
            amount,
            asset,
            chain: network.chain_name(),
            sender_address: Pubkey::new_from_array(message.sender).to_string(),
            transaction_hash: signature.to_string(),
            timestamp: unix_seconds(block_time),
        })
    }

    /// Scales a raw amount by the mint's decimals; the symbol falls back to
    /// the mint address when the mint carries no metadata.
    async fn token_amount(
        &self,
        network: SolanaNetwork,
        mint: &Pubkey,
        amount: u64,
    ) -> Result<(String, String)> {
        let client = self.client(network);
        let (decimals, symbol) = futures::try_join!(
            async {
                client
                    .mint_decimals(mint)
                    .await
                    .change_context(ResolutionError::UpstreamUnavailable)
            },
            async {
                client
                    .token_symbol(mint)
                    .await
                    .change_context(ResolutionError::UpstreamUnavailable)
            },
        )?;

        Ok((
            format_units(&amount.to_string(), decimals),
            symbol.unwrap_or_else(|| mint.to_string()),
        ))
    }
}

fn unix_seconds(block_time: Option<i64>) -> u64 {
    block_time
        .and_then(|seconds| u64::try_from(seconds).ok())
        .unwrap_or_default()
}
