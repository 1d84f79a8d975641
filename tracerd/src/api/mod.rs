use std::net::SocketAddrV4;
use std::str::FromStr;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use bridge_primitives::MessageHash;
use error_stack::{Report, ResultExt};
use ethers_core::types::H256;
use ethers_providers::Http;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::error::ResolutionError;
use crate::evm::classifier::EvmClassification;
use crate::evm::decoder::{EvmDecoder, EvmDelivery};
use crate::evm::json_rpc;
use crate::evm::EvmNetwork;
use crate::lifecycle::BridgeLifecycle;
use crate::solana::decoder::{SolanaClassification, SolanaDecoder, SolanaDelivery};
use crate::solana::SolanaNetwork;
use crate::types::{InitialTxDetails, TxContainer};

#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to start the api server")]
    Start,
    #[error("api server failed unexpectedly")]
    WhileRunning,
}

pub type EvmRpc = json_rpc::Client<Http>;
pub type SolanaRpc = crate::solana::Client;

type Resolved<T> = error_stack::Result<T, ResolutionError>;
type ApiResult<T> = std::result::Result<Json<T>, (StatusCode, Json<ErrorBody>)>;

/// Shared handles to the two chain decoders. Handlers stay thin: parse
/// parameters, call one engine operation, serialize the outcome.
#[derive(Clone)]
pub struct AppState {
    evm: Arc<EvmDecoder<EvmRpc>>,
    solana: Arc<SolanaDecoder<SolanaRpc>>,
}

pub struct Server {
    bind_address: SocketAddrV4,
    state: AppState,
}

impl Server {
    pub fn new(
        bind_address: SocketAddrV4,
        evm: EvmDecoder<EvmRpc>,
        solana: SolanaDecoder<SolanaRpc>,
    ) -> Self {
        Self {
            bind_address,
            state: AppState {
                evm: Arc::new(evm),
                solana: Arc::new(solana),
            },
        }
    }

    pub fn router(&self) -> Router {
        Router::new()
            .route("/status", get(status))
            .route("/v1/tx/:reference", get(resolve_reference))
            .route("/v1/base/message", get(base_message))
            .route("/v1/base/initiation", get(base_initiation))
            .route("/v1/solana/delivery", get(solana_delivery))
            .route("/v1/solana/initiation", get(solana_initiation))
            .with_state(self.state.clone())
    }

    pub async fn run(self, cancel: CancellationToken) -> error_stack::Result<(), Error> {
        let listener = tokio::net::TcpListener::bind(self.bind_address)
            .await
            .change_context(Error::Start)?;

        info!(
            address = self.bind_address.to_string(),
            "starting api server"
        );

        let app = self.router();
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
                info!("exiting api server");
            })
            .await
            .change_context(Error::WhileRunning)
    }
}

/// A single opaque reference: its shape decides which chain classifies it.
#[derive(Debug, Clone, Copy, PartialEq)]
enum TxReference {
    Evm(H256),
    Solana(Signature),
}

fn parse_reference(raw: &str) -> Option<TxReference> {
    if let Some(digits) = raw.strip_prefix("0x") {
        if digits.len() == 64 {
            return raw.parse().ok().map(TxReference::Evm);
        }
        return None;
    }
    Signature::from_str(raw).ok().map(TxReference::Solana)
}

/// The Solana network a Base network bridges to, and vice versa.
fn solana_counterpart(network: EvmNetwork) -> SolanaNetwork {
    match network {
        EvmNetwork::Mainnet => SolanaNetwork::Mainnet,
        EvmNetwork::Sepolia => SolanaNetwork::Devnet,
    }
}

fn evm_counterpart(network: SolanaNetwork) -> EvmNetwork {
    match network {
        SolanaNetwork::Mainnet => EvmNetwork::Mainnet,
        SolanaNetwork::Devnet => EvmNetwork::Sepolia,
    }
}

/// "Nothing found yet" is a presentable outcome for the counterpart chain,
/// not a failure of the whole resolution.
fn pending_as_default<T: Default>(result: Resolved<T>) -> Resolved<T> {
    match result {
        Err(report)
            if matches!(
                report.current_context(),
                ResolutionError::CorrelationNotFound
            ) =>
        {
            Ok(T::default())
        }
        other => other,
    }
}

#[derive(Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ResolveResponse {
    Lifecycle(BridgeLifecycle),
    Container(TxContainer),
    OutputRoot { account: String },
}

#[derive(Serialize)]
pub struct SolanaInitiationResponse {
    pub message_hash: MessageHash,
    pub initiation: InitialTxDetails,
}

#[derive(Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
}

#[derive(Serialize, Deserialize)]
struct Status {
    ok: bool,
}

impl AppState {
    /// Classification on Base, then the counterpart walk on Solana.
    async fn resolve_from_evm(&self, tx_hash: H256) -> Resolved<ResolveResponse> {
        let (network, classification) = self.evm.classify_by_transaction(tx_hash).await?;

        match classification {
            EvmClassification::Initiation {
                details,
                message_hash,
            } => {
                let delivery = pending_as_default(
                    self.solana
                        .resolve_forward(message_hash, solana_counterpart(network))
                        .await,
                )?;

                Ok(ResolveResponse::Lifecycle(BridgeLifecycle::assemble(
                    Some(message_hash),
                    Some(details),
                    delivery.validation,
                    delivery.execution,
                )))
            }
            EvmClassification::Container(container) => Ok(ResolveResponse::Container(container)),
        }
    }

    /// Classification on Solana, then the counterpart walk on Base.
    async fn resolve_from_solana(&self, signature: Signature) -> Resolved<ResolveResponse> {
        let (network, classification) = self.solana.classify_by_transaction(&signature).await?;

        match classification {
            SolanaClassification::Initiation {
                details,
                message_hash,
            } => {
                let delivery = pending_as_default(
                    self.evm
                        .resolve_forward(message_hash, evm_counterpart(network), None)
                        .await,
                )?;

                Ok(ResolveResponse::Lifecycle(BridgeLifecycle::assemble(
                    Some(message_hash),
                    Some(details),
                    delivery.validation,
                    delivery.execution,
                )))
            }
            SolanaClassification::Delivery {
                delivery,
                message_hash,
            } => {
                let initiation = match message_hash {
                    Some(hash) => {
                        match self
                            .evm
                            .resolve_backward(hash, evm_counterpart(network))
                            .await
                        {
                            Ok(details) => Some(details),
                            Err(report)
                                if matches!(
                                    report.current_context(),
                                    ResolutionError::CorrelationNotFound
                                ) =>
                            {
                                None
                            }
                            Err(report) => return Err(report),
                        }
                    }
                    None => None,
                };

                Ok(ResolveResponse::Lifecycle(BridgeLifecycle::assemble(
                    message_hash,
                    initiation,
                    delivery.validation,
                    delivery.execution,
                )))
            }
            SolanaClassification::OutputRoot { account } => {
                Ok(ResolveResponse::OutputRoot { account })
            }
        }
    }
}

async fn status() -> (StatusCode, Json<Status>) {
    (StatusCode::OK, Json(Status { ok: true }))
}

async fn resolve_reference(
    State(state): State<AppState>,
    Path(reference): Path<String>,
) -> ApiResult<ResolveResponse> {
    let Some(reference) = parse_reference(&reference) else {
        return Err(bad_request(
            "reference is neither an EVM transaction hash nor a Solana signature",
        ));
    };

    let result = match reference {
        TxReference::Evm(tx_hash) => state.resolve_from_evm(tx_hash).await,
        TxReference::Solana(signature) => state.resolve_from_solana(signature).await,
    };

    result.map(Json).map_err(error_response)
}

#[derive(Deserialize)]
struct BaseMessageQuery {
    msg_hash: MessageHash,
    network: EvmNetwork,
    min_timestamp: Option<u64>,
}

async fn base_message(
    State(state): State<AppState>,
    Query(query): Query<BaseMessageQuery>,
) -> ApiResult<EvmDelivery> {
    state
        .evm
        .resolve_forward(query.msg_hash, query.network, query.min_timestamp)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct BaseInitiationQuery {
    msg_hash: MessageHash,
    network: EvmNetwork,
}

async fn base_initiation(
    State(state): State<AppState>,
    Query(query): Query<BaseInitiationQuery>,
) -> ApiResult<InitialTxDetails> {
    state
        .evm
        .resolve_backward(query.msg_hash, query.network)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct SolanaDeliveryQuery {
    msg_hash: MessageHash,
    network: SolanaNetwork,
}

async fn solana_delivery(
    State(state): State<AppState>,
    Query(query): Query<SolanaDeliveryQuery>,
) -> ApiResult<SolanaDelivery> {
    state
        .solana
        .resolve_forward(query.msg_hash, query.network)
        .await
        .map(Json)
        .map_err(error_response)
}

#[derive(Deserialize)]
struct SolanaInitiationQuery {
    pubkey: String,
    network: SolanaNetwork,
}

async fn solana_initiation(
    State(state): State<AppState>,
    Query(query): Query<SolanaInitiationQuery>,
) -> ApiResult<SolanaInitiationResponse> {
    let Ok(pubkey) = Pubkey::from_str(&query.pubkey) else {
        return Err(bad_request("pubkey is not a valid base58 account address"));
    };

    state
        .solana
        .resolve_backward(&pubkey, query.network)
        .await
        .map(|(initiation, message_hash)| {
            Json(SolanaInitiationResponse {
                message_hash,
                initiation,
            })
        })
        .map_err(error_response)
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorBody>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorBody {
            error: message.to_owned(),
        }),
    )
}

fn error_response(report: Report<ResolutionError>) -> (StatusCode, Json<ErrorBody>) {
    let context = report.current_context();
    let status = match context {
        ResolutionError::TransactionNotRecognized | ResolutionError::CorrelationNotFound => {
            StatusCode::NOT_FOUND
        }
        ResolutionError::AmbiguousClassification | ResolutionError::DecodeMismatch => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        ResolutionError::UpstreamUnavailable => StatusCode::BAD_GATEWAY,
    };

    error!(?report, "resolution failed");
    (
        status,
        Json(ErrorBody {
            error: context.to_string(),
        }),
    )
}
