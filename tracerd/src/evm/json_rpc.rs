use async_trait::async_trait;
use error_stack::{Report, ResultExt};
use ethers_core::abi::{self, ParamType, Token};
use ethers_core::types::{
    Address, Block, BlockNumber, Bytes, Filter, Log, TransactionReceipt, TransactionRequest, H256,
    U64,
};
use ethers_core::utils::serialize;
use ethers_providers::{Http, JsonRpcClient, ProviderError};
use mockall::automock;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::url::Url;

type Result<T> = error_stack::Result<T, ProviderError>;

/// `symbol()` / `decimals()` selectors.
const SYMBOL_SELECTOR: [u8; 4] = [0x95, 0xd8, 0x9b, 0x41];
const DECIMALS_SELECTOR: [u8; 4] = [0x31, 0x3c, 0xe5, 0x67];

pub struct Client<P>
where
    P: JsonRpcClient,
{
    provider: P,
}

impl<P> Client<P>
where
    P: JsonRpcClient,
{
    pub fn new(provider: P) -> Self {
        Client { provider }
    }

    pub async fn request<T, R>(&self, method: &str, params: T) -> Result<R>
    where
        T: std::fmt::Debug + Serialize + Send + Sync,
        R: DeserializeOwned + Send,
    {
        self.provider
            .request(method, params)
            .await
            .map_err(Into::into)
            .map_err(Report::from)
    }
}

impl Client<Http> {
    pub fn new_http(url: &Url) -> Self {
        Client::new(Http::new(url.to_standard_url()))
    }
}

/// Receipt, block and log-range queries against one EVM network.
#[automock]
#[async_trait]
pub trait EthereumClient {
    async fn block_number(&self) -> Result<U64>;
    async fn latest_block(&self) -> Result<Block<H256>>;
    async fn block_by_hash(&self, hash: H256) -> Result<Option<Block<H256>>>;
    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>>;
    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>>;
}

/// Token-metadata lookups for an ERC-20 asset handle.
#[automock]
#[async_trait]
pub trait Erc20Client {
    async fn token_symbol(&self, token: Address) -> Result<String>;
    async fn token_decimals(&self, token: Address) -> Result<u8>;
}

#[async_trait]
impl<P> EthereumClient for Client<P>
where
    P: JsonRpcClient + Send + Sync + 'static,
{
    async fn block_number(&self) -> Result<U64> {
        self.request("eth_blockNumber", ()).await
    }

    async fn latest_block(&self) -> Result<Block<H256>> {
        self.request(
            "eth_getBlockByNumber",
            [serialize(&BlockNumber::Latest), serialize(&false)],
        )
        .await
    }

    async fn block_by_hash(&self, hash: H256) -> Result<Option<Block<H256>>> {
        self.request("eth_getBlockByHash", [serialize(&hash), serialize(&false)])
            .await
    }

    async fn transaction_receipt(&self, hash: H256) -> Result<Option<TransactionReceipt>> {
        self.request("eth_getTransactionReceipt", [hash]).await
    }

    async fn logs(&self, filter: &Filter) -> Result<Vec<Log>> {
        self.request("eth_getLogs", [filter]).await
    }
}

#[async_trait]
impl<P> Erc20Client for Client<P>
where
    P: JsonRpcClient + Send + Sync + 'static,
{
    async fn token_symbol(&self, token: Address) -> Result<String> {
        let returned = self.eth_call(token, SYMBOL_SELECTOR).await?;
        let tokens = abi::decode(&[ParamType::String], &returned)
            .map_err(Report::new)
            .change_context(decode_error("symbol()"))?;

        match tokens.into_iter().next() {
            Some(Token::String(symbol)) => Ok(symbol),
            _ => Err(Report::new(decode_error("symbol()"))),
        }
    }

    async fn token_decimals(&self, token: Address) -> Result<u8> {
        let returned = self.eth_call(token, DECIMALS_SELECTOR).await?;
        let tokens = abi::decode(&[ParamType::Uint(8)], &returned)
            .map_err(Report::new)
            .change_context(decode_error("decimals()"))?;

        match tokens.into_iter().next() {
            Some(Token::Uint(decimals)) if decimals.bits() <= 8 => {
                u8::try_from(decimals.low_u64())
                    .map_err(Report::new)
                    .change_context(decode_error("decimals()"))
            }
            _ => Err(Report::new(decode_error("decimals()"))),
        }
    }
}

impl<P> Client<P>
where
    P: JsonRpcClient + Send + Sync + 'static,
{
    async fn eth_call(&self, to: Address, selector: [u8; 4]) -> Result<Bytes> {
        let call = TransactionRequest::new()
            .to(to)
            .data(Bytes::from(selector.to_vec()));
        self.request(
            "eth_call",
            [serialize(&call), serialize(&BlockNumber::Latest)],
        )
        .await
    }
}

fn decode_error(what: &str) -> ProviderError {
    ProviderError::CustomError(format!("malformed {what} return data"))
}
