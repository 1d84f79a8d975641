use std::ops::RangeInclusive;

use error_stack::{Report, ResultExt};
use ethers_core::types::{Filter, Log};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::ResolutionError;
use crate::evm::json_rpc::EthereumClient;
use crate::evm::EvmNetwork;

type Result<T> = error_stack::Result<T, ResolutionError>;

/// Seconds per block on Base.
const BLOCK_PERIOD_SECS: u64 = 2;
/// Extra blocks subtracted from a timestamp-derived height to tolerate
/// clock and block-period drift.
const DRIFT_SAFETY_BLOCKS: u64 = 300;

/// Tuning for the windowed historical search. Recomputed per call, never
/// persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Blocks per `eth_getLogs` window.
    pub chunk_size: u64,
    /// Window queries in flight at once; bounded to respect provider rate
    /// limits.
    pub concurrency: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            chunk_size: 10_000,
            concurrency: 3,
        }
    }
}

/// Lower search bound: the later of the bridge deployment block and, when a
/// minimum timestamp is supplied, a height estimated from the current block
/// time minus the elapsed seconds over the block period, with a safety
/// margin. Never below the deployment block.
pub async fn start_block<C>(
    client: &C,
    network: EvmNetwork,
    min_timestamp: Option<u64>,
) -> Result<u64>
where
    C: EthereumClient + Sync,
{
    let deployed = network.deployment_block();
    let Some(min_timestamp) = min_timestamp else {
        return Ok(deployed);
    };

    let latest = client
        .latest_block()
        .await
        .change_context(ResolutionError::UpstreamUnavailable)?;
    let height = latest
        .number
        .ok_or_else(|| Report::new(ResolutionError::UpstreamUnavailable))
        .attach_printable("latest block has no number")?
        .as_u64();

    let elapsed = latest.timestamp.as_u64().saturating_sub(min_timestamp);
    let estimated = height
        .saturating_sub(elapsed.checked_div(BLOCK_PERIOD_SECS).unwrap_or_default())
        .saturating_sub(DRIFT_SAFETY_BLOCKS);

    Ok(deployed.max(estimated))
}

/// Materializes all logs matching `filter` between `from_block` and the
/// current chain height.
///
/// The range is split into fixed-size windows queried with bounded
/// concurrency; results concatenate in window order (log order inside a
/// window is whatever the transport returned). The first failing window
/// aborts the whole search.
pub async fn search_logs<C>(
    client: &C,
    filter: Filter,
    from_block: u64,
    config: &SearchConfig,
) -> Result<Vec<Log>>
where
    C: EthereumClient + Sync,
{
    let to_block = client
        .block_number()
        .await
        .change_context(ResolutionError::UpstreamUnavailable)?
        .as_u64();

    if to_block < from_block {
        return Ok(Vec::new());
    }

    let windows = windows(from_block, to_block, config.chunk_size);
    debug!(from_block, to_block, windows = windows.len(), "searching logs");

    let batches: Vec<Vec<Log>> = stream::iter(windows.into_iter().map(|window| {
        let filter = filter
            .clone()
            .from_block(*window.start())
            .to_block(*window.end());
        async move {
            client
                .logs(&filter)
                .await
                .change_context(ResolutionError::UpstreamUnavailable)
        }
    }))
    .buffered(config.concurrency.max(1))
    .try_collect()
    .await?;

    Ok(batches.into_iter().flatten().collect())
}

fn windows(from: u64, to: u64, chunk_size: u64) -> Vec<RangeInclusive<u64>> {
    let chunk_size = chunk_size.max(1);
    let mut windows = Vec::new();
    let mut start = from;

    while start <= to {
        let end = to.min(start.saturating_add(chunk_size.saturating_sub(1)));
        windows.push(start..=end);
        let Some(next) = end.checked_add(1) else {
            break;
        };
        start = next;
    }

    windows
}

#[cfg(test)]
mod tests {
    use ethers_core::types::{Block, FilterBlockOption, H256, U64};
    use mockall::predicate::always;

    use super::*;
    use crate::evm::json_rpc::MockEthereumClient;

    fn window_of(filter: &Filter) -> (u64, u64) {
        match filter.block_option {
            FilterBlockOption::Range {
                from_block,
                to_block,
            } => (
                from_block.and_then(|b| b.as_number()).unwrap().as_u64(),
                to_block.and_then(|b| b.as_number()).unwrap().as_u64(),
            ),
            _ => panic!("expected a block range filter"),
        }
    }

    fn log_in_block(block: u64) -> Log {
        Log {
            block_number: Some(U64::from(block)),
            ..Log::default()
        }
    }

    #[tokio::test]
    async fn single_chunk_range_issues_one_query() {
        let mut client = MockEthereumClient::new();
        client
            .expect_block_number()
            .return_once(|| Ok(U64::from(10_999u64)));
        client
            .expect_logs()
            .times(1)
            .withf(|filter| window_of(filter) == (1_000, 10_999))
            .returning(|_| Ok(vec![]));

        let logs = search_logs(&client, Filter::new(), 1_000, &SearchConfig::default())
            .await
            .unwrap();

        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn multi_chunk_range_preserves_window_order() {
        let mut client = MockEthereumClient::new();
        client
            .expect_block_number()
            .return_once(|| Ok(U64::from(25_000u64)));
        client.expect_logs().times(3).returning(|filter| {
            let (from, to) = window_of(filter);
            assert!(to.saturating_sub(from) < 10_000);
            Ok(vec![log_in_block(from)])
        });

        let logs = search_logs(&client, Filter::new(), 0, &SearchConfig::default())
            .await
            .unwrap();

        let starts: Vec<u64> = logs
            .iter()
            .map(|log| log.block_number.unwrap().as_u64())
            .collect();
        assert_eq!(starts, vec![0, 10_000, 20_000]);
    }

    #[tokio::test]
    async fn window_failure_is_fatal() {
        let mut client = MockEthereumClient::new();
        client
            .expect_block_number()
            .return_once(|| Ok(U64::from(25_000u64)));
        client.expect_logs().with(always()).returning(|filter| {
            let (from, _) = window_of(filter);
            if from >= 10_000 {
                Err(error_stack::Report::new(
                    ethers_providers::ProviderError::CustomError("rate limited".into()),
                ))
            } else {
                Ok(vec![log_in_block(from)])
            }
        });

        let result = search_logs(&client, Filter::new(), 0, &SearchConfig::default()).await;

        assert_eq!(
            *result.unwrap_err().current_context(),
            ResolutionError::UpstreamUnavailable
        );
    }

    #[tokio::test]
    async fn empty_range_issues_no_queries() {
        let mut client = MockEthereumClient::new();
        client
            .expect_block_number()
            .return_once(|| Ok(U64::from(99u64)));
        client.expect_logs().times(0);

        let logs = search_logs(&client, Filter::new(), 100, &SearchConfig::default())
            .await
            .unwrap();

        assert!(logs.is_empty());
    }

    #[tokio::test]
    async fn start_block_without_hint_is_the_deployment_block() {
        let client = MockEthereumClient::new();

        let block = start_block(&client, EvmNetwork::Mainnet, None).await.unwrap();

        assert_eq!(block, EvmNetwork::Mainnet.deployment_block());
    }

    #[tokio::test]
    async fn start_block_estimates_from_timestamp() {
        let deployed = EvmNetwork::Mainnet.deployment_block();
        let height = deployed.saturating_add(500_000);
        let now = 1_750_000_000u64;

        let mut client = MockEthereumClient::new();
        client.expect_latest_block().return_once(move || {
            Ok(Block {
                number: Some(U64::from(height)),
                timestamp: now.into(),
                ..Block::<H256>::default()
            })
        });

        // 2000 seconds ago = 1000 blocks, plus the 300 block safety margin.
        let block = start_block(&client, EvmNetwork::Mainnet, Some(now - 2_000))
            .await
            .unwrap();

        assert_eq!(block, height - 1_000 - 300);
    }

    #[tokio::test]
    async fn start_block_never_precedes_deployment() {
        let deployed = EvmNetwork::Mainnet.deployment_block();
        let now = 1_750_000_000u64;

        let mut client = MockEthereumClient::new();
        client.expect_latest_block().return_once(move || {
            Ok(Block {
                number: Some(U64::from(deployed.saturating_add(10))),
                timestamp: now.into(),
                ..Block::<H256>::default()
            })
        });

        // A timestamp far in the past estimates a height below deployment.
        let block = start_block(&client, EvmNetwork::Mainnet, Some(1_000))
            .await
            .unwrap();

        assert_eq!(block, deployed);
    }

    #[test]
    fn windows_partition_inclusively() {
        assert_eq!(windows(0, 9_999, 10_000), vec![0..=9_999]);
        assert_eq!(
            windows(0, 10_000, 10_000),
            vec![0..=9_999, 10_000..=10_000]
        );
        assert_eq!(windows(5, 5, 10_000), vec![5..=5]);
    }
}
