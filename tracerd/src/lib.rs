use error_stack::ResultExt;
use tokio::signal::unix::{signal, SignalKind};
use tokio_util::sync::CancellationToken;
use tracing::info;

pub mod api;
pub mod config;
pub mod error;
pub mod evm;
pub mod lifecycle;
pub mod msg_hash;
pub mod solana;
pub mod types;
pub mod url;

pub use crate::error::{Error, ResolutionError};

use crate::config::Config;
use crate::evm::decoder::EvmDecoder;
use crate::evm::json_rpc;
use crate::solana::decoder::SolanaDecoder;

pub async fn run(cfg: Config) -> error_stack::Result<(), Error> {
    let Config {
        bind_address,
        base,
        solana: solana_cfg,
        search,
    } = cfg;

    let evm = EvmDecoder::new(
        json_rpc::Client::new_http(&base.mainnet_rpc_url),
        json_rpc::Client::new_http(&base.sepolia_rpc_url),
        search,
    );
    let solana = SolanaDecoder::new(
        solana::Client::new(&solana_cfg.mainnet_rpc_url),
        solana::Client::new(&solana_cfg.devnet_rpc_url),
    );
    let server = api::Server::new(bind_address, evm, solana);

    let main_token = CancellationToken::new();
    let exit_token = main_token.clone();
    tokio::spawn(async move {
        let mut sigint = signal(SignalKind::interrupt()).expect("failed to capture SIGINT");
        let mut sigterm = signal(SignalKind::terminate()).expect("failed to capture SIGTERM");

        tokio::select! {
            _ = sigint.recv() => {},
            _ = sigterm.recv() => {},
        }

        info!("signal received, waiting for program to exit gracefully");

        exit_token.cancel();
    });

    server.run(main_token).await.change_context(Error::HttpServer)
}
