use error_stack::{Report, ResultExt};
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use crate::error::ResolutionError;
use crate::solana::accounts::{
    has_discriminator, INCOMING_MESSAGE_DISCRIMINATOR, OUTGOING_MESSAGE_DISCRIMINATOR,
    OUTPUT_ROOT_DISCRIMINATOR,
};
use crate::solana::instruction::{
    self, created_account, is_relay_message, match_bridge_instruction, CreatedAccountKind,
};
use crate::solana::{SolanaRpcClient, SolanaTransaction};

type Result<T> = error_stack::Result<T, ResolutionError>;

/// The bridge account a Solana transaction resolves to, with its fetched
/// state.
#[derive(Debug, Clone, PartialEq)]
pub enum IdentifiedTx {
    /// An initiation: the transaction created an outgoing message.
    OutgoingMessage { address: Pubkey, data: Vec<u8> },
    /// A destination-side proof or relay touching an incoming message.
    IncomingMessage { address: Pubkey, data: Vec<u8> },
    /// A state-root publication; part of the bridge but not a transfer.
    OutputRoot { address: Pubkey },
}

/// Identifies which bridge account a transaction is about.
///
/// Strategies run in order: the relay-message account scan, then the
/// discriminator matcher table over top-level instructions, then a scan of
/// inner instructions for a System-program create-account whose new account
/// is bridge-owned.
pub async fn identify<C>(client: &C, tx: &SolanaTransaction) -> Result<IdentifiedTx>
where
    C: SolanaRpcClient,
{
    for ix in &tx.instructions {
        if is_relay_message(ix) {
            // The relayed incoming message is somewhere in the account list;
            // recognize it by its discriminator.
            for account in &ix.accounts {
                if let Some(data) = fetch(client, account).await? {
                    if has_discriminator(&data, &INCOMING_MESSAGE_DISCRIMINATOR) {
                        return Ok(IdentifiedTx::IncomingMessage {
                            address: *account,
                            data,
                        });
                    }
                }
            }
            continue;
        }

        let Some((matcher, address)) = match_bridge_instruction(ix) else {
            continue;
        };
        let Some(data) = fetch(client, &address).await? else {
            debug!(%address, "matched instruction but the account is gone");
            continue;
        };

        match matcher.kind {
            CreatedAccountKind::OutgoingMessage
                if has_discriminator(&data, &OUTGOING_MESSAGE_DISCRIMINATOR) =>
            {
                return Ok(IdentifiedTx::OutgoingMessage { address, data });
            }
            CreatedAccountKind::IncomingMessage
                if has_discriminator(&data, &INCOMING_MESSAGE_DISCRIMINATOR) =>
            {
                return Ok(IdentifiedTx::IncomingMessage { address, data });
            }
            _ => debug!(%address, "account does not carry the expected discriminator"),
        }
    }

    // Fallback: the bridge instruction may be wrapped by another program, in
    // which case only the inner create-account betrays it.
    for ix in &tx.inner_instructions {
        let Some(address) = created_account(ix) else {
            continue;
        };
        let Some(data) = fetch(client, &address).await? else {
            continue;
        };

        if has_discriminator(&data, &OUTGOING_MESSAGE_DISCRIMINATOR) {
            return Ok(IdentifiedTx::OutgoingMessage { address, data });
        }
        if has_discriminator(&data, &OUTPUT_ROOT_DISCRIMINATOR) {
            return Ok(IdentifiedTx::OutputRoot { address });
        }
        if has_discriminator(&data, &INCOMING_MESSAGE_DISCRIMINATOR) {
            return Ok(IdentifiedTx::IncomingMessage { address, data });
        }
    }

    Err(Report::new(ResolutionError::TransactionNotRecognized))
}

/// Whether a delivery transaction is the attestation or the relay; exposed
/// here so the decoder never reasons about discriminators.
pub use instruction::{delivery_kind, DeliveryKind};

async fn fetch<C>(client: &C, address: &Pubkey) -> Result<Option<Vec<u8>>>
where
    C: SolanaRpcClient,
{
    client
        .account_data(address)
        .await
        .change_context(ResolutionError::UpstreamUnavailable)
}
