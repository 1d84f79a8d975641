use bridge_primitives::MessageHash;
use error_stack::{Report, ResultExt};
use sha3::{Digest, Keccak256};

use crate::error::ResolutionError;
use crate::solana::accounts::OutgoingMessage;

/// Derives the canonical correlation identifier from an outgoing message.
///
/// Layout: `keccak256(nonce_be32 ‖ sender ‖ keccak256(payload_bytes))`,
/// which is what the Base contracts compute over
/// `abi.encode(uint64, bytes32, bytes32)` when the message settles there.
/// The two sides must agree byte for byte; this is the join key between the
/// ledgers.
pub fn derive(message: &OutgoingMessage) -> error_stack::Result<MessageHash, ResolutionError> {
    let payload = borsh::to_vec(&message.payload)
        .map_err(Report::new)
        .change_context(ResolutionError::DecodeMismatch)?;
    let payload_digest = Keccak256::digest(&payload);

    let mut nonce_word = [0u8; 32];
    nonce_word[24..].copy_from_slice(&message.nonce.to_be_bytes());

    let mut hasher = Keccak256::new();
    hasher.update(nonce_word);
    hasher.update(message.sender);
    hasher.update(payload_digest);

    Ok(MessageHash::from(<[u8; 32]>::from(hasher.finalize())))
}
