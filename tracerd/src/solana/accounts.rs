use borsh::{BorshDeserialize, BorshSerialize};
use error_stack::{Report, ResultExt};

use crate::error::ResolutionError;

/// 8-byte account discriminators the bridge program writes ahead of its
/// account state.
pub const OUTGOING_MESSAGE_DISCRIMINATOR: [u8; 8] = [0x5e, 0x1d, 0x9f, 0x33, 0x48, 0x6a, 0xc2, 0x07];
pub const OUTPUT_ROOT_DISCRIMINATOR: [u8; 8] = [0xb3, 0x42, 0x0e, 0x98, 0x5a, 0x10, 0x77, 0xd1];
pub const INCOMING_MESSAGE_DISCRIMINATOR: [u8; 8] = [0x7b, 0xa9, 0x04, 0xc6, 0x25, 0xe1, 0x3f, 0x58];

pub const DISCRIMINATOR_LEN: usize = 8;

/// A message created on Solana, bound for Base. The message hash derives
/// from these fields.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct OutgoingMessage {
    pub nonce: u64,
    pub sender: [u8; 32],
    pub payload: OutgoingPayload,
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum OutgoingPayload {
    Call(CallPayload),
    Transfer(TransferPayload),
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct CallPayload {
    pub target: [u8; 20],
    pub value: u64,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct TransferPayload {
    /// Mint on this chain, or the SOL sentinel.
    pub local_token: [u8; 32],
    /// ERC-20 counterpart on the remote chain.
    pub remote_token: [u8; 20],
    /// Receiver on the remote chain.
    pub to: [u8; 20],
    pub amount: u64,
}

/// A message proven on Solana after originating on Base.
#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub struct IncomingMessage {
    pub nonce: u64,
    pub sender: [u8; 20],
    pub payload: IncomingPayload,
    pub executed: bool,
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum IncomingPayload {
    Call(Vec<u8>),
    Transfer(IncomingTransfer),
}

#[derive(Clone, Debug, PartialEq, BorshSerialize, BorshDeserialize)]
pub enum IncomingTransfer {
    Sol {
        to: [u8; 32],
        amount: u64,
    },
    Spl {
        local_token: [u8; 32],
        to: [u8; 32],
        amount: u64,
    },
    WrappedToken {
        local_token: [u8; 32],
        to: [u8; 32],
        amount: u64,
    },
}

/// True when the account data opens with the given discriminator.
pub fn has_discriminator(data: &[u8], discriminator: &[u8; 8]) -> bool {
    data.len() >= DISCRIMINATOR_LEN && data[..DISCRIMINATOR_LEN] == discriminator[..]
}

/// Checks the discriminator, then deserializes the account state behind it.
/// Trailing bytes are tolerated; accounts may be over-allocated.
pub fn decode_account<T: BorshDeserialize>(
    discriminator: &[u8; 8],
    data: &[u8],
) -> error_stack::Result<T, ResolutionError> {
    if !has_discriminator(data, discriminator) {
        return Err(Report::new(ResolutionError::DecodeMismatch)
            .attach_printable("account discriminator does not match"));
    }

    T::deserialize(&mut &data[DISCRIMINATOR_LEN..])
        .map_err(Report::new)
        .change_context(ResolutionError::DecodeMismatch)
}

/// Serializes an account the way the program lays it out; fixtures in tests
/// are built with this too.
#[cfg(test)]
pub fn encode_account<T: BorshSerialize>(discriminator: &[u8; 8], value: &T) -> Vec<u8> {
    let mut data = discriminator.to_vec();
    borsh::to_writer(&mut data, value).expect("account fixtures serialize");
    data
}
