use bridge_primitives::MessageHash;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::system_program;

use crate::solana::{Instruction, SolanaTransaction};

/// 8-byte instruction discriminators of the bridge program.
pub const BRIDGE_SOL_DISCRIMINATOR: [u8; 8] = [0x29, 0x8b, 0x46, 0x1c, 0x70, 0x13, 0xd8, 0xf5];
pub const BRIDGE_SOL_WITH_BUFFERED_CALL_DISCRIMINATOR: [u8; 8] =
    [0x4d, 0xc1, 0x65, 0x0a, 0x91, 0x3e, 0x22, 0x8e];
pub const BRIDGE_SPL_DISCRIMINATOR: [u8; 8] = [0x83, 0x57, 0xfa, 0x60, 0x0d, 0xb4, 0x49, 0x1a];
pub const BRIDGE_WRAPPED_TOKEN_DISCRIMINATOR: [u8; 8] =
    [0xe6, 0x30, 0x1d, 0x7f, 0x98, 0x5c, 0xa3, 0x44];
pub const PROVE_MESSAGE_DISCRIMINATOR: [u8; 8] = [0x12, 0xee, 0x58, 0xc4, 0x3b, 0x07, 0x96, 0x6f];
pub const PROVE_MESSAGE_BUFFERED_DISCRIMINATOR: [u8; 8] =
    [0xa0, 0x75, 0x2b, 0x19, 0xcd, 0x84, 0x5e, 0x02];
pub const RELAY_MESSAGE_DISCRIMINATOR: [u8; 8] = [0x61, 0x04, 0xb8, 0x37, 0xf2, 0x9a, 0x0c, 0xd9];

/// Bincode tag of `SystemInstruction::CreateAccount`.
const CREATE_ACCOUNT_TAG: [u8; 4] = [0, 0, 0, 0];

/// What kind of message account an instruction creates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatedAccountKind {
    OutgoingMessage,
    IncomingMessage,
}

/// One recognizable bridge instruction shape: its discriminator and where
/// the created message account sits in the instruction's account list.
#[derive(Debug, Clone, Copy)]
pub struct InstructionMatcher {
    pub discriminator: [u8; 8],
    pub account_index: usize,
    pub kind: CreatedAccountKind,
}

/// Ordered matcher table; first match wins. Supporting a new bridge
/// instruction variant is a row here, not new control flow.
pub const BRIDGE_INSTRUCTION_MATCHERS: &[InstructionMatcher] = &[
    InstructionMatcher {
        discriminator: BRIDGE_SOL_DISCRIMINATOR,
        account_index: 2,
        kind: CreatedAccountKind::OutgoingMessage,
    },
    InstructionMatcher {
        discriminator: BRIDGE_SOL_WITH_BUFFERED_CALL_DISCRIMINATOR,
        account_index: 2,
        kind: CreatedAccountKind::OutgoingMessage,
    },
    InstructionMatcher {
        discriminator: BRIDGE_SPL_DISCRIMINATOR,
        account_index: 3,
        kind: CreatedAccountKind::OutgoingMessage,
    },
    InstructionMatcher {
        discriminator: BRIDGE_WRAPPED_TOKEN_DISCRIMINATOR,
        account_index: 3,
        kind: CreatedAccountKind::OutgoingMessage,
    },
    InstructionMatcher {
        discriminator: PROVE_MESSAGE_DISCRIMINATOR,
        account_index: 1,
        kind: CreatedAccountKind::IncomingMessage,
    },
    InstructionMatcher {
        discriminator: PROVE_MESSAGE_BUFFERED_DISCRIMINATOR,
        account_index: 1,
        kind: CreatedAccountKind::IncomingMessage,
    },
];

/// Instructions whose trailing 32 bytes are the message hash.
const HASH_BEARING_DISCRIMINATORS: [[u8; 8]; 3] = [
    PROVE_MESSAGE_DISCRIMINATOR,
    PROVE_MESSAGE_BUFFERED_DISCRIMINATOR,
    RELAY_MESSAGE_DISCRIMINATOR,
];

pub fn matches_discriminator(data: &[u8], discriminator: &[u8; 8]) -> bool {
    data.len() >= discriminator.len() && data[..discriminator.len()] == discriminator[..]
}

pub fn is_relay_message(instruction: &Instruction) -> bool {
    matches_discriminator(&instruction.data, &RELAY_MESSAGE_DISCRIMINATOR)
}

/// Runs the matcher table over one instruction, yielding the matcher and the
/// message account it names.
pub fn match_bridge_instruction(
    instruction: &Instruction,
) -> Option<(&'static InstructionMatcher, Pubkey)> {
    BRIDGE_INSTRUCTION_MATCHERS
        .iter()
        .find(|matcher| matches_discriminator(&instruction.data, &matcher.discriminator))
        .and_then(|matcher| {
            instruction
                .accounts
                .get(matcher.account_index)
                .map(|account| (matcher, *account))
        })
}

/// For a System-program create-account instruction, the address of the
/// account being created (funder first, new account second).
pub fn created_account(instruction: &Instruction) -> Option<Pubkey> {
    if instruction.program_id != system_program::ID {
        return None;
    }
    if instruction.data.len() < CREATE_ACCOUNT_TAG.len()
        || instruction.data[..CREATE_ACCOUNT_TAG.len()] != CREATE_ACCOUNT_TAG[..]
    {
        return None;
    }

    instruction.accounts.get(1).copied()
}

/// Destination-side transactions carry the message hash as the trailing 32
/// bytes of their prove / relay call data.
pub fn extract_message_hash(tx: &SolanaTransaction) -> Option<MessageHash> {
    tx.instructions.iter().find_map(|instruction| {
        let data = &instruction.data;
        if data.len() < 40 {
            return None;
        }
        HASH_BEARING_DISCRIMINATORS
            .iter()
            .any(|discriminator| matches_discriminator(data, discriminator))
            .then(|| MessageHash::from_slice(&data[data.len().saturating_sub(32)..]).ok())
            .flatten()
    })
}

/// Whether a transaction touching an incoming-message account is the
/// attestation or the relay. Decided from the instruction contents, never
/// from signature-list position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryKind {
    Validation,
    Execution,
}

pub fn delivery_kind(tx: &SolanaTransaction) -> Option<DeliveryKind> {
    tx.instructions.iter().find_map(|instruction| {
        if matches_discriminator(&instruction.data, &PROVE_MESSAGE_DISCRIMINATOR)
            || matches_discriminator(&instruction.data, &PROVE_MESSAGE_BUFFERED_DISCRIMINATOR)
        {
            Some(DeliveryKind::Validation)
        } else if is_relay_message(instruction) {
            Some(DeliveryKind::Execution)
        } else {
            None
        }
    })
}

#[cfg(test)]
mod tests {
    use solana_sdk::signature::Signature;

    use super::*;

    fn instruction(program_id: Pubkey, accounts: Vec<Pubkey>, data: Vec<u8>) -> Instruction {
        Instruction {
            program_id,
            accounts,
            data,
        }
    }

    fn tx_with_instructions(instructions: Vec<Instruction>) -> SolanaTransaction {
        SolanaTransaction {
            signature: Signature::default(),
            block_time: Some(1_700_000_000),
            err: None,
            instructions,
            inner_instructions: vec![],
        }
    }

    fn hash_bearing_data(discriminator: [u8; 8], hash: [u8; 32]) -> Vec<u8> {
        let mut data = discriminator.to_vec();
        data.extend_from_slice(&[0u8; 16]); // proof payload
        data.extend_from_slice(&hash);
        data
    }

    #[test]
    fn matcher_table_names_the_message_account() {
        let message_account = Pubkey::new_unique();
        let accounts = vec![
            Pubkey::new_unique(),
            Pubkey::new_unique(),
            message_account,
            Pubkey::new_unique(),
        ];
        let ix = instruction(
            Pubkey::new_unique(),
            accounts,
            BRIDGE_SOL_DISCRIMINATOR.to_vec(),
        );

        let (matcher, account) = match_bridge_instruction(&ix).unwrap();
        assert_eq!(matcher.kind, CreatedAccountKind::OutgoingMessage);
        assert_eq!(account, message_account);
    }

    #[test]
    fn unknown_discriminators_do_not_match() {
        let ix = instruction(
            Pubkey::new_unique(),
            vec![Pubkey::new_unique(); 4],
            vec![0xff; 8],
        );

        assert!(match_bridge_instruction(&ix).is_none());
    }

    #[test]
    fn created_account_requires_the_system_program() {
        let new_account = Pubkey::new_unique();
        let accounts = vec![Pubkey::new_unique(), new_account];
        let mut data = CREATE_ACCOUNT_TAG.to_vec();
        data.extend_from_slice(&[0u8; 48]);

        let ix = instruction(system_program::ID, accounts.clone(), data.clone());
        assert_eq!(created_account(&ix), Some(new_account));

        let foreign = instruction(Pubkey::new_unique(), accounts, data);
        assert_eq!(created_account(&foreign), None);
    }

    #[test]
    fn message_hash_is_the_trailing_32_bytes() {
        let hash = [0x42u8; 32];
        let tx = tx_with_instructions(vec![instruction(
            Pubkey::new_unique(),
            vec![],
            hash_bearing_data(PROVE_MESSAGE_DISCRIMINATOR, hash),
        )]);

        assert_eq!(extract_message_hash(&tx), Some(MessageHash::from(hash)));
    }

    #[test]
    fn short_or_foreign_data_yields_no_hash() {
        let short = tx_with_instructions(vec![instruction(
            Pubkey::new_unique(),
            vec![],
            RELAY_MESSAGE_DISCRIMINATOR.to_vec(),
        )]);
        assert_eq!(extract_message_hash(&short), None);

        let foreign = tx_with_instructions(vec![instruction(
            Pubkey::new_unique(),
            vec![],
            hash_bearing_data([0xff; 8], [0x42; 32]),
        )]);
        assert_eq!(extract_message_hash(&foreign), None);
    }

    #[test]
    fn delivery_kind_is_discriminator_driven() {
        let prove = tx_with_instructions(vec![instruction(
            Pubkey::new_unique(),
            vec![],
            hash_bearing_data(PROVE_MESSAGE_BUFFERED_DISCRIMINATOR, [0x42; 32]),
        )]);
        assert_eq!(delivery_kind(&prove), Some(DeliveryKind::Validation));

        let relay = tx_with_instructions(vec![instruction(
            Pubkey::new_unique(),
            vec![],
            hash_bearing_data(RELAY_MESSAGE_DISCRIMINATOR, [0x42; 32]),
        )]);
        assert_eq!(delivery_kind(&relay), Some(DeliveryKind::Execution));

        let unrelated = tx_with_instructions(vec![instruction(
            Pubkey::new_unique(),
            vec![],
            vec![0u8; 48],
        )]);
        assert_eq!(delivery_kind(&unrelated), None);
    }
}
