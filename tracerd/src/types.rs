use bridge_primitives::MessageHash;
use serde::{Deserialize, Serialize};
use strum::Display;

/// The four ledgers a transfer can touch. Network identity is discovered by
/// probing, never supplied by the caller of classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum ChainName {
    Base,
    #[serde(rename = "Base Sepolia")]
    #[strum(serialize = "Base Sepolia")]
    BaseSepolia,
    Solana,
    #[serde(rename = "Solana Devnet")]
    #[strum(serialize = "Solana Devnet")]
    SolanaDevnet,
}

/// Details of the source-chain transaction that started a transfer.
/// Created once at initiation-classification time, immutable afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InitialTxDetails {
    /// Decimal string already scaled by the asset's decimals.
    pub amount: String,
    pub asset: String,
    pub chain: ChainName,
    pub sender_address: String,
    pub transaction_hash: String,
    /// Unix seconds.
    pub timestamp: u64,
}

/// The destination-chain attestation that precedes fund release.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationTxDetails {
    pub chain: ChainName,
    pub transaction_hash: String,
    pub timestamp: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    Success,
    Failed,
}

/// The destination-chain release of funds. A `Failed` status is a terminal,
/// valid outcome (the relay was attempted and reverted) and must stay
/// distinguishable from "no execution found yet".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecuteTxDetails {
    pub status: ExecutionStatus,
    pub amount: String,
    pub asset: String,
    pub chain: ChainName,
    pub receiver_address: Option<String>,
    pub transaction_hash: Option<String>,
    pub timestamp: Option<u64>,
}

impl ExecuteTxDetails {
    /// The placeholder for an attempted-but-reverted relay. The chain does
    /// not expose amounts or a receiver for the failed attempt.
    pub fn failed(chain: ChainName, transaction_hash: Option<String>) -> Self {
        Self {
            status: ExecutionStatus::Failed,
            amount: "0".to_owned(),
            asset: String::new(),
            chain,
            receiver_address: None,
            transaction_hash,
            timestamp: None,
        }
    }
}

/// A message referenced by a destination-chain transaction, with the log
/// position that orders it within the transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxMessageRef {
    pub message_hash: MessageHash,
    pub log_index: u64,
}

/// A destination-chain transaction touching several messages at once: the
/// per-message classification does not apply, so the transaction is reported
/// as a bag of correlation identifiers partitioned by what happened to them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TxContainer {
    pub chain: ChainName,
    pub transaction_hash: String,
    pub timestamp: u64,
    pub pre_validated: Vec<TxMessageRef>,
    pub executed: Vec<TxMessageRef>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_name_display_matches_serde() {
        for (chain, expected) in [
            (ChainName::Base, "Base"),
            (ChainName::BaseSepolia, "Base Sepolia"),
            (ChainName::Solana, "Solana"),
            (ChainName::SolanaDevnet, "Solana Devnet"),
        ] {
            assert_eq!(chain.to_string(), expected);
            assert_eq!(
                serde_json::to_string(&chain).unwrap(),
                format!("\"{expected}\"")
            );
        }
    }

    #[test]
    fn failed_execution_is_distinguishable_from_absent() {
        let failed = ExecuteTxDetails::failed(ChainName::Base, None);

        assert_eq!(failed.status, ExecutionStatus::Failed);
        assert_eq!(failed.amount, "0");
        assert!(failed.receiver_address.is_none());
    }
}
