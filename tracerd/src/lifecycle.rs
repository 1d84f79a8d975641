use bridge_primitives::MessageHash;
use serde::Serialize;

use crate::types::{ExecuteTxDetails, InitialTxDetails, ValidationTxDetails};

/// Where a transfer stands. Monotonic: `Executed` implies the message was
/// validated, `Validated` implies it was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum BridgeStatus {
    Pending,
    Validated,
    Executed,
}

/// The merged record of one transfer across both ledgers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BridgeLifecycle {
    pub status: BridgeStatus,
    pub message_hash: Option<MessageHash>,
    pub initiation: Option<InitialTxDetails>,
    pub validation: Option<ValidationTxDetails>,
    pub execution: Option<ExecuteTxDetails>,
}

impl BridgeLifecycle {
    pub fn assemble(
        message_hash: Option<MessageHash>,
        initiation: Option<InitialTxDetails>,
        validation: Option<ValidationTxDetails>,
        execution: Option<ExecuteTxDetails>,
    ) -> Self {
        let status = if execution.is_some() {
            BridgeStatus::Executed
        } else if validation.is_some() {
            BridgeStatus::Validated
        } else {
            BridgeStatus::Pending
        };

        Self {
            status,
            message_hash,
            initiation,
            validation,
            execution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChainName, ExecutionStatus};

    fn validation() -> ValidationTxDetails {
        ValidationTxDetails {
            chain: ChainName::Base,
            transaction_hash: "0xcd".repeat(32),
            timestamp: 1_700_000_100,
        }
    }

    #[test]
    fn status_climbs_with_the_later_phases() {
        let pending = BridgeLifecycle::assemble(None, None, None, None);
        assert_eq!(pending.status, BridgeStatus::Pending);

        let validated = BridgeLifecycle::assemble(None, None, Some(validation()), None);
        assert_eq!(validated.status, BridgeStatus::Validated);

        let executed = BridgeLifecycle::assemble(
            None,
            None,
            Some(validation()),
            Some(ExecuteTxDetails::failed(ChainName::Base, None)),
        );
        assert_eq!(executed.status, BridgeStatus::Executed);
    }

    #[test]
    fn failed_execution_still_counts_as_executed() {
        let lifecycle = BridgeLifecycle::assemble(
            None,
            None,
            None,
            Some(ExecuteTxDetails::failed(ChainName::Base, None)),
        );

        assert_eq!(lifecycle.status, BridgeStatus::Executed);
        assert_eq!(
            lifecycle.execution.unwrap().status,
            ExecutionStatus::Failed
        );
    }
}
