use thiserror::Error;

/// Daemon-level failures surfaced by `main`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("failed to load config, falling back on default")]
    LoadConfig,
    #[error("http server failed")]
    HttpServer,
}

/// The resolution failure taxonomy.
///
/// Every engine operation surfaces one of these as its `error_stack` context.
/// The orchestration layer does not recover from any of them beyond
/// presenting the outcome; the only fallback inside a resolution is the
/// execution-success → execution-failure search.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionError {
    /// No bridge-owned log or instruction in the transaction. Not an
    /// upstream fault.
    #[error("transaction is not a recognized bridge interaction")]
    TransactionNotRecognized,
    /// The transaction carries contradictory bridge events (initiation
    /// together with validation or execution). A chain-side invariant
    /// violation, never silently resolved.
    #[error("transaction contains contradictory bridge events")]
    AmbiguousClassification,
    /// The search completed but the identifier has no counterpart yet.
    /// Legitimately "pending" from the caller's point of view.
    #[error("no counterpart found for the message hash")]
    CorrelationNotFound,
    /// Transport or query failure. Fatal to the current resolution; there
    /// are no automatic retries.
    #[error("upstream RPC query failed")]
    UpstreamUnavailable,
    /// On-chain bytes do not match the expected event or account schema.
    #[error("on-chain data does not match the expected schema")]
    DecodeMismatch,
}
