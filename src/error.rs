use crate::{
    ledger::TransactionDigest,
    transaction::BuildError,
};
use color_eyre::eyre::Report;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("ledger query failed: {0}")]
    QueryFailure(#[source] Report),
    #[error("wallet did not sign the transaction: {0}")]
    SigningRejected(String),
    #[error("wallet '{wallet}' does not provide the '{feature}' feature")]
    MissingWalletFeature { wallet: String, feature: String },
    #[error("transaction submission failed: {0}")]
    SubmissionFailure(#[source] Report),
    #[error("transaction {digest} was submitted but not confirmed: {source}")]
    ConfirmationFailure {
        digest: TransactionDigest,
        #[source]
        source: Report,
    },
    #[error("coin consolidation needs at least one holding or a fresh result")]
    PlannerPrecondition,
    #[error("invalid transaction: {0}")]
    InvalidTransaction(#[from] BuildError),
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("configuration error: {0}")]
    Config(#[source] Report),
}

impl Error {
    /// Whether re-running the whole locate, plan, build, execute pipeline can
    /// succeed. Programming errors never can.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::QueryFailure(_)
                | Error::SigningRejected(_)
                | Error::SubmissionFailure(_)
                | Error::ConfirmationFailure { .. }
        )
    }
}
