use crate::{
    ledger::{
        Address,
        SignedTransaction,
    },
    transaction::TransactionDraft,
};
use color_eyre::eyre::Report;
use serde::{
    Deserialize,
    Serialize,
};
use thiserror::Error;

/// Feature name under which wallets expose transaction signing.
pub const SIGN_TRANSACTION_FEATURE: &str = "iota:signTransaction";

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WalletAccount {
    pub address: Address,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub chains: Vec<String>,
}

impl WalletAccount {
    pub fn new(address: Address) -> Self {
        Self {
            address,
            label: None,
            chains: Vec::new(),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct SignTransactionRequest<'a> {
    pub transaction: &'a TransactionDraft,
    pub account: &'a WalletAccount,
}

#[derive(Debug, Error)]
pub enum WalletError {
    #[error("rejected: {0}")]
    Rejected(String),
    #[error(transparent)]
    Failed(Report),
}

/// Holder of the user's signing key. Only signing is needed here; the wallet
/// never submits anything itself.
pub trait Wallet {
    fn name(&self) -> &str;

    fn supports_feature(&self, feature: &str) -> bool;

    /// May wait on the user. Declining is [`WalletError::Rejected`].
    fn sign_transaction(
        &self,
        request: SignTransactionRequest<'_>,
    ) -> impl Future<Output = Result<SignedTransaction, WalletError>>;
}
