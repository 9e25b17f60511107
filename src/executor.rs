use crate::{
    Error,
    Result,
    ledger::{
        LedgerClient,
        TransactionConfirmation,
    },
    transaction::TransactionDraft,
    wallet::{
        SIGN_TRANSACTION_FEATURE,
        SignTransactionRequest,
        Wallet,
        WalletAccount,
        WalletError,
    },
};

/// Sign `draft` with `wallet`, submit it and wait for finality.
///
/// Nothing is retried. A rejected signature never reaches the ledger; a failed
/// submission leaves every balance untouched.
pub async fn execute<L: LedgerClient, W: Wallet>(
    ledger: &L,
    wallet: &W,
    account: &WalletAccount,
    draft: TransactionDraft,
) -> Result<TransactionConfirmation> {
    if !wallet.supports_feature(SIGN_TRANSACTION_FEATURE) {
        return Err(Error::MissingWalletFeature {
            wallet: wallet.name().to_string(),
            feature: SIGN_TRANSACTION_FEATURE.to_string(),
        });
    }
    tracing::debug!(
        sender = %draft.sender(),
        gas_budget = draft.gas_budget(),
        commands = %draft.describe(),
        "requesting signature"
    );
    let signed = wallet
        .sign_transaction(SignTransactionRequest {
            transaction: &draft,
            account,
        })
        .await
        .map_err(|e| match e {
            WalletError::Rejected(reason) => Error::SigningRejected(reason),
            WalletError::Failed(report) => Error::SigningRejected(report.to_string()),
        })?;

    let digest = ledger
        .execute_transaction_block(&signed)
        .await
        .map_err(Error::SubmissionFailure)?;
    tracing::info!(%digest, "transaction submitted");

    let confirmation = ledger
        .wait_for_transaction(&digest)
        .await
        .map_err(|source| Error::ConfirmationFailure {
            digest: digest.clone(),
            source,
        })?;
    tracing::info!(%digest, checkpoint = ?confirmation.checkpoint, "transaction final");
    Ok(confirmation)
}
