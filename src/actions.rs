//! One entry point per player action.
//!
//! Each action runs locate, plan, build and execute for a single transaction
//! and resolves only once the ledger reports it final. Callers must not start
//! a second action for the same account before the first one resolved: the
//! located holdings are only valid for the snapshot they were read from.

use crate::{
    Error,
    Result,
    config::GameConfig,
    executor,
    ledger::{
        CLOCK_OBJECT_ID,
        LedgerClient,
        ObjectId,
        TransactionConfirmation,
        TransactionDigest,
    },
    locator,
    notifications::{
        ToastKind,
        ToastMessage,
    },
    planner::{
        self,
        PendingTokenResult,
    },
    transaction::TransactionBuilder,
    wallet::{
        Wallet,
        WalletAccount,
    },
};
use std::fmt;

pub const GET_BAKING_ACCOUNT: &str = "get_baking_account";
pub const BAKE_BY_HAND: &str = "bake_by_hand";
pub const CLAIM_BROWNIES: &str = "claim_brownies";
pub const BUY_AUTO_BAKERS: &str = "buy_auto_bakers";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActionKind {
    BuyAccount,
    BakeByHand,
    ClaimBrownies,
    BuyAutoBakers { baker_type_id: u64, count: u64 },
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionKind::BuyAccount => write!(f, "buy account"),
            ActionKind::BakeByHand => write!(f, "bake by hand"),
            ActionKind::ClaimBrownies => write!(f, "claim brownies"),
            ActionKind::BuyAutoBakers {
                baker_type_id,
                count,
            } => write!(f, "buy {count} auto-baker(s) of type {baker_type_id}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActionReceipt {
    pub action: ActionKind,
    pub confirmation: TransactionConfirmation,
}

impl ActionReceipt {
    pub fn digest(&self) -> &TransactionDigest {
        &self.confirmation.digest
    }

    pub fn toast(&self, config: &GameConfig) -> ToastMessage {
        let message = match self.action {
            ActionKind::BuyAccount => "Bakery opened".to_string(),
            ActionKind::BakeByHand => {
                format!("Baked {} brownies", config.bake_by_hand_amount)
            }
            ActionKind::ClaimBrownies => "Brownies claimed".to_string(),
            ActionKind::BuyAutoBakers { count, .. } => {
                format!("Bought {count} auto-baker(s)")
            }
        };
        ToastMessage::new(ToastKind::Info, message)
    }
}

/// Runs player actions against one deployment with one wallet.
pub struct BrownieClient<L, W> {
    config: GameConfig,
    ledger: L,
    wallet: W,
}

impl<L: LedgerClient, W: Wallet> BrownieClient<L, W> {
    pub fn new(config: GameConfig, ledger: L, wallet: W) -> Self {
        Self {
            config,
            ledger,
            wallet,
        }
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn wallet(&self) -> &W {
        &self.wallet
    }

    /// Pay the license fee from gas and receive a baking account.
    pub async fn buy_account(&self, account: &WalletAccount) -> Result<ActionReceipt> {
        let mut tx = self.builder(account);
        let payment = tx.split_coin(tx.gas(), self.config.license_price_nanos);
        let inc = tx.object(self.config.brownie_inc_id);
        tx.move_call(self.config.target(GET_BAKING_ACCOUNT), vec![inc, payment]);
        self.finish(ActionKind::BuyAccount, account, tx).await
    }

    pub async fn bake_by_hand(
        &self,
        account: &WalletAccount,
        baking_account: ObjectId,
    ) -> Result<ActionReceipt> {
        let holdings = self.holdings(account).await?;
        let mut tx = self.builder(account);
        let baking = tx.object(baking_account);
        let inc = tx.object(self.config.brownie_inc_id);
        let brownies = tx.move_call(self.config.target(BAKE_BY_HAND), vec![baking, inc]);
        self.gather(&mut tx, account, holdings, brownies.into())?;
        self.finish(ActionKind::BakeByHand, account, tx).await
    }

    pub async fn claim_brownies(
        &self,
        account: &WalletAccount,
        baking_account: ObjectId,
    ) -> Result<ActionReceipt> {
        let holdings = self.holdings(account).await?;
        let mut tx = self.builder(account);
        let brownies = self.claim(&mut tx, baking_account);
        self.gather(&mut tx, account, holdings, brownies)?;
        self.finish(ActionKind::ClaimBrownies, account, tx).await
    }

    /// Claim pending production, then pay for `count` units of
    /// `baker_type_id` with the consolidated brownies plus the per-unit fee
    /// in native currency.
    pub async fn buy_auto_bakers(
        &self,
        account: &WalletAccount,
        baking_account: ObjectId,
        baker_type_id: u64,
        count: u64,
        brownie_unit_price: u64,
    ) -> Result<ActionReceipt> {
        if count == 0 {
            return Err(Error::InvalidRequest(
                "cannot buy zero auto-bakers".to_string(),
            ));
        }
        let brownie_price = count.checked_mul(brownie_unit_price).ok_or_else(|| {
            Error::InvalidRequest(format!(
                "price of {count} auto-bakers at {brownie_unit_price} overflows"
            ))
        })?;
        let fee = count
            .checked_mul(self.config.auto_baker_buy_fee_nanos)
            .ok_or_else(|| {
                Error::InvalidRequest(format!("fee for {count} auto-bakers overflows"))
            })?;

        let holdings = self.holdings(account).await?;
        let mut tx = self.builder(account);
        let fee_payment = tx.split_coin(tx.gas(), fee);
        let claimed = self.claim(&mut tx, baking_account);
        let plan = planner::plan(holdings, Some(claimed), Some(brownie_price))?;
        let brownie_payment = tx
            .apply_plan(&plan, account.address)
            .ok_or(Error::PlannerPrecondition)?;

        let baking = tx.object(baking_account);
        let inc = tx.object(self.config.brownie_inc_id);
        let type_id = tx.pure_u64(baker_type_id);
        let count_arg = tx.pure_u64(count);
        let clock = tx.object(CLOCK_OBJECT_ID);
        tx.move_call(
            self.config.target(BUY_AUTO_BAKERS),
            vec![
                baking,
                inc,
                type_id,
                count_arg,
                fee_payment,
                brownie_payment,
                clock,
            ],
        );
        self.finish(
            ActionKind::BuyAutoBakers {
                baker_type_id,
                count,
            },
            account,
            tx,
        )
        .await
    }

    async fn holdings(&self, account: &WalletAccount) -> Result<Vec<locator::TokenHolding>> {
        locator::locate(&self.ledger, &account.address, &self.config.token_type()).await
    }

    fn builder(&self, account: &WalletAccount) -> TransactionBuilder {
        let mut tx = TransactionBuilder::new(account.address);
        tx.set_gas_budget(self.config.gas_budget);
        tx
    }

    fn claim(&self, tx: &mut TransactionBuilder, baking_account: ObjectId) -> PendingTokenResult {
        let inc = tx.object(self.config.brownie_inc_id);
        let baking = tx.object(baking_account);
        let clock = tx.object(CLOCK_OBJECT_ID);
        tx.move_call(self.config.target(CLAIM_BROWNIES), vec![inc, baking, clock])
            .into()
    }

    /// Fold a freshly produced coin into the player's first holding, or hand
    /// it over whole when there is none. Nothing is paid.
    fn gather(
        &self,
        tx: &mut TransactionBuilder,
        account: &WalletAccount,
        holdings: Vec<locator::TokenHolding>,
        fresh: PendingTokenResult,
    ) -> Result<()> {
        let plan = planner::plan(holdings, Some(fresh), None)?;
        tx.apply_plan(&plan, account.address);
        Ok(())
    }

    async fn finish(
        &self,
        action: ActionKind,
        account: &WalletAccount,
        tx: TransactionBuilder,
    ) -> Result<ActionReceipt> {
        let draft = tx.build()?;
        tracing::info!(%action, sender = %account.address, "executing action");
        let confirmation =
            executor::execute(&self.ledger, &self.wallet, account, draft).await?;
        Ok(ActionReceipt {
            action,
            confirmation,
        })
    }
}

/// Await `action` and call `on_complete` with its receipt, exactly once and
/// only if it reached finality. Failures are returned without calling it.
pub async fn with_completion<F>(
    action: impl Future<Output = Result<ActionReceipt>>,
    on_complete: F,
) -> Result<ActionReceipt>
where
    F: FnOnce(&ActionReceipt),
{
    let receipt = action.await?;
    on_complete(&receipt);
    Ok(receipt)
}
