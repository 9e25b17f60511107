//! Coin consolidation.
//!
//! Every claim or bake mints a fresh token object, so a player's balance is
//! spread over many coins. Before paying, the coins are merged into one and
//! the payment is split off it. The merge target is always the first located
//! holding: it is the object that stays canonical for the player afterwards.
//!
//! A coin produced inside the transaction that is neither merged, consumed nor
//! transferred is lost when the transaction scope ends, so a plan always says
//! where the remainder ends up.

use crate::{
    Error,
    Result,
    locator::TokenHolding,
    transaction::Argument,
};
use std::collections::HashSet;

/// A token value produced by an earlier command of the transaction being
/// built. It has no object id yet.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PendingTokenResult(Argument);

impl PendingTokenResult {
    pub fn new(argument: Argument) -> Self {
        Self(argument)
    }

    pub fn argument(&self) -> Argument {
        self.0
    }
}

impl From<Argument> for PendingTokenResult {
    fn from(argument: Argument) -> Self {
        Self(argument)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum TokenSource {
    Holding(TokenHolding),
    Pending(PendingTokenResult),
}

/// What happens to the merge target once merges and the payment split ran.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Remainder {
    /// The target is an owned holding and keeps its balance in place.
    StaysWithHolding,
    /// The target only exists inside the transaction and must be sent to the
    /// owner explicitly.
    TransferToOwner,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PlanStep {
    Merge {
        target: TokenSource,
        sources: Vec<TokenSource>,
    },
    Split {
        source: TokenSource,
        amount: u64,
    },
    Transfer {
        source: TokenSource,
    },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConsolidationPlan {
    merge_target: TokenSource,
    merge_sources: Vec<TokenSource>,
    payment_amount: Option<u64>,
    remainder: Remainder,
}

impl ConsolidationPlan {
    pub fn merge_target(&self) -> &TokenSource {
        &self.merge_target
    }

    pub fn merge_sources(&self) -> &[TokenSource] {
        &self.merge_sources
    }

    pub fn payment_amount(&self) -> Option<u64> {
        self.payment_amount
    }

    pub fn remainder(&self) -> Remainder {
        self.remainder
    }

    /// Merges, then the payment split, then the remainder transfer.
    pub fn steps(&self) -> Vec<PlanStep> {
        let mut steps = Vec::with_capacity(3);
        if !self.merge_sources.is_empty() {
            steps.push(PlanStep::Merge {
                target: self.merge_target.clone(),
                sources: self.merge_sources.clone(),
            });
        }
        if let Some(amount) = self.payment_amount {
            steps.push(PlanStep::Split {
                source: self.merge_target.clone(),
                amount,
            });
        }
        if self.remainder == Remainder::TransferToOwner {
            steps.push(PlanStep::Transfer {
                source: self.merge_target.clone(),
            });
        }
        steps
    }
}

/// Decide how `holdings` and an optional `fresh` result are consolidated and
/// how `payment` is carved out of them.
///
/// `payment` of `None` means nothing is paid: the tokens are only gathered.
/// Having neither holdings nor a fresh result is a caller bug. A holding
/// listed more than once is used at its first position only.
pub fn plan(
    holdings: Vec<TokenHolding>,
    fresh: Option<PendingTokenResult>,
    payment: Option<u64>,
) -> Result<ConsolidationPlan> {
    let mut seen = HashSet::new();
    let mut holdings = holdings
        .into_iter()
        .filter(|holding| seen.insert(holding.object_id()));
    let plan = match (holdings.next(), fresh) {
        (None, None) => return Err(Error::PlannerPrecondition),
        (None, Some(fresh)) => ConsolidationPlan {
            merge_target: TokenSource::Pending(fresh),
            merge_sources: Vec::new(),
            payment_amount: payment,
            remainder: Remainder::TransferToOwner,
        },
        (Some(first), fresh) => {
            let mut merge_sources: Vec<_> = holdings.map(TokenSource::Holding).collect();
            merge_sources.extend(fresh.map(TokenSource::Pending));
            ConsolidationPlan {
                merge_target: TokenSource::Holding(first),
                merge_sources,
                payment_amount: payment,
                remainder: Remainder::StaysWithHolding,
            }
        }
    };
    tracing::debug!(
        sources = plan.merge_sources.len(),
        payment = ?plan.payment_amount,
        remainder = ?plan.remainder,
        "planned coin consolidation"
    );
    Ok(plan)
}
