#![allow(non_snake_case)]

use brownie_client::{
    actions::with_completion,
    test_helpers::*,
};
use proptest::prelude::*;
use tokio::runtime::{
    Builder,
    Runtime,
};

fn runtime() -> Runtime {
    Builder::new_current_thread().enable_all().build().unwrap()
}

fn purchase() -> impl Strategy<Value = (Vec<u64>, u64, u64, u64)> {
    (prop::collection::vec(0u64..1_000, 0..5), 0u64..1_000, 1u64..4).prop_flat_map(
        |(holdings, claimed, count)| {
            let available: u64 = holdings.iter().sum::<u64>() + claimed;
            let max_unit = available / count;
            (
                Just(holdings),
                Just(claimed),
                Just(count),
                0..=max_unit,
            )
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 32, .. ProptestConfig::default() })]
    #[test]
    fn buy_auto_bakers__conserves_brownies((holdings, claimed, count, unit_price) in purchase()) {
        runtime().block_on(_buy_auto_bakers__conserves_brownies(holdings, claimed, count, unit_price))?;
    }

    #[test]
    fn claim_brownies__leaves_a_single_coin(holdings in prop::collection::vec(0u64..1_000, 0..5), claimed in 0u64..1_000) {
        runtime().block_on(_claim_brownies__leaves_a_single_coin(holdings, claimed))?;
    }
}

async fn _buy_auto_bakers__conserves_brownies(
    holdings: Vec<u64>,
    claimed: u64,
    count: u64,
    unit_price: u64,
) -> Result<(), TestCaseError> {
    let ctx = TestContext::new();
    let client = ctx.client();

    // given
    let ids: Vec<_> = holdings.iter().map(|b| ctx.give_brownies(*b)).collect();
    ctx.ledger().set_claim_yield(claimed);
    let before = ctx.brownie_balance();

    // when
    let result = client
        .buy_auto_bakers(ctx.player(), ctx.baking_account(), 1, count, unit_price)
        .await;

    // then
    prop_assert!(result.is_ok(), "{result:?}");
    let price = count * unit_price;
    prop_assert_eq!(before + claimed - price, ctx.brownie_balance());
    prop_assert_eq!(price, ctx.ledger().purchases()[0].brownies_paid);
    let coins = ctx.brownie_coins();
    prop_assert_eq!(1, coins.len());
    if let Some(first) = ids.first() {
        prop_assert_eq!(*first, coins[0].0);
    }
    Ok(())
}

async fn _claim_brownies__leaves_a_single_coin(
    holdings: Vec<u64>,
    claimed: u64,
) -> Result<(), TestCaseError> {
    let ctx = TestContext::new();
    let client = ctx.client();

    // given
    let ids: Vec<_> = holdings.iter().map(|b| ctx.give_brownies(*b)).collect();
    ctx.ledger().set_claim_yield(claimed);

    // when
    let result = client
        .claim_brownies(ctx.player(), ctx.baking_account())
        .await;

    // then
    prop_assert!(result.is_ok(), "{result:?}");
    let coins = ctx.brownie_coins();
    prop_assert_eq!(1, coins.len());
    prop_assert_eq!(holdings.iter().sum::<u64>() + claimed, coins[0].1);
    if let Some(first) = ids.first() {
        prop_assert_eq!(*first, coins[0].0);
    }
    Ok(())
}

#[tokio::test]
async fn with_completion__calls_back_once_after_finality() {
    let ctx = TestContext::new();
    let client = ctx.client();
    let mut digests = Vec::new();

    // when
    let receipt = with_completion(
        client.bake_by_hand(ctx.player(), ctx.baking_account()),
        |receipt| digests.push(receipt.digest().clone()),
    )
    .await
    .unwrap();

    // then
    assert_eq!(vec![receipt.digest().clone()], digests);
    assert_eq!(1, ctx.ledger().executed().len());
    assert_eq!("Baked 10 brownies", receipt.toast(ctx.config()).message);
}

#[tokio::test]
async fn with_completion__skips_callback_on_failure() {
    let ctx = TestContext::new();
    let client = ctx.client();
    ctx.ledger().set_offline(true);
    let mut called = false;

    let result = with_completion(
        client.claim_brownies(ctx.player(), ctx.baking_account()),
        |_| called = true,
    )
    .await;

    assert!(result.is_err());
    assert!(!called);
}
