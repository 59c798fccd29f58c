mod common;

use alloy::primitives::U256;
use common::{client, test_config, Counters, FakeFactory, ONE_TOKEN, TEST_KEY};
use infer_client::{ComputeClient, ErrorKind};

async fn funded(total: u128, locked: u128) -> (FakeFactory, ComputeClient<FakeFactory>) {
    let factory = FakeFactory::new().with_ledger(total, locked);
    let client = client(factory.clone());
    client.initialize(&test_config(TEST_KEY)).await.unwrap();
    (factory, client)
}

#[tokio::test]
async fn balances_in_display_units() {
    let (_, client) = funded(5 * ONE_TOKEN, ONE_TOKEN + ONE_TOKEN / 2).await;

    assert_eq!(client.get_balance().await.unwrap(), 5.0);
    assert_eq!(client.get_locked_balance().await.unwrap(), 1.5);
    assert_eq!(client.get_available_balance().await.unwrap(), 3.5);
}

#[tokio::test]
async fn over_locked_ledger_has_nothing_available() {
    let (_, client) = funded(ONE_TOKEN, 2 * ONE_TOKEN).await;
    assert_eq!(client.get_available_balance().await.unwrap(), 0.0);
}

#[tokio::test]
async fn deposit_adds_raw_units() {
    let (factory, client) = funded(ONE_TOKEN, 0).await;

    client.deposit(0.25).await.unwrap();
    assert_eq!(Counters::get(&factory.calls().deposits), 1);
    assert_eq!(
        factory.state.ledger.lock().unwrap().total_balance,
        U256::from(ONE_TOKEN + ONE_TOKEN / 4)
    );
    assert_eq!(client.get_balance().await.unwrap(), 1.25);
}

#[tokio::test]
async fn withdraw_within_available_balance() {
    let (factory, client) = funded(3 * ONE_TOKEN, ONE_TOKEN).await;

    client.withdraw(2.0).await.unwrap();
    assert_eq!(
        factory.state.ledger.lock().unwrap().total_balance,
        U256::from(ONE_TOKEN)
    );
    assert_eq!(client.get_available_balance().await.unwrap(), 0.0);
}

#[tokio::test]
async fn withdraw_beyond_available_is_insufficient_funds() {
    let (factory, client) = funded(3 * ONE_TOKEN, ONE_TOKEN).await;

    let err = client.withdraw(2.5).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InsufficientFunds);
    assert!(err.to_string().contains("2.5"), "{err}");
    assert_eq!(
        factory.state.ledger.lock().unwrap().total_balance,
        U256::from(3 * ONE_TOKEN)
    );
}

#[tokio::test]
async fn non_positive_amounts_never_reach_the_broker() {
    let (factory, client) = funded(ONE_TOKEN, 0).await;

    for amount in [0.0, -1.0, f64::NAN] {
        let err = client.deposit(amount).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "deposit {amount}");
        let err = client.withdraw(amount).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation, "withdraw {amount}");
    }
    assert_eq!(Counters::get(&factory.calls().deposits), 0);
    assert_eq!(Counters::get(&factory.calls().refunds), 0);
}
