mod common;

use serial_test::serial;
use xchange_core::models::{OrderStatus, Side};

use common::{balance_of, create_instrument, create_user, engine, fund, setup_db};

const CASH: &str = "CASH";
const MEM: &str = "MEM";

/// S6: a cancel racing a crossing buy against the same resting order must
/// serialize into exactly one of two valid terminal states, never a
/// partial settlement of only one side.
#[tokio::test]
#[serial]
async fn concurrent_cancel_vs_fill_is_serialized() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let bob = create_user(&pool).await;
    let alice = create_user(&pool).await;
    fund(&pool, bob, MEM, 5).await;
    fund(&pool, alice, CASH, 10000).await;

    let eng = engine(pool.clone());
    let b1 = eng.submit_limit(bob, MEM, Side::Sell, 5, 100).await.unwrap();

    let cancel_eng = eng.clone();
    let buy_eng = eng.clone();
    let (cancel_result, buy_result) = tokio::join!(
        async move { cancel_eng.cancel(bob, b1).await },
        async move { buy_eng.submit_limit(alice, MEM, Side::Buy, 5, 100).await }
    );

    let b1_final = eng.get_order(b1).await.unwrap();
    assert!(b1_final.status.is_terminal());

    match (cancel_result.is_ok(), buy_result.is_ok()) {
        (true, true) => {
            // Cancel won the race: B1 is cancelled, Alice's order rests
            // unfilled with its full reservation intact.
            assert_eq!(b1_final.status, OrderStatus::Cancelled);
            let a1 = eng.get_order(buy_result.unwrap()).await.unwrap();
            assert_eq!(a1.status, OrderStatus::New);
            assert_eq!(balance_of(&pool, alice, CASH).await, (10000, 500));
        }
        (false, true) => {
            // The cross won: both orders executed, one trade recorded.
            assert_eq!(b1_final.status, OrderStatus::Executed);
            let a1 = eng.get_order(buy_result.unwrap()).await.unwrap();
            assert_eq!(a1.status, OrderStatus::Executed);
            let tape = eng.get_tape(MEM, 10).await.unwrap();
            assert_eq!(tape.len(), 1);
            assert_eq!(balance_of(&pool, alice, CASH).await, (9500, 0));
            assert_eq!(balance_of(&pool, bob, CASH).await, (500, 0));
        }
        other => panic!("unexpected combination of outcomes: {other:?}"),
    }
}
