mod common;

use serial_test::serial;
use xchange_core::error::EngineError;
use xchange_core::models::{OrderStatus, Side};

use common::{balance_of, create_instrument, create_user, engine, fund, setup_db};

const CASH: &str = "CASH";
const MEM: &str = "MEM";

#[tokio::test]
#[serial]
async fn s1_simple_cross_full_fill_both_sides() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 1000).await;
    fund(&pool, bob, MEM, 10).await;

    let eng = engine(pool.clone());

    let b1 = eng.submit_limit(bob, MEM, Side::Sell, 5, 100).await.unwrap();
    let a1 = eng.submit_limit(alice, MEM, Side::Buy, 5, 100).await.unwrap();

    assert_eq!(balance_of(&pool, alice, CASH).await, (500, 0));
    assert_eq!(balance_of(&pool, alice, MEM).await, (5, 0));
    assert_eq!(balance_of(&pool, bob, CASH).await, (500, 0));
    assert_eq!(balance_of(&pool, bob, MEM).await, (5, 0));

    let order_a1 = eng.get_order(a1).await.unwrap();
    let order_b1 = eng.get_order(b1).await.unwrap();
    assert_eq!(order_a1.status, OrderStatus::Executed);
    assert_eq!(order_b1.status, OrderStatus::Executed);

    let tape = eng.get_tape(MEM, 10).await.unwrap();
    assert_eq!(tape.len(), 1);
    assert_eq!(tape[0].quantity, 5);
    assert_eq!(tape[0].price, 100);
    assert_eq!(tape[0].buyer_order_id, a1);
    assert_eq!(tape[0].seller_order_id, b1);
}

#[tokio::test]
#[serial]
async fn s2_partial_fill_taker_rests() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 1000).await;
    fund(&pool, bob, MEM, 10).await;

    let eng = engine(pool.clone());

    let b1 = eng.submit_limit(bob, MEM, Side::Sell, 3, 50).await.unwrap();
    let a1 = eng.submit_limit(alice, MEM, Side::Buy, 5, 50).await.unwrap();

    let order_b1 = eng.get_order(b1).await.unwrap();
    let order_a1 = eng.get_order(a1).await.unwrap();
    assert_eq!(order_b1.status, OrderStatus::Executed);
    assert_eq!(order_a1.status, OrderStatus::PartiallyExecuted);
    assert_eq!(order_a1.filled, 3);

    assert_eq!(balance_of(&pool, alice, CASH).await, (850, 100));
    assert_eq!(balance_of(&pool, alice, MEM).await, (3, 0));
    assert_eq!(balance_of(&pool, bob, CASH).await, (150, 0));
    assert_eq!(balance_of(&pool, bob, MEM).await, (7, 0));
}

#[tokio::test]
#[serial]
async fn s3_cancel_releases_remainder() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 1000).await;
    fund(&pool, bob, MEM, 10).await;

    let eng = engine(pool.clone());
    eng.submit_limit(bob, MEM, Side::Sell, 3, 50).await.unwrap();
    let a1 = eng.submit_limit(alice, MEM, Side::Buy, 5, 50).await.unwrap();

    eng.cancel(alice, a1).await.unwrap();

    let order_a1 = eng.get_order(a1).await.unwrap();
    assert_eq!(order_a1.status, OrderStatus::Cancelled);
    assert_eq!(order_a1.filled, 3);
    assert_eq!(balance_of(&pool, alice, CASH).await, (850, 0));
}

#[tokio::test]
#[serial]
async fn s4_market_buy_consumes_multiple_levels_at_maker_prices() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 10000).await;
    fund(&pool, bob, MEM, 10).await;

    let eng = engine(pool.clone());
    let s1 = eng.submit_limit(bob, MEM, Side::Sell, 2, 100).await.unwrap();
    let s2 = eng.submit_limit(bob, MEM, Side::Sell, 3, 110).await.unwrap();

    let a1 = eng.submit_market(alice, MEM, Side::Buy, 4).await.unwrap();

    assert_eq!(balance_of(&pool, alice, CASH).await, (10000 - 420, 0));
    assert_eq!(balance_of(&pool, alice, MEM).await, (4, 0));

    let order_s1 = eng.get_order(s1).await.unwrap();
    let order_s2 = eng.get_order(s2).await.unwrap();
    let order_a1 = eng.get_order(a1).await.unwrap();
    assert_eq!(order_s1.status, OrderStatus::Executed);
    assert_eq!(order_s2.status, OrderStatus::PartiallyExecuted);
    assert_eq!(order_s2.filled, 2);
    assert_eq!(order_a1.status, OrderStatus::Executed);

    let tape = eng.get_tape(MEM, 10).await.unwrap();
    assert_eq!(tape.len(), 2);
    // Newest first.
    assert_eq!(tape[0].price, 110);
    assert_eq!(tape[0].quantity, 2);
    assert_eq!(tape[1].price, 100);
    assert_eq!(tape[1].quantity, 2);
}

#[tokio::test]
#[serial]
async fn s5_market_order_with_insufficient_liquidity_is_rejected() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 10000).await;
    fund(&pool, bob, MEM, 10).await;

    let eng = engine(pool.clone());
    eng.submit_limit(bob, MEM, Side::Sell, 1, 100).await.unwrap();

    let result = eng.submit_market(alice, MEM, Side::Buy, 5).await;
    assert!(matches!(result, Err(EngineError::NoLiquidity)));

    assert_eq!(balance_of(&pool, alice, CASH).await, (10000, 0));
    let orders = eng.list_orders(alice, 10, 0).await.unwrap();
    assert!(orders.is_empty());
}

#[tokio::test]
#[serial]
async fn market_sell_is_rejected_wholesale_when_bid_side_cannot_absorb_it() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, MEM, 10).await;
    fund(&pool, bob, CASH, 100).await;

    let eng = engine(pool.clone());
    eng.submit_limit(bob, MEM, Side::Buy, 1, 100).await.unwrap();

    let result = eng.submit_market(alice, MEM, Side::Sell, 5).await;
    assert!(matches!(result, Err(EngineError::NoLiquidity)));
    assert_eq!(balance_of(&pool, alice, MEM).await, (10, 0));
}

#[tokio::test]
#[serial]
async fn unknown_instrument_is_rejected_before_any_reservation() {
    let pool = setup_db().await;
    let alice = create_user(&pool).await;
    fund(&pool, alice, CASH, 1000).await;

    let eng = engine(pool.clone());
    let result = eng.submit_limit(alice, "ZZZ", Side::Buy, 1, 10).await;
    assert!(matches!(result, Err(EngineError::UnknownInstrument(_))));
    assert_eq!(balance_of(&pool, alice, CASH).await, (1000, 0));
}

#[tokio::test]
#[serial]
async fn cancel_by_non_owner_is_forbidden() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 1000).await;

    let eng = engine(pool.clone());
    let a1 = eng.submit_limit(alice, MEM, Side::Buy, 1, 10).await.unwrap();

    let result = eng.cancel(bob, a1).await;
    assert!(matches!(result, Err(EngineError::Forbidden)));
}

#[tokio::test]
#[serial]
async fn cancelling_a_terminal_order_is_a_conflict() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let alice = create_user(&pool).await;
    let bob = create_user(&pool).await;
    fund(&pool, alice, CASH, 1000).await;
    fund(&pool, bob, MEM, 10).await;

    let eng = engine(pool.clone());
    eng.submit_limit(bob, MEM, Side::Sell, 5, 100).await.unwrap();
    let a1 = eng.submit_limit(alice, MEM, Side::Buy, 5, 100).await.unwrap();

    let result = eng.cancel(alice, a1).await;
    assert!(matches!(result, Err(EngineError::Conflict(_))));
}

#[tokio::test]
#[serial]
async fn price_time_priority_prefers_best_price_then_oldest() {
    let pool = setup_db().await;
    create_instrument(&pool, MEM).await;
    let bob = create_user(&pool).await;
    let carol = create_user(&pool).await;
    let alice = create_user(&pool).await;
    fund(&pool, bob, MEM, 10).await;
    fund(&pool, carol, MEM, 10).await;
    fund(&pool, alice, CASH, 10000).await;

    let eng = engine(pool.clone());
    // Carol quotes a worse price first; Bob quotes a better price second.
    let carol_order = eng.submit_limit(carol, MEM, Side::Sell, 5, 110).await.unwrap();
    let bob_order = eng.submit_limit(bob, MEM, Side::Sell, 5, 100).await.unwrap();

    eng.submit_limit(alice, MEM, Side::Buy, 5, 120).await.unwrap();

    let tape = eng.get_tape(MEM, 10).await.unwrap();
    assert_eq!(tape.len(), 1);
    assert_eq!(tape[0].price, 100);
    assert_eq!(tape[0].seller_order_id, bob_order);

    let carol_status = eng.get_order(carol_order).await.unwrap().status;
    assert_eq!(carol_status, OrderStatus::New);
}
