//! End-to-end settlement flows against a real SQLite database.
use enc_common::Paise;
use settlement_engine::{
    db_types::{NewCreator, NewOrder, NewOrderItem, NewSubscription, OrderId, OrderStatusType, ProductType, SubscriptionStatus},
    events::EventProducers,
    revenue::CostTable,
    LedgerManagement,
    SettlementApi,
    SettlementDatabase,
    SettlementError,
    SqliteDatabase,
};

mod support;
use support::{prepare_test_env, random_db_path};

async fn new_db() -> SqliteDatabase {
    let url = random_db_path();
    prepare_test_env(&url).await;
    SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database")
}

fn api(db: SqliteDatabase) -> SettlementApi<SqliteDatabase> {
    SettlementApi::new(db, CostTable::default(), EventProducers::default())
}

async fn creator(db: &SqliteDatabase, name: &str) -> i64 {
    db.insert_creator(NewCreator::new(name)).await.expect("Error creating creator")
}

#[tokio::test]
async fn settling_an_order_credits_every_line_item() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let bob = creator(&db, "Bob").await;
    let order = NewOrder::new(OrderId::from("order_Mix001".to_string()), "cust_1".to_string(), Paise::from_rupees(1500))
        .with_item(NewOrderItem {
            creator_id: alice,
            product_type: ProductType::Merchandise,
            category: Some("tshirt".to_string()),
            quantity: 1,
            gross: Paise::from_rupees(1000),
        })
        .with_item(NewOrderItem {
            creator_id: bob,
            product_type: ProductType::EventTicket,
            category: None,
            quantity: 1,
            gross: Paise::from_rupees(500),
        });
    let api = api(db.clone());
    api.register_order(order).await.expect("Error registering order");

    let records = api.confirm_payment(&OrderId::from("order_Mix001".to_string()), "pay_001").await.expect("settle");
    assert_eq!(records.len(), 2);

    // ₹1000 of tshirt with a ₹250 unit cost: 1000 - 250 - 100 = ₹650 for Alice
    let alice_acc = db.fetch_creator(alice).await.unwrap().unwrap();
    assert_eq!(alice_acc.available_balance, Paise::from_rupees(650));
    assert_eq!(alice_acc.merch_revenue, Paise::from_rupees(650));

    // ₹500 ticket: 90% of the gross for Bob
    let bob_acc = db.fetch_creator(bob).await.unwrap().unwrap();
    assert_eq!(bob_acc.available_balance, Paise::from_rupees(450));
    assert_eq!(bob_acc.event_revenue, Paise::from_rupees(450));

    let order = db.fetch_order_by_order_id(&OrderId::from("order_Mix001".to_string())).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_id.as_deref(), Some("pay_001"));
}

#[tokio::test]
async fn a_second_confirmation_cannot_double_credit() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let oid = OrderId::from("order_Dup001".to_string());
    let order = NewOrder::new(oid.clone(), "cust_1".to_string(), Paise::from_rupees(500)).with_item(NewOrderItem {
        creator_id: alice,
        product_type: ProductType::EventTicket,
        category: None,
        quantity: 1,
        gross: Paise::from_rupees(500),
    });
    let api = api(db.clone());
    api.register_order(order).await.unwrap();

    api.confirm_payment(&oid, "pay_A").await.expect("first settle");
    let err = api.confirm_payment(&oid, "pay_B").await.expect_err("duplicate settle must fail");
    assert!(matches!(err, SettlementError::OrderAlreadySettled(_)), "got {err}");

    let acc = db.fetch_creator(alice).await.unwrap().unwrap();
    assert_eq!(acc.available_balance, Paise::from_rupees(450));
    // the first payment id sticks
    let order = db.fetch_order_by_order_id(&oid).await.unwrap().unwrap();
    assert_eq!(order.payment_id.as_deref(), Some("pay_A"));
}

#[tokio::test]
async fn registering_an_order_twice_is_harmless() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let oid = OrderId::from("order_Re001".to_string());
    let order = NewOrder::new(oid.clone(), "cust_1".to_string(), Paise::from_rupees(100)).with_item(NewOrderItem {
        creator_id: alice,
        product_type: ProductType::Merchandise,
        category: Some("sticker".to_string()),
        quantity: 2,
        gross: Paise::from_rupees(100),
    });
    let api = api(db.clone());
    let first = api.register_order(order.clone()).await.unwrap();
    let second = api.register_order(order).await.unwrap();
    assert_eq!(first.id, second.id);
    let items = db.fetch_order_items(first.id).await.unwrap();
    assert_eq!(items.len(), 1, "items must not be duplicated on replay");
}

#[tokio::test]
async fn creator_subscription_credits_the_full_gross() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let oid = OrderId::from("order_Sub001".to_string());
    let api = api(db.clone());
    api.register_subscription(NewSubscription {
        subscription_id: "sub_001".to_string(),
        gateway_order_id: oid.clone(),
        creator_id: Some(alice),
        subscriber_id: "fan_9".to_string(),
        amount: Paise::from_rupees(299),
    })
    .await
    .unwrap();

    let records = api.confirm_payment(&oid, "pay_S1").await.expect("activate");
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].creator_net, Paise::from_rupees(299));

    let sub = db.fetch_subscription_by_order(&oid).await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
    let acc = db.fetch_creator(alice).await.unwrap().unwrap();
    assert_eq!(acc.available_balance, Paise::from_rupees(299));
    assert_eq!(acc.subscription_revenue, Paise::from_rupees(299));

    // replaying the activation is rejected
    let err = api.confirm_payment(&oid, "pay_S1").await.expect_err("duplicate activation");
    assert!(matches!(err, SettlementError::SubscriptionAlreadyActive(_)), "got {err}");
}

#[tokio::test]
async fn platform_subscription_credits_no_creator() {
    let db = new_db().await;
    let oid = OrderId::from("order_Sub002".to_string());
    let api = api(db.clone());
    api.register_subscription(NewSubscription {
        subscription_id: "sub_002".to_string(),
        gateway_order_id: oid.clone(),
        creator_id: None,
        subscriber_id: "fan_10".to_string(),
        amount: Paise::from_rupees(499),
    })
    .await
    .unwrap();
    let records = api.confirm_payment(&oid, "pay_S2").await.expect("activate");
    assert!(records.is_empty());
    let sub = db.fetch_subscription_by_order(&oid).await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Active);
}

#[tokio::test]
async fn a_cancelled_subscription_is_visible_on_the_next_connection() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let oid = OrderId::from("order_Sub003".to_string());
    let api = api(db.clone());
    api.register_subscription(NewSubscription {
        subscription_id: "sub_003".to_string(),
        gateway_order_id: oid.clone(),
        creator_id: Some(alice),
        subscriber_id: "fan_11".to_string(),
        amount: Paise::from_rupees(299),
    })
    .await
    .unwrap();
    api.confirm_payment(&oid, "pay_S3").await.unwrap();

    let sub = api.cancel_subscription("sub_003").await.unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);
    // the write must be committed by the time the call returns, so whichever pool connection serves the next
    // read sees it
    let sub = db.fetch_subscription_by_order(&oid).await.unwrap().unwrap();
    assert_eq!(sub.status, SubscriptionStatus::Cancelled);
}

#[tokio::test]
async fn confirming_an_unknown_order_fails() {
    let db = new_db().await;
    let api = api(db);
    let err = api.confirm_payment(&OrderId::from("order_Ghost".to_string()), "pay_X").await.expect_err("must fail");
    assert!(matches!(err, SettlementError::NothingToSettle(_)), "got {err}");
}

#[tokio::test]
async fn stale_orders_expire_but_paid_ones_do_not() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let api = api(db.clone());
    let stale = OrderId::from("order_Stale".to_string());
    let fresh = OrderId::from("order_Fresh".to_string());
    for oid in [&stale, &fresh] {
        let order = NewOrder::new(oid.clone(), "cust_1".to_string(), Paise::from_rupees(100)).with_item(NewOrderItem {
            creator_id: alice,
            product_type: ProductType::EventTicket,
            category: None,
            quantity: 1,
            gross: Paise::from_rupees(100),
        });
        api.register_order(order).await.unwrap();
    }
    api.confirm_payment(&fresh, "pay_F").await.unwrap();

    // Everything in this test was created moments ago, so a zero-width window expires exactly the unpaid order.
    let expired = api.expire_old_orders(chrono::Duration::zero()).await.unwrap();
    assert_eq!(expired.len(), 1);
    assert_eq!(expired[0].order_id, stale);
    assert_eq!(expired[0].status, OrderStatusType::Expired);

    let fresh_order = db.fetch_order_by_order_id(&fresh).await.unwrap().unwrap();
    assert_eq!(fresh_order.status, OrderStatusType::Paid);
}

#[tokio::test]
async fn a_capture_that_arrives_after_expiry_still_settles() {
    let db = new_db().await;
    let alice = creator(&db, "Alice").await;
    let oid = OrderId::from("order_Slow001".to_string());
    let order = NewOrder::new(oid.clone(), "cust_1".to_string(), Paise::from_rupees(500)).with_item(NewOrderItem {
        creator_id: alice,
        product_type: ProductType::EventTicket,
        category: None,
        quantity: 1,
        gross: Paise::from_rupees(500),
    });
    let api = api(db.clone());
    api.register_order(order).await.unwrap();

    let expired = api.expire_old_orders(chrono::Duration::zero()).await.unwrap();
    assert_eq!(expired.len(), 1);

    // The order was auto-captured, so the customer has been charged; the expiry sweep must not eat the credit.
    let records = api.confirm_payment(&oid, "pay_Late").await.expect("late settle");
    assert_eq!(records.len(), 1);
    let order = db.fetch_order_by_order_id(&oid).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatusType::Paid);
    assert_eq!(order.payment_id.as_deref(), Some("pay_Late"));
    let acc = db.fetch_creator(alice).await.unwrap().unwrap();
    assert_eq!(acc.available_balance, Paise::from_rupees(450));

    // and a second confirmation still cannot double-credit
    let err = api.confirm_payment(&oid, "pay_Later").await.expect_err("duplicate settle");
    assert!(matches!(err, SettlementError::OrderAlreadySettled(_)), "got {err}");
}
