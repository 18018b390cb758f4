mod helpers;

mod misc {
    use actix_web::{body::MessageBody, test, test::TestRequest, App};

    use crate::routes::health;

    #[actix_web::test]
    async fn health_endpoint() {
        let app = test::init_service(App::new().service(health)).await;
        let req = TestRequest::get().uri("/health").to_request();
        let (_req, res) = test::call_service(&app, req).await.into_parts();
        let status = res.status();
        let body = res.into_body().try_into_bytes().unwrap();
        assert!(status.is_success());
        assert_eq!(body, "👍️\n");
    }
}

mod webhooks {
    use actix_web::http::StatusCode;
    use enc_common::Paise;
    use razorpay_tools::signature;
    use settlement_engine::{db_types::PayoutStatus, SettlementDatabase, SqliteDatabase};

    use super::helpers::{capture_event, TestHarness, WEBHOOK_SECRET};

    #[actix_web::test]
    async fn a_signed_capture_event_settles_the_order() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_Wh001", alice, Paise::from_rupees(500)).await;

        let event = capture_event("pay_Wh1", "order_Wh001", Paise::from_rupees(500));
        let (status, body) = harness.post_webhook(&event, Some("evt_1")).await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert!(body.contains("Applied"), "body: {body}");
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(450));

        // the order status endpoint reflects the settlement
        let (status, body) = harness.get("/orders/order_Wh001/status").await;
        assert_eq!(status, StatusCode::OK);
        let response: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(response["status"], "Paid");
        assert_eq!(response["payment_id"], "pay_Wh1");
    }

    #[actix_web::test]
    async fn replayed_events_are_applied_exactly_once() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_Wh002", alice, Paise::from_rupees(500)).await;

        let event = capture_event("pay_Wh2", "order_Wh002", Paise::from_rupees(500));
        let (status, _) = harness.post_webhook(&event, Some("evt_2")).await;
        assert_eq!(status, StatusCode::OK);
        // same event id: short-circuited by the dedup set
        let (status, body) = harness.post_webhook(&event, Some("evt_2")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Already processed"), "body: {body}");
        // different event id, same payment: caught by the order status guard
        let (status, body) = harness.post_webhook(&event, Some("evt_3")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Already applied"), "body: {body}");
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(450));
    }

    #[actix_web::test]
    async fn forged_webhook_bodies_are_rejected() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_Wh003", alice, Paise::from_rupees(500)).await;

        let event = capture_event("pay_Wh3", "order_Wh003", Paise::from_rupees(500));
        let raw = event.to_string();
        let bad_sig = signature::sign(raw.as_bytes(), "not-the-webhook-secret");
        let (status, _) = harness.post_webhook_with_signature(&raw, &bad_sig, Some("evt_4")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        // nothing was applied
        assert_eq!(harness.balance_of(alice).await, Paise::from(0));

        let (status, _) = harness.post_webhook_with_signature(&raw, "", Some("evt_4")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[actix_web::test]
    async fn unknown_events_are_acknowledged_and_ignored() {
        let harness = TestHarness::new().await;
        let event = serde_json::json!({"event": "invoice.paid"});
        let (status, body) = harness.post_webhook(&event, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Ignored"), "body: {body}");
    }

    #[actix_web::test]
    async fn a_capture_for_an_unknown_order_is_acknowledged_without_settling() {
        let harness = TestHarness::new().await;
        let event = capture_event("pay_Ghost", "order_Ghost", Paise::from_rupees(100));
        let (status, body) = harness.post_webhook(&event, Some("evt_5")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Ignored"), "body: {body}");
    }

    #[actix_web::test]
    async fn a_transient_failure_is_retried_on_redelivery() {
        let mut harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_Wh008", alice, Paise::from_rupees(200)).await;
        let event = capture_event("pay_Wh8", "order_Wh008", Paise::from_rupees(200));
        let url = harness.db.url().to_string();

        // take the database away, so the dispatch fails after the event id was marked as seen
        harness.db.close().await.expect("close");
        let (status, body) = harness.post_webhook(&event, Some("evt_8")).await;
        assert!(status.is_server_error(), "a transient failure must ask for redelivery, got {status}: {body}");

        // the database comes back and the gateway redelivers the same event id; the eager mark must not block it
        harness.db = SqliteDatabase::new_with_url(&url, 5).await.expect("reopen");
        let (status, body) = harness.post_webhook(&event, Some("evt_8")).await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert!(body.contains(r#""message":"Applied""#), "body: {body}");
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(180));

        // and once applied, the replay guard holds again
        let (status, body) = harness.post_webhook(&event, Some("evt_8")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Already processed"), "body: {body}");
    }

    #[actix_web::test]
    async fn a_failed_payout_notification_refunds_the_creator() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator_with_bank_details("Alice").await;
        harness.register_ticket_order("order_Wh006", alice, Paise::from_rupees(500)).await;
        let event = capture_event("pay_Wh6", "order_Wh006", Paise::from_rupees(500));
        harness.post_webhook(&event, Some("evt_6")).await;

        // a payout of ₹100 was submitted to the gateway earlier
        let payouts = harness.payouts();
        payouts
            .record_payout(alice, Paise::from_rupees(100), "payout:1:10000:1", "pout_Wh6", PayoutStatus::Processing)
            .await
            .expect("Error recording payout");
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(350));

        let event = serde_json::json!({
            "event": "payout.reversed",
            "payload": { "payout": { "entity": {
                "id": "pout_Wh6",
                "status": "reversed",
                "amount": Paise::from_rupees(100),
                "reference_id": "payout:1:10000:1",
            }}}
        });
        let (status, body) = harness.post_webhook(&event, Some("evt_7")).await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        assert!(body.contains("Applied"), "body: {body}");
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(450));

        // the gateway re-sends the terminal notification; the refund must not double up
        let (status, body) = harness.post_webhook(&event, Some("evt_8")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("Already applied"), "body: {body}");
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(450));
    }
}

mod payments {
    use actix_web::http::StatusCode;
    use enc_common::Paise;
    use razorpay_tools::signature;

    use super::helpers::{TestHarness, KEY_SECRET};

    #[actix_web::test]
    async fn a_bad_checkout_signature_is_rejected() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_V001", alice, Paise::from_rupees(500)).await;

        // signed with the wrong secret, as a tampered client would
        let sig = signature::sign_payment("order_V001", "pay_V1", "wrong-secret");
        let body = serde_json::json!({"order_id": "order_V001", "payment_id": "pay_V1", "signature": sig});
        let (status, response) = harness.post_json("/payments/verify", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {response}");
        assert!(response.contains("signature does not match"), "response: {response}");
        assert_eq!(harness.balance_of(alice).await, Paise::from(0));

        // the failed attempt is visible on the status endpoint
        let (status, response) = harness.get("/orders/order_V001/status").await;
        assert_eq!(status, StatusCode::OK);
        let json: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(json["status"], "New");
        assert_eq!(json["verification"]["state"], "failed");
    }

    #[actix_web::test]
    async fn a_correctly_signed_tuple_still_needs_the_gateway() {
        // The signature is valid but the gateway is unreachable in tests, so verification must not settle anything.
        let harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_V002", alice, Paise::from_rupees(500)).await;

        let sig = signature::sign_payment("order_V002", "pay_V2", KEY_SECRET);
        let body = serde_json::json!({"order_id": "order_V002", "payment_id": "pay_V2", "signature": sig});
        let (status, _) = harness.post_json("/payments/verify", body).await;
        assert!(status.is_server_error() || status == StatusCode::GATEWAY_TIMEOUT || status == StatusCode::BAD_GATEWAY);
        assert_eq!(harness.balance_of(alice).await, Paise::from(0));
    }

    #[actix_web::test]
    async fn status_of_an_unknown_order_is_not_found() {
        let harness = TestHarness::new().await;
        let (status, _) = harness.get("/orders/order_Nope/status").await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

mod payouts {
    use actix_web::http::StatusCode;
    use enc_common::Paise;

    use super::helpers::TestHarness;

    #[actix_web::test]
    async fn payouts_with_insufficient_balance_never_reach_the_gateway() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator_with_bank_details("Alice").await;
        let body = serde_json::json!({"creator_id": alice, "amount": Paise::from_rupees(100)});
        let (status, response) = harness.post_json("/payouts", body).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "response: {response}");
        assert!(response.contains("Insufficient balance"), "response: {response}");
    }

    #[actix_web::test]
    async fn payouts_for_unknown_creators_are_not_found() {
        let harness = TestHarness::new().await;
        let body = serde_json::json!({"creator_id": 999, "amount": Paise::from_rupees(100)});
        let (status, _) = harness.post_json("/payouts", body).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[actix_web::test]
    async fn non_positive_payout_amounts_are_rejected() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator_with_bank_details("Alice").await;
        let body = serde_json::json!({"creator_id": alice, "amount": 0});
        let (status, _) = harness.post_json("/payouts", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[actix_web::test]
    async fn an_empty_checkout_basket_is_rejected_locally() {
        let harness = TestHarness::new().await;
        let body = serde_json::json!({"customer_id": "cust_1", "items": []});
        let (status, response) = harness.post_json("/orders", body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "response: {response}");
        assert!(response.contains("line item"), "response: {response}");
    }

    #[actix_web::test]
    async fn a_payout_retry_with_a_known_key_observes_the_original() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator_with_bank_details("Alice").await;
        harness.register_ticket_order("order_P001", alice, Paise::from_rupees(1000)).await;
        harness
            .settlements()
            .confirm_payment(&settlement_engine::db_types::OrderId::from("order_P001".to_string()), "pay_P1")
            .await
            .expect("settle");

        // the first submission reached the gateway and was recorded before the response was lost
        let payouts = harness.payouts();
        let original = payouts
            .record_payout(
                alice,
                Paise::from_rupees(200),
                "payout:1:20000:1",
                "pout_P1",
                settlement_engine::db_types::PayoutStatus::Processing,
            )
            .await
            .expect("Error recording payout");

        let body = serde_json::json!({
            "creator_id": alice,
            "amount": Paise::from_rupees(200),
            "idempotency_key": "payout:1:20000:1",
        });
        let (status, response) = harness.post_json("/payouts", body).await;
        assert_eq!(status, StatusCode::OK, "response: {response}");
        let json: serde_json::Value = serde_json::from_str(&response).unwrap();
        assert_eq!(json["payout"]["id"], original.id);
        assert_eq!(json["payout"]["transfer_id"], "pout_P1");
        // the balance was debited exactly once
        assert_eq!(harness.balance_of(alice).await, Paise::from_rupees(700));
    }

    #[actix_web::test]
    async fn balances_are_reported_per_revenue_stream() {
        let harness = TestHarness::new().await;
        let alice = harness.new_creator("Alice").await;
        harness.register_ticket_order("order_B001", alice, Paise::from_rupees(1000)).await;
        harness
            .settlements()
            .confirm_payment(&settlement_engine::db_types::OrderId::from("order_B001".to_string()), "pay_B1")
            .await
            .expect("settle");

        let (status, body) = harness.get(&format!("/creators/{alice}/balance")).await;
        assert_eq!(status, StatusCode::OK, "body: {body}");
        let json: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(json["available_balance"], 90_000);
        assert_eq!(json["event_revenue"], 90_000);
        assert_eq!(json["merch_revenue"], 0);

        let (status, body) = harness.get(&format!("/creators/{alice}/history")).await;
        assert_eq!(status, StatusCode::OK);
        let history: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(history.as_array().unwrap().len(), 1);
        assert_eq!(history[0]["creator_net"], 90_000);
    }
}
