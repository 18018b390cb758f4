use std::sync::Arc;

use actix_web::{http::StatusCode, test, test::TestRequest, web, App};
use enc_common::{Paise, Secret};
use razorpay_tools::{signature, RazorpayApi};
use settlement_engine::{
    db_types::{NewCreator, NewOrder, NewOrderItem, OrderId, ProductType},
    events::EventProducers,
    revenue::CostTable,
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    LedgerApi,
    LedgerManagement,
    PayoutApi,
    SettlementApi,
    SettlementDatabase,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    middleware::HmacMiddlewareFactory,
    routes::{
        create_order,
        create_subscription,
        creator_balance,
        creator_history,
        health,
        order_status,
        submit_payout,
        verify_payment,
        webhook,
    },
    tracker::PaymentTracker,
    webhook::ProcessedEvents,
};

// Test-only credentials. DO NOT re-use these anywhere.
pub const WEBHOOK_SECRET: &str = "test_webhook_secret_123";
pub const KEY_SECRET: &str = "test_key_secret_456";

/// A full server configuration over a throwaway SQLite database. Each request builds a fresh app over the shared
/// state, mirroring what `create_server_instance` wires up.
pub struct TestHarness {
    pub db: SqliteDatabase,
    config: ServerConfig,
    tracker: Arc<PaymentTracker>,
    processed: Arc<ProcessedEvents>,
}

impl TestHarness {
    pub async fn new() -> Self {
        let url = random_db_path();
        prepare_test_env(&url).await;
        let db = SqliteDatabase::new_with_url(&url, 5).await.expect("Error creating database");
        let mut config = ServerConfig::default();
        config.razorpay.key_secret = Secret::new(KEY_SECRET.to_string());
        config.razorpay.webhook_secret = Secret::new(WEBHOOK_SECRET.to_string());
        config.razorpay.payout_account_number = "2323230041626905".to_string();
        // Tests must never reach the real gateway. Calls that get past the precondition checks fail fast instead.
        config.razorpay.api_base = "http://127.0.0.1:9/v1".to_string();
        let tracker = Arc::new(PaymentTracker::new(chrono::Duration::hours(1)));
        let processed = Arc::new(ProcessedEvents::new(100));
        Self { db, config, tracker, processed }
    }

    pub fn settlements(&self) -> SettlementApi<SqliteDatabase> {
        SettlementApi::new(self.db.clone(), CostTable::default(), EventProducers::default())
    }

    pub fn payouts(&self) -> PayoutApi<SqliteDatabase> {
        PayoutApi::new(self.db.clone(), EventProducers::default())
    }

    pub async fn get(&self, path: &str) -> (StatusCode, String) {
        self.call(TestRequest::get().uri(path).to_request()).await
    }

    pub async fn post_json(&self, path: &str, body: serde_json::Value) -> (StatusCode, String) {
        self.call(TestRequest::post().uri(path).set_json(body).to_request()).await
    }

    /// Posts a webhook body signed with the shared webhook secret, the way the gateway would deliver it.
    pub async fn post_webhook(&self, body: &serde_json::Value, event_id: Option<&str>) -> (StatusCode, String) {
        let raw = body.to_string();
        let sig = signature::sign(raw.as_bytes(), WEBHOOK_SECRET);
        self.post_webhook_with_signature(&raw, &sig, event_id).await
    }

    pub async fn post_webhook_with_signature(
        &self,
        raw_body: &str,
        sig: &str,
        event_id: Option<&str>,
    ) -> (StatusCode, String) {
        let mut req = TestRequest::post()
            .uri("/gateway/webhook")
            .insert_header(("X-Razorpay-Signature", sig))
            .insert_header(("Content-Type", "application/json"))
            .set_payload(raw_body.to_string());
        if let Some(id) = event_id {
            req = req.insert_header(("x-razorpay-event-id", id));
        }
        self.call(req.to_request()).await
    }

    async fn call(&self, req: actix_http::Request) -> (StatusCode, String) {
        let app = App::new()
            .app_data(web::Data::new(self.settlements()))
            .app_data(web::Data::new(self.payouts()))
            .app_data(web::Data::new(LedgerApi::new(self.db.clone())))
            .app_data(web::Data::new(RazorpayApi::new(self.config.razorpay.clone()).expect("client")))
            .app_data(web::Data::new(self.config.clone()))
            .app_data(web::Data::from(Arc::clone(&self.tracker)))
            .app_data(web::Data::from(Arc::clone(&self.processed)))
            .service(health)
            .service(create_order)
            .service(create_subscription)
            .service(verify_payment)
            .service(order_status)
            .service(submit_payout)
            .service(creator_balance)
            .service(creator_history)
            .service(
                web::scope("/gateway")
                    .wrap(HmacMiddlewareFactory::new(self.config.razorpay.webhook_secret.clone(), true))
                    .service(webhook),
            );
        let service = test::init_service(app).await;
        match test::try_call_service(&service, req).await {
            Ok(res) => {
                let status = res.status();
                let body = String::from_utf8_lossy(&test::read_body(res).await).into_owned();
                (status, body)
            },
            Err(e) => (e.as_response_error().status_code(), e.to_string()),
        }
    }

    pub async fn new_creator(&self, name: &str) -> i64 {
        self.db.insert_creator(NewCreator::new(name)).await.expect("Error creating creator")
    }

    pub async fn new_creator_with_bank_details(&self, name: &str) -> i64 {
        let creator = NewCreator {
            name: name.to_string(),
            bank_account_name: Some(name.to_string()),
            bank_ifsc: Some("HDFC0001234".to_string()),
            bank_account_number: Some("50100123456789".to_string()),
        };
        self.db.insert_creator(creator).await.expect("Error creating creator")
    }

    /// Registers a single-ticket order for `creator_id`. Settling it credits 90% of `gross`.
    pub async fn register_ticket_order(&self, order_id: &str, creator_id: i64, gross: Paise) {
        let order = NewOrder::new(OrderId::from(order_id.to_string()), "cust_1".to_string(), gross).with_item(
            NewOrderItem {
                creator_id,
                product_type: ProductType::EventTicket,
                category: None,
                quantity: 1,
                gross,
            },
        );
        self.settlements().register_order(order).await.expect("Error registering order");
    }

    pub async fn balance_of(&self, creator_id: i64) -> Paise {
        self.db.fetch_creator(creator_id).await.expect("db error").expect("no such creator").available_balance
    }
}

pub fn capture_event(payment_id: &str, order_id: &str, amount: Paise) -> serde_json::Value {
    serde_json::json!({
        "event": "payment.captured",
        "payload": { "payment": { "entity": {
            "id": payment_id,
            "order_id": order_id,
            "status": "captured",
            "amount": amount,
        }}}
    })
}
