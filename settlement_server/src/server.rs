use std::{sync::Arc, time::Duration};

use actix_web::{http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use razorpay_tools::RazorpayApi;
use settlement_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    revenue::CostTable,
    LedgerApi,
    PayoutApi,
    SettlementApi,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    errors::ServerError,
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
    sweep_worker::start_sweep_worker,
    tracker::PaymentTracker,
    webhook::ProcessedEvents,
};

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, 25)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let tracker = Arc::new(PaymentTracker::new(config.tracker_ttl));
    let processed = Arc::new(ProcessedEvents::new(config.processed_events_capacity));

    let mut hooks = EventHooks::default();
    hooks.on_order_settled(|ev| {
        Box::pin(async move {
            info!("📬️ Order [{}] settled. {} ledger entries written.", ev.order.order_id, ev.transactions.len());
        })
    });
    hooks.on_payout_finalized(|ev| {
        Box::pin(async move {
            info!("📬️ Payout {} for creator {} finalized as {}", ev.payout.id, ev.payout.creator_id, ev.payout.status);
        })
    });
    let handlers = EventHandlers::new(25, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    start_sweep_worker(db.clone(), Arc::clone(&tracker), &config);

    let srv = create_server_instance(config, db, producers, tracker, processed)?;
    srv.await.map_err(|e| ServerError::Unspecified(e.to_string()))
}

pub fn create_server_instance(
    config: ServerConfig,
    db: SqliteDatabase,
    producers: EventProducers,
    tracker: Arc<PaymentTracker>,
    processed: Arc<ProcessedEvents>,
) -> Result<actix_web::dev::Server, ServerError> {
    let bind_address = (config.host.clone(), config.port);
    let gateway =
        RazorpayApi::new(config.razorpay.clone()).map_err(|e| ServerError::InitializeError(e.to_string()))?;
    let srv = HttpServer::new(move || {
        let cost_table = CostTable::from_env_or_default();
        let settlements = SettlementApi::new(db.clone(), cost_table, producers.clone());
        let payouts = PayoutApi::new(db.clone(), producers.clone());
        let ledger = LedgerApi::new(db.clone());
        let app = App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("ese::access_log"))
            .app_data(web::Data::new(settlements))
            .app_data(web::Data::new(payouts))
            .app_data(web::Data::new(ledger))
            .app_data(web::Data::new(gateway.clone()))
            .app_data(web::Data::new(config.clone()))
            .app_data(web::Data::from(Arc::clone(&tracker)))
            .app_data(web::Data::from(Arc::clone(&processed)));
        // The webhook sink sits behind the HMAC check; everything else is plain.
        let webhook_scope = web::scope("/gateway")
            .wrap(HmacMiddlewareFactory::new(
                config.razorpay.webhook_secret.clone(),
                config.webhook_signature_checks,
            ))
            .service(webhook);
        app.service(health)
            .service(create_order)
            .service(create_subscription)
            .service(verify_payment)
            .service(order_status)
            .service(submit_payout)
            .service(creator_balance)
            .service(creator_history)
            .service(webhook_scope)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .bind(bind_address)?
    .run();
    Ok(srv)
}
