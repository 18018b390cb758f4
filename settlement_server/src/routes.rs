//! Request handler definitions
//!
//! Define each route and its handler here. Webhook dispatch logic lives in [`crate::webhook`]; everything here is
//! the HTTP skin over the engine APIs.
//!
//! A note about performance:
//! Since each worker thread processes its requests sequentially, handlers which block the current thread will cause
//! the current worker to stop processing new requests. Every gateway call and database query in this module is
//! awaited, never blocked on, so a slow gateway holds up one request rather than one worker.
use actix_web::{get, post, web, HttpRequest, HttpResponse, Responder};
use enc_common::Paise;
use log::*;
use razorpay_tools::{helpers, signature, BankAccountDetails, NewFundAccount, NewPayoutRequest, RazorpayApi};
use settlement_engine::{
    db_types::{NewOrder, NewOrderItem, NewSubscription, OrderId, PayoutStatus},
    LedgerApi,
    PayoutApi,
    SettlementApi,
    SettlementError,
    SqliteDatabase,
};

use crate::{
    config::ServerConfig,
    data_objects::{
        BalanceResponse,
        CheckoutRequest,
        CheckoutResponse,
        JsonResponse,
        OrderStatusResponse,
        PayoutRequest,
        PayoutResponse,
        SubscriptionCheckoutRequest,
        SubscriptionCheckoutResponse,
        VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    errors::ServerError,
    tracker::{PaymentTracker, TrackedStatus},
    webhook::{dispatch_event, DispatchOutcome, ProcessedEvents, WebhookEnvelope},
};

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------  Checkout  ---------------------------------------------------
/// Open a commerce order: create the payment order at the gateway, then register it (and its line items) in the
/// ledger so a later capture event knows what to credit. The gateway order id is the join key between the two.
#[post("/orders")]
pub async fn create_order(
    body: web::Json<CheckoutRequest>,
    gateway: web::Data<RazorpayApi>,
    settlements: web::Data<SettlementApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    if req.items.is_empty() {
        return Err(ServerError::InvalidRequestBody("An order needs at least one line item".to_string()));
    }
    let total: Paise = req.items.iter().map(|i| i.gross).sum();
    let order = gateway.create_order(total, enc_common::INR_CURRENCY_CODE, req.receipt).await?;

    let mut new_order = NewOrder::new(OrderId::from(order.id.clone()), req.customer_id, total);
    new_order.receipt = order.receipt.clone();
    for item in req.items {
        new_order = new_order.with_item(NewOrderItem {
            creator_id: item.creator_id,
            product_type: item.product_type,
            category: item.category,
            quantity: item.quantity,
            gross: item.gross,
        });
    }
    let record = settlements.register_order(new_order).await?;
    info!("📦️ Order [{}] registered for {}", record.order_id, record.amount);
    let response = CheckoutResponse {
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        receipt: order.receipt,
        key_id: gateway.config().key_id.clone(),
    };
    Ok(HttpResponse::Ok().json(response))
}

/// Open a subscription: a gateway order for the first charge plus a pending subscription record that the capture
/// event will activate.
#[post("/subscriptions")]
pub async fn create_subscription(
    body: web::Json<SubscriptionCheckoutRequest>,
    gateway: web::Data<RazorpayApi>,
    settlements: web::Data<SettlementApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let order = gateway.create_order(req.amount, enc_common::INR_CURRENCY_CODE, None).await?;
    // derive the subscription id from the gateway order id, which is already unique
    let subscription_id = format!("sub_{}", order.id.trim_start_matches("order_"));
    let sub = settlements
        .register_subscription(NewSubscription {
            subscription_id,
            gateway_order_id: OrderId::from(order.id.clone()),
            creator_id: req.creator_id,
            subscriber_id: req.subscriber_id,
            amount: req.amount,
        })
        .await?;
    info!("📦️ Subscription [{}] registered, awaiting first payment", sub.subscription_id);
    let response = SubscriptionCheckoutResponse {
        subscription_id: sub.subscription_id,
        order_id: order.id,
        amount: order.amount,
        currency: order.currency,
        key_id: gateway.config().key_id.clone(),
    };
    Ok(HttpResponse::Ok().json(response))
}

// ------------------------------------------  Payment verification  -------------------------------------------
/// The client-initiated verification flow. The checkout SDK hands the client `(order_id, payment_id, signature)`;
/// the client posts them here. The signature proves the tuple came from the gateway, but not that the money
/// actually moved, so after the signature check the payment is fetched from the gateway and only its status
/// decides whether the ledger is credited.
#[post("/payments/verify")]
pub async fn verify_payment(
    body: web::Json<VerifyPaymentRequest>,
    gateway: web::Data<RazorpayApi>,
    settlements: web::Data<SettlementApi<SqliteDatabase>>,
    tracker: web::Data<PaymentTracker>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    let secret = gateway.config().key_secret.reveal();
    if !signature::verify_payment_signature(&req.order_id, &req.payment_id, secret, &req.signature) {
        warn!("🔐️ Signature mismatch for order [{}], payment {}. Rejecting.", req.order_id, req.payment_id);
        tracker.start_attempt(&req.order_id, &req.payment_id, TrackedStatus::Failed("Signature mismatch".to_string()));
        return Err(ServerError::SignatureInvalid);
    }
    tracker.start_attempt(&req.order_id, &req.payment_id, TrackedStatus::Verifying);

    let payment = match gateway.fetch_payment(&req.payment_id).await {
        Ok(p) => p,
        Err(e) => {
            // The attempt is left as Verifying; the gateway webhook can still settle it later.
            warn!("💳️ Could not fetch payment {} from the gateway: {e}", req.payment_id);
            return Err(e.into());
        },
    };
    if payment.order_id != req.order_id {
        tracker.record(&req.order_id, &req.payment_id, TrackedStatus::Failed("Order mismatch".to_string()));
        return Err(ServerError::InvalidRequestBody(format!(
            "Payment {} belongs to order {}, not {}",
            req.payment_id, payment.order_id, req.order_id
        )));
    }

    if payment.status.is_settled() {
        let order_id = OrderId::from(req.order_id.clone());
        let credited = match settlements.confirm_payment(&order_id, &req.payment_id).await {
            Ok(records) => records,
            // A webhook delivery won the race. The money is settled; report success with nothing newly credited.
            Err(SettlementError::OrderAlreadySettled(_)) | Err(SettlementError::SubscriptionAlreadyActive(_)) => {
                vec![]
            },
            Err(e) => return Err(e.into()),
        };
        tracker.record(&req.order_id, &req.payment_id, TrackedStatus::Settled);
        let response = VerifyPaymentResponse {
            order_id: req.order_id,
            payment_id: req.payment_id,
            status: TrackedStatus::Settled,
            credited,
        };
        return Ok(HttpResponse::Ok().json(response));
    }

    match payment.status {
        razorpay_tools::PaymentState::Created => {
            // Genuinely still in flight at the gateway. Tell the client to poll.
            tracker.record(&req.order_id, &req.payment_id, TrackedStatus::Processing);
            let response = VerifyPaymentResponse {
                order_id: req.order_id,
                payment_id: req.payment_id,
                status: TrackedStatus::Processing,
                credited: vec![],
            };
            Ok(HttpResponse::Accepted().json(response))
        },
        status => {
            let reason = payment.error_description.unwrap_or_else(|| format!("Payment status is '{status}'"));
            tracker.record(&req.order_id, &req.payment_id, TrackedStatus::Failed(reason.clone()));
            Err(ServerError::PaymentNotSettled(req.payment_id, reason))
        },
    }
}

// ----------------------------------------------  Order status  -----------------------------------------------
#[get("/orders/{order_id}/status")]
pub async fn order_status(
    path: web::Path<String>,
    ledger: web::Data<LedgerApi<SqliteDatabase>>,
    tracker: web::Data<PaymentTracker>,
) -> Result<HttpResponse, ServerError> {
    let order_id = path.into_inner();
    let order = ledger
        .order_by_order_id(&OrderId::from(order_id.clone()))
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Order {order_id}")))?;
    let attempt = tracker.status_of(&order_id);
    let response = OrderStatusResponse {
        order_id,
        status: order.status,
        amount: order.amount,
        verification: attempt.as_ref().map(|a| a.status.clone()),
        verification_attempts: attempt.as_ref().map(|a| a.attempts),
        payment_id: order.payment_id.or(attempt.map(|a| a.payment_id)),
    };
    Ok(HttpResponse::Ok().json(response))
}

// ----------------------------------------------   Payouts  ---------------------------------------------------
/// Submit a payout for a creator.
///
/// The order of operations is deliberate: preconditions (balance, bank details) are checked before any gateway
/// traffic, the transfer is submitted with an idempotency key derived from a fresh nonce, and only a transfer the
/// gateway accepted is recorded against the balance. A gateway failure therefore leaves the ledger untouched, and
/// a recording failure is surfaced loudly for reconciliation rather than silently retried.
#[post("/payouts")]
pub async fn submit_payout(
    body: web::Json<PayoutRequest>,
    gateway: web::Data<RazorpayApi>,
    payouts: web::Data<PayoutApi<SqliteDatabase>>,
    config: web::Data<ServerConfig>,
) -> Result<HttpResponse, ServerError> {
    let req = body.into_inner();
    // A retry with a known key observes the existing record instead of moving money twice. This runs before the
    // balance check: the original submission already debited the balance.
    if let Some(key) = &req.idempotency_key {
        if let Some(existing) = payouts.fetch_payout_by_idempotency_key(key).await? {
            debug!("💸️ Payout retry with key {key} matched record {}. Returning it.", existing.id);
            return Ok(HttpResponse::Ok().json(PayoutResponse { payout: existing, idempotency_key: key.clone() }));
        }
    }
    let creator = payouts.check_payout_preconditions(req.creator_id, req.amount).await?;

    let fund_account_id = match (&creator.contact_id, &creator.fund_account_id) {
        (Some(_), Some(fa)) => fa.clone(),
        _ => register_payout_destination(&creator, &gateway, &payouts).await?,
    };

    let idempotency_key = match req.idempotency_key {
        Some(key) => key,
        None => {
            let nonce = payouts.next_payout_nonce(req.creator_id).await?;
            helpers::payout_idempotency_key(req.creator_id, req.amount, nonce)
        },
    };
    let transfer = NewPayoutRequest {
        account_number: config.razorpay.payout_account_number.clone(),
        fund_account_id,
        amount: req.amount,
        currency: enc_common::INR_CURRENCY_CODE.to_string(),
        mode: helpers::payout_mode(req.amount).to_string(),
        purpose: "payout".to_string(),
        reference_id: idempotency_key.clone(),
        narration: Some(format!("Encore payout for {}", creator.name)),
    };
    let payout = gateway.create_payout(&transfer, &idempotency_key).await?;

    let status = match payout.status {
        razorpay_tools::PayoutState::Processed => PayoutStatus::Processed,
        _ => PayoutStatus::Processing,
    };
    let record = match payouts.record_payout(req.creator_id, req.amount, &idempotency_key, &payout.id, status).await {
        Ok(record) => record,
        Err(e) => {
            // The transfer exists at the gateway but not in the ledger. This must be reconciled by hand.
            error!(
                "💸️ URGENT: transfer {} for creator {} was accepted by the gateway but could not be recorded: {e}",
                payout.id, req.creator_id
            );
            return Err(e.into());
        },
    };
    info!("💸️ Payout {} of {} submitted for creator {}", record.id, record.amount, record.creator_id);
    Ok(HttpResponse::Ok().json(PayoutResponse { payout: record, idempotency_key }))
}

/// First-time payout setup for a creator: register a contact and a fund account at the gateway and cache the ids.
async fn register_payout_destination(
    creator: &settlement_engine::db_types::Creator,
    gateway: &RazorpayApi,
    payouts: &PayoutApi<SqliteDatabase>,
) -> Result<String, ServerError> {
    let (name, ifsc, account_number) = match (&creator.bank_account_name, &creator.bank_ifsc, &creator.bank_account_number)
    {
        (Some(n), Some(i), Some(a)) => (n.clone(), i.clone(), a.clone()),
        _ => return Err(ServerError::MissingBankDetails(creator.id)),
    };
    let reference = format!("creator_{}", creator.id);
    let contact = gateway.create_contact(&creator.name, &reference).await?;
    let fund_account = gateway
        .create_fund_account(&NewFundAccount {
            contact_id: contact.id.clone(),
            account_type: "bank_account".to_string(),
            bank_account: BankAccountDetails { name, ifsc, account_number },
        })
        .await?;
    payouts.register_fund_account(creator.id, &contact.id, &fund_account.id).await?;
    info!("💸️ Registered payout destination for creator {}: fund account {}", creator.id, fund_account.id);
    Ok(fund_account.id)
}

// -------------------------------------------  Creator ledger  ------------------------------------------------
#[get("/creators/{id}/balance")]
pub async fn creator_balance(
    path: web::Path<i64>,
    ledger: web::Data<LedgerApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let creator_id = path.into_inner();
    let creator = ledger
        .creator_by_id(creator_id)
        .await?
        .ok_or_else(|| ServerError::NoRecordFound(format!("Creator {creator_id}")))?;
    let response = BalanceResponse {
        creator_id,
        available_balance: creator.available_balance,
        subscription_revenue: creator.subscription_revenue,
        merch_revenue: creator.merch_revenue,
        event_revenue: creator.event_revenue,
        ad_revenue: creator.ad_revenue,
        total_paid_out: creator.total_paid_out,
    };
    Ok(HttpResponse::Ok().json(response))
}

#[get("/creators/{id}/history")]
pub async fn creator_history(
    path: web::Path<i64>,
    ledger: web::Data<LedgerApi<SqliteDatabase>>,
) -> Result<HttpResponse, ServerError> {
    let creator_id = path.into_inner();
    let history = ledger.history_for_creator(creator_id).await?;
    Ok(HttpResponse::Ok().json(history))
}

// ----------------------------------------------  Webhook  ----------------------------------------------------
pub const EVENT_ID_HEADER: &str = "x-razorpay-event-id";

/// The gateway webhook sink. The HMAC middleware has already authenticated the body. Deduplication happens here:
/// the event id is marked as seen before dispatch, and unmarked again if the handler reported a transient failure
/// so that the gateway's redelivery is not ignored.
#[post("/webhook")]
pub async fn webhook(
    req: HttpRequest,
    body: web::Bytes,
    settlements: web::Data<SettlementApi<SqliteDatabase>>,
    payouts: web::Data<PayoutApi<SqliteDatabase>>,
    tracker: web::Data<PaymentTracker>,
    processed: web::Data<ProcessedEvents>,
) -> Result<HttpResponse, ServerError> {
    let envelope: WebhookEnvelope = serde_json::from_slice(&body)
        .map_err(|e| ServerError::InvalidRequestBody(format!("Could not parse webhook body: {e}")))?;
    let event_id = req
        .headers()
        .get(EVENT_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| envelope.event_id());

    if !processed.mark(&event_id) {
        debug!("📬️ Event {event_id} has already been processed. Acknowledging redelivery.");
        return Ok(HttpResponse::Ok().json(JsonResponse::success("Already processed")));
    }
    debug!("📬️ Dispatching webhook event {event_id} ({})", envelope.event);
    match dispatch_event(&envelope, &settlements, &payouts, &tracker).await {
        DispatchOutcome::Applied => Ok(HttpResponse::Ok().json(JsonResponse::success("Applied"))),
        DispatchOutcome::AlreadyApplied => Ok(HttpResponse::Ok().json(JsonResponse::success("Already applied"))),
        DispatchOutcome::Ignored => Ok(HttpResponse::Ok().json(JsonResponse::success("Ignored"))),
        DispatchOutcome::Transient(reason) => {
            // let the gateway redeliver this one
            processed.unmark(&event_id);
            Err(ServerError::BackendError(reason))
        },
    }
}
