use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use enc_common::{Paise, INR_CURRENCY_CODE};
use log::error;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[error("Invalid conversion: {0}")]
pub struct ConversionError(pub String);

//--------------------------------------        OrderId        -------------------------------------------------------
/// The gateway-assigned order identifier (`order_...`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
pub struct OrderId(pub String);

impl FromStr for OrderId {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.to_string()))
    }
}

impl From<String> for OrderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl OrderId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

//--------------------------------------   OrderStatusType     -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum OrderStatusType {
    /// The order is newly created, and no payment has been confirmed.
    New,
    /// The payment has been confirmed and revenue distributed.
    Paid,
    /// The order has been cancelled by the user or an admin.
    Cancelled,
    /// The order went unpaid for longer than the expiry window.
    Expired,
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OrderStatusType::New => write!(f, "New"),
            OrderStatusType::Paid => write!(f, "Paid"),
            OrderStatusType::Cancelled => write!(f, "Cancelled"),
            OrderStatusType::Expired => write!(f, "Expired"),
        }
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "New" => Ok(Self::New),
            "Paid" => Ok(Self::Paid),
            "Cancelled" => Ok(Self::Cancelled),
            "Expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

impl From<String> for OrderStatusType {
    fn from(value: String) -> Self {
        value.parse().unwrap_or_else(|_| {
            error!("Invalid order status: {value}. But this conversion cannot fail. Defaulting to New");
            OrderStatusType::New
        })
    }
}

//--------------------------------------     ProductType       -------------------------------------------------------
/// What was sold. The revenue split rules key off this.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum ProductType {
    /// A platform-tier upgrade paid to the platform itself.
    PlatformSubscription,
    /// A fan subscribing directly to a creator.
    CreatorSubscription,
    EventTicket,
    Merchandise,
}

impl Display for ProductType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProductType::PlatformSubscription => write!(f, "PlatformSubscription"),
            ProductType::CreatorSubscription => write!(f, "CreatorSubscription"),
            ProductType::EventTicket => write!(f, "EventTicket"),
            ProductType::Merchandise => write!(f, "Merchandise"),
        }
    }
}

impl FromStr for ProductType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PlatformSubscription" => Ok(Self::PlatformSubscription),
            "CreatorSubscription" => Ok(Self::CreatorSubscription),
            "EventTicket" => Ok(Self::EventTicket),
            "Merchandise" => Ok(Self::Merchandise),
            s => Err(ConversionError(format!("Invalid product type: {s}"))),
        }
    }
}

impl ProductType {
    /// The revenue bucket this product credits on the creator record.
    pub fn revenue_source(&self) -> RevenueSource {
        match self {
            ProductType::PlatformSubscription | ProductType::CreatorSubscription => RevenueSource::Subscriptions,
            ProductType::EventTicket => RevenueSource::Events,
            ProductType::Merchandise => RevenueSource::Merchandise,
        }
    }
}

//--------------------------------------    RevenueSource      -------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum RevenueSource {
    Subscriptions,
    Merchandise,
    Events,
    Ads,
}

impl Display for RevenueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RevenueSource::Subscriptions => write!(f, "Subscriptions"),
            RevenueSource::Merchandise => write!(f, "Merchandise"),
            RevenueSource::Events => write!(f, "Events"),
            RevenueSource::Ads => write!(f, "Ads"),
        }
    }
}

//--------------------------------------       Creator        --------------------------------------------------------
/// A creator account with its running balance and revenue breakdown. Mutated only by the settlement flow (credit)
/// and the payout flow (debit); `available_balance` never goes negative.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Creator {
    pub id: i64,
    pub name: String,
    /// Gateway-side payout identifiers, cached after first registration.
    pub contact_id: Option<String>,
    pub fund_account_id: Option<String>,
    pub bank_account_name: Option<String>,
    pub bank_ifsc: Option<String>,
    #[serde(skip_serializing)]
    pub bank_account_number: Option<String>,
    pub available_balance: Paise,
    pub subscription_revenue: Paise,
    pub merch_revenue: Paise,
    pub event_revenue: Paise,
    pub ad_revenue: Paise,
    pub total_paid_out: Paise,
    pub payout_nonce: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Creator {
    pub fn has_fund_account(&self) -> bool {
        self.contact_id.is_some() && self.fund_account_id.is_some()
    }
}

#[derive(Debug, Clone)]
pub struct NewCreator {
    pub name: String,
    pub bank_account_name: Option<String>,
    pub bank_ifsc: Option<String>,
    pub bank_account_number: Option<String>,
}

impl NewCreator {
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self { name: name.into(), bank_account_name: None, bank_ifsc: None, bank_account_number: None }
    }
}

//--------------------------------------        Order       ----------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderRecord {
    pub id: i64,
    pub order_id: OrderId,
    pub customer_id: String,
    pub amount: Paise,
    pub currency: String,
    pub receipt: Option<String>,
    /// The gateway payment that settled this order, once known.
    pub payment_id: Option<String>,
    pub status: OrderStatusType,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewOrder {
    /// The order id as assigned by the gateway.
    pub order_id: OrderId,
    pub customer_id: String,
    pub amount: Paise,
    pub currency: String,
    pub receipt: Option<String>,
    pub items: Vec<NewOrderItem>,
}

impl NewOrder {
    pub fn new(order_id: OrderId, customer_id: String, amount: Paise) -> Self {
        Self { order_id, customer_id, amount, currency: INR_CURRENCY_CODE.to_string(), receipt: None, items: vec![] }
    }

    pub fn with_item(mut self, item: NewOrderItem) -> Self {
        self.items.push(item);
        self
    }
}

//--------------------------------------     Order items     ---------------------------------------------------------
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct OrderItem {
    pub id: i64,
    /// Row id of the parent order (not the gateway order id).
    pub order_ref: i64,
    pub creator_id: i64,
    pub product_type: ProductType,
    /// Merchandise category used for the unit-cost lookup. `None` for non-merch items.
    pub category: Option<String>,
    pub quantity: i64,
    pub gross: Paise,
}

#[derive(Debug, Clone)]
pub struct NewOrderItem {
    pub creator_id: i64,
    pub product_type: ProductType,
    pub category: Option<String>,
    pub quantity: i64,
    pub gross: Paise,
}

//--------------------------------------    Subscriptions    ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    Pending,
    Active,
    Cancelled,
}

impl Display for SubscriptionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SubscriptionStatus::Pending => write!(f, "Pending"),
            SubscriptionStatus::Active => write!(f, "Active"),
            SubscriptionStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Subscription {
    pub id: i64,
    pub subscription_id: String,
    /// The gateway order that pays for this subscription.
    pub gateway_order_id: OrderId,
    /// `None` means a platform-tier subscription; `Some` is a fan→creator subscription.
    pub creator_id: Option<i64>,
    pub subscriber_id: String,
    pub amount: Paise,
    pub status: SubscriptionStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub subscription_id: String,
    pub gateway_order_id: OrderId,
    pub creator_id: Option<i64>,
    pub subscriber_id: String,
    pub amount: Paise,
}

//--------------------------------------       Payouts       ---------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize)]
pub enum PayoutStatus {
    Pending,
    Processing,
    Processed,
    Failed,
    Cancelled,
}

impl PayoutStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PayoutStatus::Processed | PayoutStatus::Failed | PayoutStatus::Cancelled)
    }

    /// Terminal states in which the debited balance must be returned to the creator.
    pub fn refunds_balance(&self) -> bool {
        matches!(self, PayoutStatus::Failed | PayoutStatus::Cancelled)
    }
}

impl Display for PayoutStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PayoutStatus::Pending => write!(f, "Pending"),
            PayoutStatus::Processing => write!(f, "Processing"),
            PayoutStatus::Processed => write!(f, "Processed"),
            PayoutStatus::Failed => write!(f, "Failed"),
            PayoutStatus::Cancelled => write!(f, "Cancelled"),
        }
    }
}

#[derive(Debug, Clone, FromRow, Serialize)]
pub struct PayoutRecord {
    pub id: i64,
    pub creator_id: i64,
    pub amount: Paise,
    pub idempotency_key: String,
    /// The gateway transfer id, once the transfer has been accepted.
    pub transfer_id: Option<String>,
    pub status: PayoutStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------     Transactions    ---------------------------------------------------------
/// Append-only audit entry written alongside every balance credit.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct TransactionRecord {
    pub id: i64,
    pub creator_id: i64,
    pub order_ref: Option<i64>,
    pub source: RevenueSource,
    pub gross: Paise,
    pub platform_fee: Paise,
    pub cost_recovery: Paise,
    pub creator_net: Paise,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_status_round_trips_through_strings() {
        for status in [OrderStatusType::New, OrderStatusType::Paid, OrderStatusType::Cancelled, OrderStatusType::Expired]
        {
            assert_eq!(status.to_string().parse::<OrderStatusType>().unwrap(), status);
        }
        assert!("Shipped".parse::<OrderStatusType>().is_err());
    }

    #[test]
    fn product_types_map_to_revenue_sources() {
        assert_eq!(ProductType::Merchandise.revenue_source(), RevenueSource::Merchandise);
        assert_eq!(ProductType::EventTicket.revenue_source(), RevenueSource::Events);
        assert_eq!(ProductType::CreatorSubscription.revenue_source(), RevenueSource::Subscriptions);
    }

    #[test]
    fn terminal_payout_states() {
        assert!(PayoutStatus::Processed.is_terminal());
        assert!(!PayoutStatus::Processed.refunds_balance());
        assert!(PayoutStatus::Failed.refunds_balance());
        assert!(PayoutStatus::Cancelled.refunds_balance());
        assert!(!PayoutStatus::Processing.is_terminal());
    }
}
