//! Revenue split arithmetic.
//!
//! Every confirmed sale is divided into three parts: the platform fee, recovered production cost (merchandise only)
//! and the creator's net. The rules per product type:
//!
//! * Platform-tier subscription: 100% platform.
//! * Creator subscription (fan → creator): 100% creator.
//! * Event ticket: creator takes 90%, platform the rest.
//! * Merchandise: creator takes gross − unit cost recovery − 10% fee, floored at zero; the platform takes the fee
//!   plus whatever cost recovery the gross could cover.
//!
//! All arithmetic happens in paise. The creator's net is computed first and floored; the platform side absorbs any
//! residual paisa so that the parts always sum exactly to the gross.

use std::{collections::HashMap, env};

use enc_common::Paise;
use log::*;
use serde::{Deserialize, Serialize};

use crate::db_types::ProductType;

pub const PLATFORM_FEE_PERCENT: i64 = 10;
pub const EVENT_CREATOR_PERCENT: i64 = 90;

//--------------------------------------     RevenueSplit      -------------------------------------------------------
/// The commercial split of one gross sale. Invariant: `platform_fee + cost_recovery + creator_net == gross` and
/// `creator_net >= 0`, for every product type and every non-negative gross.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevenueSplit {
    pub gross: Paise,
    pub platform_fee: Paise,
    pub cost_recovery: Paise,
    pub creator_net: Paise,
}

impl RevenueSplit {
    /// Compute the split for a sale. `cost_basis` is the total production cost to recover (unit cost × quantity);
    /// it only participates for merchandise and is ignored for the other product types.
    pub fn compute(gross: Paise, product_type: ProductType, cost_basis: Paise) -> Self {
        let zero = Paise::from(0);
        match product_type {
            ProductType::PlatformSubscription => {
                Self { gross, platform_fee: gross, cost_recovery: zero, creator_net: zero }
            },
            ProductType::CreatorSubscription => {
                Self { gross, platform_fee: zero, cost_recovery: zero, creator_net: gross }
            },
            ProductType::EventTicket => {
                let creator_net = gross.percent(EVENT_CREATOR_PERCENT);
                Self { gross, platform_fee: gross - creator_net, cost_recovery: zero, creator_net }
            },
            ProductType::Merchandise => {
                let fee = gross.percent(PLATFORM_FEE_PERCENT);
                let creator_net = (gross - cost_basis - fee).max(zero);
                // A loss-making item cannot recover more cost than the gross covers
                let cost_recovery = cost_basis.min(gross - creator_net);
                let platform_fee = gross - creator_net - cost_recovery;
                Self { gross, platform_fee, cost_recovery, creator_net }
            },
        }
    }

    pub fn platform_total(&self) -> Paise {
        self.platform_fee + self.cost_recovery
    }
}

//--------------------------------------      CostTable        -------------------------------------------------------
/// Per-category merchandise unit costs (manufacturing + printing + packaging + shipping). Categories not present in
/// the table fall back to the default bucket.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CostTable {
    costs: HashMap<String, Paise>,
    default_cost: Paise,
}

impl Default for CostTable {
    fn default() -> Self {
        let costs = [
            ("tshirt", Paise::from_rupees(250)),
            ("hoodie", Paise::from_rupees(550)),
            ("cap", Paise::from_rupees(150)),
            ("poster", Paise::from_rupees(80)),
            ("vinyl", Paise::from_rupees(400)),
            ("sticker", Paise::from_rupees(30)),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        Self { costs, default_cost: Paise::from_rupees(200) }
    }
}

impl CostTable {
    /// Load cost overrides from `ENC_MERCH_COST_TABLE` (a JSON map of category → cost in paise), falling back to
    /// the built-in table when unset or malformed.
    pub fn from_env_or_default() -> Self {
        let mut table = Self::default();
        match env::var("ENC_MERCH_COST_TABLE") {
            Ok(json) => match serde_json::from_str::<HashMap<String, i64>>(&json) {
                Ok(overrides) => {
                    for (category, paise) in overrides {
                        table.costs.insert(category, Paise::from(paise));
                    }
                },
                Err(e) => warn!("🪛️ ENC_MERCH_COST_TABLE is not a valid JSON map: {e}. Using the built-in table."),
            },
            Err(_) => debug!("🪛️ ENC_MERCH_COST_TABLE not set. Using the built-in cost table."),
        }
        table
    }

    pub fn unit_cost(&self, category: Option<&str>) -> Paise {
        category.and_then(|c| self.costs.get(&c.to_ascii_lowercase()).copied()).unwrap_or(self.default_cost)
    }

    /// The total cost basis for a line item: zero for anything that isn't merchandise.
    pub fn cost_basis(&self, product_type: ProductType, category: Option<&str>, quantity: i64) -> Paise {
        match product_type {
            ProductType::Merchandise => self.unit_cost(category) * quantity.max(0),
            _ => Paise::from(0),
        }
    }
}
