//! Tier Price Resolver
//!
//! Wholesale products carry an optional table of bulk tiers on top of a
//! flat base price. A tier's `minimum`/`maximum` are expressed in *sets*;
//! multiplying by the product's `unit_set` converts them to piece
//! quantities. This module is the only pricing implementation in the crate:
//! cart estimates, order creation, order editing, and the snapshot backfill
//! all resolve through [`resolve_unit_price`].

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::num::coerce_amount;

/// One bulk-pricing tier. Tiers without a `minimum` are ignored during
/// resolution; `maximum` is an optional upper bound in sets.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct BulkTier {
    pub minimum: Option<u32>,
    #[serde(default)]
    pub maximum: Option<u32>,
    #[serde(default)]
    pub selling_price_set: f64,
}

/// Pricing configuration read from the catalog. All numeric fields are
/// permissive: missing values default, degenerate values coerce to zero.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub base_price: f64,
    #[serde(default)]
    pub unit_set: u32,
    #[serde(default)]
    pub bulk_tiers: Vec<BulkTier>,
    #[serde(default)]
    pub gst_percent: f64,
}

impl PricingConfig {
    /// Set-to-piece multiplier; a stored zero behaves as 1.
    pub fn unit_set(&self) -> u32 {
        self.unit_set.max(1)
    }
}

/// Resolve the unit price for `quantity` pieces of a product.
///
/// Tiers are evaluated descending by `minimum`. The highest tier is checked
/// first and unconditionally: a quantity at or above its threshold gets its
/// price even past that tier's own `maximum`. Lower tiers only match inside
/// their `[minimum, maximum]` window. No tier match falls back to the base
/// price.
///
/// NOTE: the unconditional top-tier check bypasses that tier's `maximum`
/// bound. Kept for compatibility with historical orders; needs product-owner
/// confirmation before changing.
pub fn resolve_unit_price(config: &PricingConfig, quantity: u32) -> Decimal {
    let unit_set = u64::from(config.unit_set());
    let quantity = u64::from(quantity);

    let mut tiers: Vec<(u64, Option<u64>, Decimal)> = config
        .bulk_tiers
        .iter()
        .filter_map(|t| {
            let minimum = t.minimum?;
            if !t.selling_price_set.is_finite() || t.selling_price_set < 0.0 {
                return None;
            }
            Some((
                u64::from(minimum) * unit_set,
                t.maximum.map(|m| u64::from(m) * unit_set),
                coerce_amount(t.selling_price_set),
            ))
        })
        .collect();

    if tiers.is_empty() {
        return coerce_amount(config.base_price);
    }
    tiers.sort_by(|a, b| b.0.cmp(&a.0));

    let (top_threshold, _, top_price) = tiers[0];
    if quantity >= top_threshold {
        return top_price;
    }

    for (threshold, maximum, price) in &tiers[1..] {
        if quantity >= *threshold && maximum.map_or(true, |max| quantity <= max) {
            return *price;
        }
    }

    coerce_amount(config.base_price)
}
