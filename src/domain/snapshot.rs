//! Line Snapshot Enricher
//!
//! Turns bare (product ref, quantity) pairs into fully priced, tax-computed
//! line items, freezing catalog attributes at order time. Snapshots are
//! write-once: once a line is persisted with a complete snapshot it is
//! historical fact, never recomputed from live catalog data.

use futures::future::try_join_all;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::catalog::CatalogLookup;
use crate::domain::num::{coerce_amount, round2};
use crate::domain::pricing::resolve_unit_price;
use crate::Result;

/// Name recorded on a snapshot when the referenced product is missing.
pub const UNKNOWN_PRODUCT: &str = "Unknown Product";

/// A line as requested by a cart or an admin order edit. `client_price`
/// carries a price the caller already resolved; zero or absent means the
/// server resolves it.
#[derive(Clone, Debug, Deserialize)]
pub struct RequestedLine {
    pub product_ref: String,
    pub quantity: u32,
    #[serde(default)]
    pub client_price: Option<f64>,
}

/// An order line with its price snapshot. The amount fields are optional so
/// legacy documents written before snapshots existed still deserialize; a
/// line with all three present and non-zero is considered complete.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_ref: String,
    pub quantity: u32,
    #[serde(default)]
    pub unit_price: Decimal,
    #[serde(default)]
    pub net_amount: Option<Decimal>,
    #[serde(default)]
    pub tax_amount: Option<Decimal>,
    #[serde(default)]
    pub total_amount: Option<Decimal>,
    #[serde(default)]
    pub gst_percent: Option<Decimal>,
    #[serde(default)]
    pub product_name: String,
    #[serde(default)]
    pub product_image: String,
    #[serde(default = "default_unit_set")]
    pub unit_set: u32,
}

fn default_unit_set() -> u32 {
    1
}

impl Default for OrderLine {
    fn default() -> Self {
        Self {
            product_ref: String::new(),
            quantity: 0,
            unit_price: Decimal::ZERO,
            net_amount: None,
            tax_amount: None,
            total_amount: None,
            gst_percent: None,
            product_name: String::new(),
            product_image: String::new(),
            unit_set: 1,
        }
    }
}

impl OrderLine {
    /// A snapshot is complete when unit price, net amount, and total amount
    /// are all present and non-zero. Complete lines are immutable.
    pub fn snapshot_complete(&self) -> bool {
        !self.unit_price.is_zero()
            && self.net_amount.map_or(false, |v| !v.is_zero())
            && self.total_amount.map_or(false, |v| !v.is_zero())
    }

    /// Net/tax/total from a resolved unit price and GST rate, each rounded
    /// to 2 decimal places independently.
    pub fn with_amounts(mut self, unit_price: Decimal, gst_percent: Decimal) -> Self {
        let net = round2(unit_price * Decimal::from(self.quantity));
        let tax = round2(net * gst_percent / Decimal::from(100));
        self.unit_price = unit_price;
        self.net_amount = Some(net);
        self.tax_amount = Some(tax);
        self.total_amount = Some(round2(net + tax));
        self.gst_percent = Some(gst_percent);
        self
    }
}

/// Enrich requested lines into snapshot lines. Lookups fan out concurrently;
/// the output has the same length and order as the input. A missing product
/// degrades that one line to an unknown-product stub instead of failing the
/// batch; only a catalog infrastructure failure propagates.
pub async fn enrich_lines<C: CatalogLookup>(
    lines: &[RequestedLine],
    catalog: &C,
) -> Result<Vec<OrderLine>> {
    try_join_all(lines.iter().map(|line| enrich_line(line, catalog))).await
}

async fn enrich_line<C: CatalogLookup>(line: &RequestedLine, catalog: &C) -> Result<OrderLine> {
    let client_price = line
        .client_price
        .map(coerce_amount)
        .filter(|p| !p.is_zero());

    let Some(product) = catalog.product_by_id(&line.product_ref).await? else {
        tracing::warn!(product_ref = %line.product_ref, "product missing from catalog, emitting stub line");
        return Ok(OrderLine {
            product_ref: line.product_ref.clone(),
            quantity: line.quantity,
            product_name: UNKNOWN_PRODUCT.to_string(),
            unit_set: 1,
            ..OrderLine::default()
        }
        .with_amounts(client_price.unwrap_or(Decimal::ZERO), Decimal::ZERO));
    };

    let unit_price =
        client_price.unwrap_or_else(|| resolve_unit_price(&product.pricing, line.quantity));

    Ok(OrderLine {
        product_ref: line.product_ref.clone(),
        quantity: line.quantity,
        product_name: product.name,
        product_image: product.image,
        unit_set: product.pricing.unit_set(),
        ..OrderLine::default()
    }
    .with_amounts(unit_price, coerce_amount(product.pricing.gst_percent)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProduct;
    use crate::domain::pricing::{BulkTier, PricingConfig};
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::future::Future;

    struct FakeCatalog(HashMap<String, CatalogProduct>);

    impl CatalogLookup for FakeCatalog {
        fn product_by_id(
            &self,
            id: &str,
        ) -> impl Future<Output = crate::Result<Option<CatalogProduct>>> + Send {
            let found = self.0.get(id).cloned();
            async move { Ok(found) }
        }
    }

    struct BrokenCatalog;

    impl CatalogLookup for BrokenCatalog {
        fn product_by_id(
            &self,
            _id: &str,
        ) -> impl Future<Output = crate::Result<Option<CatalogProduct>>> + Send {
            async { Err(crate::MarketError::Catalog("connection refused".into())) }
        }
    }

    fn widget(gst: f64) -> CatalogProduct {
        CatalogProduct {
            name: "Steel Widget".into(),
            image: "widget.jpg".into(),
            pricing: PricingConfig {
                base_price: 100.0,
                unit_set: 1,
                bulk_tiers: vec![BulkTier {
                    minimum: Some(10),
                    maximum: None,
                    selling_price_set: 90.0,
                }],
                gst_percent: gst,
            },
        }
    }

    fn catalog_with(entries: &[(&str, CatalogProduct)]) -> FakeCatalog {
        FakeCatalog(entries.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn line(product_ref: &str, quantity: u32) -> RequestedLine {
        RequestedLine { product_ref: product_ref.into(), quantity, client_price: None }
    }

    #[tokio::test]
    async fn resolves_tier_price_and_taxes() {
        let catalog = catalog_with(&[("p1", widget(18.0))]);
        let lines = enrich_lines(&[line("p1", 10)], &catalog).await.unwrap();
        assert_eq!(lines[0].unit_price, dec!(90));
        assert_eq!(lines[0].net_amount, Some(dec!(900.00)));
        assert_eq!(lines[0].tax_amount, Some(dec!(162.00)));
        assert_eq!(lines[0].total_amount, Some(dec!(1062.00)));
        assert_eq!(lines[0].product_name, "Steel Widget");
        assert!(lines[0].snapshot_complete());
    }

    #[tokio::test]
    async fn nonzero_client_price_wins_over_resolution() {
        let catalog = catalog_with(&[("p1", widget(0.0))]);
        let requested = RequestedLine {
            product_ref: "p1".into(),
            quantity: 10,
            client_price: Some(85.0),
        };
        let lines = enrich_lines(&[requested], &catalog).await.unwrap();
        assert_eq!(lines[0].unit_price, dec!(85));
        assert_eq!(lines[0].net_amount, Some(dec!(850.00)));
    }

    #[tokio::test]
    async fn missing_product_degrades_without_shrinking_batch() {
        let catalog = catalog_with(&[("p1", widget(18.0)), ("p3", widget(18.0))]);
        let requested = vec![line("p1", 2), line("p2", 4), line("p3", 1)];
        let lines = enrich_lines(&requested, &catalog).await.unwrap();

        assert_eq!(lines.len(), 3);
        assert_eq!(lines[1].product_name, UNKNOWN_PRODUCT);
        assert_eq!(lines[1].unit_price, Decimal::ZERO);
        assert_eq!(lines[1].tax_amount, Some(Decimal::ZERO));
        assert!(lines[0].snapshot_complete());
        assert!(lines[2].snapshot_complete());
        assert_eq!(lines[2].product_ref, "p3");
    }

    #[tokio::test]
    async fn wholesale_order_end_to_end() {
        use crate::domain::order::{Order, PaymentMode};
        use crate::domain::totals::compute_totals;

        let bolts = CatalogProduct {
            name: "Bulk Bolts".into(),
            image: String::new(),
            pricing: PricingConfig {
                base_price: 50.0,
                unit_set: 10,
                bulk_tiers: vec![BulkTier {
                    minimum: Some(5),
                    maximum: Some(20),
                    selling_price_set: 40.0,
                }],
                gst_percent: 0.0,
            },
        };
        let catalog = catalog_with(&[("p1", bolts)]);

        // 60 pieces = 6 sets, inside the 5..=20 set window.
        let lines = enrich_lines(&[line("p1", 60)], &catalog).await.unwrap();
        assert_eq!(lines[0].unit_price, dec!(40));
        assert_eq!(lines[0].unit_set, 10);

        let mut order = Order::create("ORD-E2E00001", "buyer@example.com", PaymentMode::Cod, lines);
        order.set_delivery_charge(dec!(20));
        order.set_discount(dec!(10));
        order.record_payment(dec!(1000));

        let totals = compute_totals(&order);
        assert_eq!(totals.subtotal, dec!(2400.00));
        assert_eq!(totals.total, dec!(2410.00));
        assert_eq!(totals.amount_pending, dec!(1410.00));
    }

    #[tokio::test]
    async fn catalog_failure_propagates() {
        let err = enrich_lines(&[line("p1", 1)], &BrokenCatalog).await.unwrap_err();
        assert!(matches!(err, crate::MarketError::Catalog(_)));
    }

    #[tokio::test]
    async fn amounts_round_independently_and_reconcile() {
        let catalog = catalog_with(&[("p1", widget(18.0))]);
        let requested = RequestedLine {
            product_ref: "p1".into(),
            quantity: 3,
            client_price: Some(33.335),
        };
        let lines = enrich_lines(&[requested], &catalog).await.unwrap();

        // 33.335 x 3 = 100.005, half-away-from-zero to 100.01.
        let net = lines[0].net_amount.unwrap();
        let tax = lines[0].tax_amount.unwrap();
        let total = lines[0].total_amount.unwrap();
        assert_eq!(net, dec!(100.01));
        assert_eq!(total, round2(net + tax));
    }

    #[tokio::test]
    async fn persisted_snapshot_survives_catalog_price_change() {
        use crate::domain::order::{Order, PaymentMode};
        use crate::domain::totals::compute_totals;

        let catalog = catalog_with(&[("p1", widget(0.0))]);
        let lines = enrich_lines(&[line("p1", 3)], &catalog).await.unwrap();
        let order = Order::create("ORD-SNAP0001", "buyer@example.com", PaymentMode::Cod, lines);
        let before = compute_totals(&order);
        assert_eq!(before.subtotal, dec!(300.00));

        // Catalog price triples after the order was placed.
        let mut repriced = widget(0.0);
        repriced.pricing.base_price = 300.0;
        let catalog = catalog_with(&[("p1", repriced)]);
        let fresh = enrich_lines(&[line("p1", 3)], &catalog).await.unwrap();
        assert_eq!(fresh[0].unit_price, dec!(300));

        // The persisted order still reconciles from its frozen snapshot.
        assert_eq!(compute_totals(&order), before);
    }

    #[tokio::test]
    async fn negative_client_price_is_treated_as_absent() {
        let catalog = catalog_with(&[("p1", widget(0.0))]);
        let requested = RequestedLine {
            product_ref: "p1".into(),
            quantity: 1,
            client_price: Some(-5.0),
        };
        let lines = enrich_lines(&[requested], &catalog).await.unwrap();
        // Falls through to the catalog base price.
        assert_eq!(lines[0].unit_price, dec!(100));
    }
}
