//! Snapshot backfill migration
//!
//! Orders placed before price snapshots existed carry lines with only a
//! product ref and quantity. This batch job walks every persisted order and
//! fills the missing snapshot fields through the same tier resolver the
//! live order paths use. Orders are processed one at a time to bound memory
//! and catalog load; one bad record never aborts the batch.

use std::future::Future;

use serde::Serialize;
use uuid::Uuid;

use crate::catalog::CatalogLookup;
use crate::domain::num::coerce_amount;
use crate::domain::order::Order;
use crate::domain::pricing::resolve_unit_price;
use crate::Result;

/// Order persistence capability consumed by the migration. The Postgres
/// implementation lives in [`crate::store`].
pub trait OrderStore: Sync {
    fn order_ids(&self) -> impl Future<Output = Result<Vec<Uuid>>> + Send;
    fn load(&self, id: Uuid) -> impl Future<Output = Result<Option<Order>>> + Send;
    fn save(&self, order: &Order) -> impl Future<Output = Result<()>> + Send;
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub total: u64,
    pub updated: u64,
    pub skipped: u64,
    pub errored: u64,
}

/// Backfill snapshot fields on every order that lacks them. Idempotent:
/// lines with a complete snapshot are never touched, and an order is only
/// saved when a line actually changed, so a second run reports zero
/// updates.
pub async fn migrate_all_orders<C, S>(catalog: &C, store: &S) -> Result<MigrationReport>
where
    C: CatalogLookup,
    S: OrderStore,
{
    let ids = store.order_ids().await?;
    let mut report = MigrationReport { total: ids.len() as u64, ..MigrationReport::default() };

    for id in ids {
        match backfill_order(catalog, store, id).await {
            Ok(true) => report.updated += 1,
            Ok(false) => report.skipped += 1,
            Err(e) => {
                tracing::error!(order_id = %id, error = %e, "snapshot backfill failed for order");
                report.errored += 1;
            }
        }
    }

    tracing::info!(
        total = report.total,
        updated = report.updated,
        skipped = report.skipped,
        errored = report.errored,
        "snapshot backfill finished"
    );
    Ok(report)
}

/// Returns whether the order was changed and saved.
async fn backfill_order<C, S>(catalog: &C, store: &S, id: Uuid) -> Result<bool>
where
    C: CatalogLookup,
    S: OrderStore,
{
    let Some(mut order) = store.load(id).await? else {
        tracing::warn!(order_id = %id, "order disappeared during backfill");
        return Ok(false);
    };

    let mut changed = false;
    for line in &mut order.line_items {
        if line.snapshot_complete() {
            continue;
        }
        let Some(product) = catalog.product_by_id(&line.product_ref).await? else {
            tracing::warn!(order_id = %id, product_ref = %line.product_ref, "product missing from catalog, leaving line for a later run");
            continue;
        };

        // An existing non-zero unit price is historical fact; only resolve
        // afresh when the line never had one.
        let unit_price = if line.unit_price.is_zero() {
            resolve_unit_price(&product.pricing, line.quantity)
        } else {
            line.unit_price
        };
        let gst = coerce_amount(product.pricing.gst_percent);

        let mut filled = line.clone().with_amounts(unit_price, gst);
        if filled.product_name.is_empty() {
            filled.product_name = product.name;
        }
        if filled.product_image.is_empty() {
            filled.product_image = product.image;
        }
        filled.unit_set = product.pricing.unit_set();

        if filled != *line {
            *line = filled;
            changed = true;
        }
    }

    if changed {
        store.save(&order).await?;
    }
    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::CatalogProduct;
    use crate::domain::order::PaymentMode;
    use crate::domain::pricing::{BulkTier, PricingConfig};
    use crate::domain::snapshot::OrderLine;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeCatalog(HashMap<String, CatalogProduct>);

    impl CatalogLookup for FakeCatalog {
        fn product_by_id(
            &self,
            id: &str,
        ) -> impl std::future::Future<Output = crate::Result<Option<CatalogProduct>>> + Send
        {
            let found = self.0.get(id).cloned();
            async move { Ok(found) }
        }
    }

    #[derive(Default)]
    struct MemStore {
        orders: Mutex<Vec<Order>>,
        saves: Mutex<u64>,
    }

    impl MemStore {
        fn with(orders: Vec<Order>) -> Self {
            Self { orders: Mutex::new(orders), saves: Mutex::new(0) }
        }
    }

    impl OrderStore for MemStore {
        fn order_ids(&self) -> impl std::future::Future<Output = crate::Result<Vec<Uuid>>> + Send {
            let ids = self.orders.lock().unwrap().iter().map(|o| o.id).collect();
            async move { Ok(ids) }
        }

        fn load(&self, id: Uuid) -> impl std::future::Future<Output = crate::Result<Option<Order>>> + Send {
            let found = self.orders.lock().unwrap().iter().find(|o| o.id == id).cloned();
            async move { Ok(found) }
        }

        fn save(&self, order: &Order) -> impl std::future::Future<Output = crate::Result<()>> + Send {
            {
                let mut orders = self.orders.lock().unwrap();
                if let Some(slot) = orders.iter_mut().find(|o| o.id == order.id) {
                    *slot = order.clone();
                }
                *self.saves.lock().unwrap() += 1;
            }
            async { Ok(()) }
        }
    }

    fn tiered_product() -> CatalogProduct {
        CatalogProduct {
            name: "Bulk Bolts".into(),
            image: "bolts.jpg".into(),
            pricing: PricingConfig {
                base_price: 50.0,
                unit_set: 10,
                bulk_tiers: vec![BulkTier {
                    minimum: Some(5),
                    maximum: Some(20),
                    selling_price_set: 40.0,
                }],
                gst_percent: 18.0,
            },
        }
    }

    fn legacy_order(product_ref: &str, quantity: u32) -> Order {
        let bare = OrderLine {
            product_ref: product_ref.into(),
            quantity,
            unit_set: 1,
            ..OrderLine::default()
        };
        Order::create("ORD-LEGACY01", "buyer@example.com", PaymentMode::Cod, vec![bare])
    }

    #[tokio::test]
    async fn fills_missing_snapshots_and_is_idempotent() {
        let catalog = FakeCatalog(HashMap::from([("p1".to_string(), tiered_product())]));
        let store = MemStore::with(vec![legacy_order("p1", 60)]);

        let first = migrate_all_orders(&catalog, &store).await.unwrap();
        assert_eq!(first, MigrationReport { total: 1, updated: 1, skipped: 0, errored: 0 });

        let migrated = store.orders.lock().unwrap()[0].clone();
        assert_eq!(migrated.line_items[0].unit_price, dec!(40));
        assert_eq!(migrated.line_items[0].net_amount, Some(dec!(2400.00)));
        assert_eq!(migrated.line_items[0].product_name, "Bulk Bolts");
        assert_eq!(migrated.line_items[0].unit_set, 10);
        assert!(migrated.line_items[0].snapshot_complete());

        let second = migrate_all_orders(&catalog, &store).await.unwrap();
        assert_eq!(second, MigrationReport { total: 1, updated: 0, skipped: 1, errored: 0 });
        assert_eq!(*store.saves.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn complete_snapshots_are_left_untouched() {
        let line = OrderLine { product_ref: "p1".into(), quantity: 2, unit_set: 1, ..OrderLine::default() }
            .with_amounts(dec!(99), Decimal::ZERO);
        let order = Order::create("ORD-DONE0001", "buyer@example.com", PaymentMode::Cod, vec![line]);
        let catalog = FakeCatalog(HashMap::from([("p1".to_string(), tiered_product())]));
        let store = MemStore::with(vec![order]);

        let report = migrate_all_orders(&catalog, &store).await.unwrap();
        assert_eq!(report.skipped, 1);
        // The catalog says 50/40 with GST, but the frozen 99 survives.
        assert_eq!(store.orders.lock().unwrap()[0].line_items[0].unit_price, dec!(99));
    }

    #[tokio::test]
    async fn missing_product_leaves_line_for_later() {
        let catalog = FakeCatalog(HashMap::new());
        let store = MemStore::with(vec![legacy_order("ghost", 3)]);

        let report = migrate_all_orders(&catalog, &store).await.unwrap();
        assert_eq!(report.skipped, 1);
        let line = store.orders.lock().unwrap()[0].line_items[0].clone();
        assert!(!line.snapshot_complete());
        assert!(line.product_name.is_empty());
    }

    #[tokio::test]
    async fn one_bad_order_does_not_abort_the_batch() {
        struct FlakyCatalog;
        impl CatalogLookup for FlakyCatalog {
            fn product_by_id(
                &self,
                id: &str,
            ) -> impl std::future::Future<Output = crate::Result<Option<CatalogProduct>>> + Send
            {
                let result = if id == "boom" {
                    Err(crate::MarketError::Catalog("timeout".into()))
                } else {
                    Ok(Some(tiered_product()))
                };
                async move { result }
            }
        }

        let store = MemStore::with(vec![legacy_order("boom", 1), legacy_order("p1", 60)]);
        let report = migrate_all_orders(&FlakyCatalog, &store).await.unwrap();
        assert_eq!(report, MigrationReport { total: 2, updated: 1, skipped: 0, errored: 1 });
    }
}
