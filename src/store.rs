//! Postgres-backed implementations of the catalog and order capabilities.
//!
//! Line items and bulk tiers are stored as JSONB documents inside their
//! parent rows; deserialization is deliberately permissive so historical
//! documents written before snapshots existed still load.

use std::future::Future;

use sqlx::PgPool;
use uuid::Uuid;

use crate::catalog::{CatalogLookup, CatalogProduct};
use crate::domain::order::Order;
use crate::domain::snapshot::OrderLine;
use crate::domain::{OrderStatus, PaymentMode, PricingConfig};
use crate::migration::OrderStore;
use crate::{MarketError, Result};

#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct PricingRow {
    name: String,
    image_url: Option<String>,
    base_price: f64,
    unit_set: i32,
    bulk_tiers: serde_json::Value,
    gst_percent: f64,
}

impl CatalogLookup for PgCatalog {
    fn product_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CatalogProduct>>> + Send {
        let pool = self.pool.clone();
        let id = id.to_string();
        async move {
            // Non-UUID refs can only come from legacy documents; they have
            // no catalog entry by definition.
            let Ok(product_id) = Uuid::parse_str(&id) else {
                return Ok(None);
            };
            let row = sqlx::query_as::<_, PricingRow>(
                "SELECT name, image_url, base_price, unit_set, bulk_tiers, gst_percent \
                 FROM products WHERE id = $1 AND status = 'active'",
            )
            .bind(product_id)
            .fetch_optional(&pool)
            .await
            .map_err(|e| MarketError::Catalog(e.to_string()))?;

            Ok(row.map(|r| CatalogProduct {
                name: r.name,
                image: r.image_url.unwrap_or_default(),
                pricing: PricingConfig {
                    base_price: r.base_price,
                    unit_set: r.unit_set.max(0) as u32,
                    bulk_tiers: serde_json::from_value(r.bulk_tiers).unwrap_or_default(),
                    gst_percent: r.gst_percent,
                },
            }))
        }
    }
}

#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    order_number: String,
    customer_email: String,
    status: String,
    payment_mode: String,
    line_items: serde_json::Value,
    delivery_charge: rust_decimal::Decimal,
    cod_charge: rust_decimal::Decimal,
    discount: rust_decimal::Decimal,
    amount_paid: rust_decimal::Decimal,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Order {
            id: row.id,
            order_number: row.order_number,
            customer_email: row.customer_email,
            status: OrderStatus::parse(&row.status),
            payment_mode: PaymentMode::parse(&row.payment_mode),
            line_items: parse_lines(row.line_items),
            delivery_charge: row.delivery_charge,
            cod_charge: row.cod_charge,
            discount: row.discount,
            amount_paid: row.amount_paid,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Element-wise parse so one malformed legacy line degrades to an empty
/// line instead of discarding the whole document.
fn parse_lines(value: serde_json::Value) -> Vec<OrderLine> {
    match value {
        serde_json::Value::Array(items) => items
            .into_iter()
            .map(|item| serde_json::from_value(item).unwrap_or_default())
            .collect(),
        _ => Vec::new(),
    }
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn insert(&self, order: &Order) -> Result<()> {
        sqlx::query(
            "INSERT INTO orders (id, order_number, customer_email, status, payment_mode, \
             line_items, delivery_charge, cod_charge, discount, amount_paid, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)",
        )
        .bind(order.id)
        .bind(&order.order_number)
        .bind(&order.customer_email)
        .bind(order.status.as_str())
        .bind(order.payment_mode.as_str())
        .bind(serde_json::to_value(&order.line_items).unwrap_or_default())
        .bind(order.delivery_charge)
        .bind(order.cod_charge)
        .bind(order.discount)
        .bind(order.amount_paid)
        .bind(order.created_at)
        .bind(order.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn list(&self, limit: i64, offset: i64) -> Result<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT * FROM orders ORDER BY created_at DESC LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }

    pub async fn count(&self) -> Result<i64> {
        let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;
        Ok(total.0)
    }
}

impl OrderStore for PgOrderStore {
    fn order_ids(&self) -> impl Future<Output = Result<Vec<Uuid>>> + Send {
        let pool = self.pool.clone();
        async move {
            let ids: Vec<(Uuid,)> = sqlx::query_as("SELECT id FROM orders ORDER BY created_at")
                .fetch_all(&pool)
                .await?;
            Ok(ids.into_iter().map(|(id,)| id).collect())
        }
    }

    fn load(&self, id: Uuid) -> impl Future<Output = Result<Option<Order>>> + Send {
        let pool = self.pool.clone();
        async move {
            let row = sqlx::query_as::<_, OrderRow>("SELECT * FROM orders WHERE id = $1")
                .bind(id)
                .fetch_optional(&pool)
                .await?;
            Ok(row.map(Order::from))
        }
    }

    fn save(&self, order: &Order) -> impl Future<Output = Result<()>> + Send {
        let pool = self.pool.clone();
        let order = order.clone();
        async move {
            sqlx::query(
                "UPDATE orders SET status = $2, payment_mode = $3, line_items = $4, \
                 delivery_charge = $5, cod_charge = $6, discount = $7, amount_paid = $8, \
                 updated_at = $9 WHERE id = $1",
            )
            .bind(order.id)
            .bind(order.status.as_str())
            .bind(order.payment_mode.as_str())
            .bind(serde_json::to_value(&order.line_items).unwrap_or_default())
            .bind(order.delivery_charge)
            .bind(order.cod_charge)
            .bind(order.discount)
            .bind(order.amount_paid)
            .bind(order.updated_at)
            .execute(&pool)
            .await?;
            Ok(())
        }
    }
}
