//! TradeCart - B2B wholesale marketplace order service

use anyhow::Result;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use tradecart::domain::{
    compute_totals, enrich_lines, Order, OrderStatus, OrderTotals, PaymentMode, RequestedLine,
};
use tradecart::migration::{migrate_all_orders, MigrationReport, OrderStore};
use tradecart::store::{PgCatalog, PgOrderStore};
use tradecart::MarketError;

#[derive(Clone)]
pub struct AppState {
    pub db: sqlx::PgPool,
}

impl AppState {
    fn catalog(&self) -> PgCatalog {
        PgCatalog::new(self.db.clone())
    }

    fn orders(&self) -> PgOrderStore {
        PgOrderStore::new(self.db.clone())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
    let db = PgPoolOptions::new()
        .max_connections(10)
        .connect(&std::env::var("DATABASE_URL")?)
        .await?;
    sqlx::migrate!("./migrations").run(&db).await?;
    let state = AppState { db };

    let app = Router::new()
        .route("/health", get(|| async { Json(serde_json::json!({"status": "healthy", "service": "tradecart"})) }))
        .route("/api/v1/products", get(list_products).post(create_product))
        .route("/api/v1/products/:id", get(get_product))
        .route("/api/v1/orders", get(list_orders).post(create_order))
        .route("/api/v1/orders/:id", get(get_order).put(update_order))
        .route("/api/v1/admin/migrations/order-snapshots", post(run_snapshot_backfill))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let port = std::env::var("PORT").unwrap_or_else(|_| "8084".to_string());
    tracing::info!("TradeCart listening on 0.0.0.0:{}", port);
    axum::serve(tokio::net::TcpListener::bind(format!("0.0.0.0:{}", port)).await?, app).await?;
    Ok(())
}

type HandlerError = (StatusCode, String);

fn internal(e: impl std::fmt::Display) -> HandlerError {
    (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
}

fn map_err(e: MarketError) -> HandlerError {
    match e {
        MarketError::OrderNotFound => (StatusCode::NOT_FOUND, e.to_string()),
        _ => internal(e),
    }
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Product {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub base_price: f64,
    pub unit_set: i32,
    pub bulk_tiers: serde_json::Value,
    pub gst_percent: f64,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub total: i64,
    pub page: u32,
}

async fn list_products(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<Product>>, HandlerError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let products = sqlx::query_as::<_, Product>(
        "SELECT * FROM products WHERE status = 'active' ORDER BY created_at DESC LIMIT $1 OFFSET $2",
    )
    .bind(per_page as i64)
    .bind(((page - 1) * per_page) as i64)
    .fetch_all(&s.db)
    .await
    .map_err(internal)?;
    let total: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM products WHERE status = 'active'")
        .fetch_one(&s.db)
        .await
        .map_err(internal)?;
    Ok(Json(PaginatedResponse { data: products, total: total.0, page }))
}

async fn get_product(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Product>, HandlerError> {
    sqlx::query_as::<_, Product>("SELECT * FROM products WHERE id = $1")
        .bind(id)
        .fetch_optional(&s.db)
        .await
        .map_err(internal)?
        .map(Json)
        .ok_or((StatusCode::NOT_FOUND, "Not found".to_string()))
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub base_price: f64,
    pub unit_set: Option<i32>,
    pub bulk_tiers: Option<serde_json::Value>,
    pub gst_percent: Option<f64>,
}

async fn create_product(
    State(s): State<AppState>,
    Json(r): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<Product>), HandlerError> {
    let sku = format!("SKU-{:08}", rand::random::<u32>());
    let p = sqlx::query_as::<_, Product>(
        "INSERT INTO products (id, sku, name, description, image_url, base_price, unit_set, bulk_tiers, gst_percent, status, created_at, updated_at) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, 'active', NOW(), NOW()) RETURNING *",
    )
    .bind(Uuid::now_v7())
    .bind(&sku)
    .bind(&r.name)
    .bind(&r.description)
    .bind(&r.image_url)
    .bind(r.base_price)
    .bind(r.unit_set.unwrap_or(1).max(1))
    .bind(r.bulk_tiers.unwrap_or_else(|| serde_json::json!([])))
    .bind(r.gst_percent.unwrap_or(0.0))
    .fetch_one(&s.db)
    .await
    .map_err(internal)?;
    Ok((StatusCode::CREATED, Json(p)))
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    #[serde(flatten)]
    pub order: Order,
    pub totals: OrderTotals,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        let totals = compute_totals(&order);
        Self { order, totals }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateOrderRequest {
    pub customer_email: String,
    #[serde(default)]
    pub payment_mode: PaymentMode,
    pub items: Vec<RequestedLine>,
    pub delivery_charge: Option<f64>,
    pub cod_charge: Option<f64>,
    pub discount: Option<f64>,
}

async fn create_order(
    State(s): State<AppState>,
    Json(r): Json<CreateOrderRequest>,
) -> Result<(StatusCode, Json<OrderResponse>), HandlerError> {
    use tradecart::domain::num::coerce_amount;

    let lines = enrich_lines(&r.items, &s.catalog()).await.map_err(map_err)?;
    let order_number = format!("ORD-{:08}", rand::random::<u32>());
    let mut order = Order::create(order_number, r.customer_email, r.payment_mode, lines);
    if let Some(charge) = r.delivery_charge {
        order.set_delivery_charge(coerce_amount(charge));
    }
    if let Some(charge) = r.cod_charge {
        order.set_cod_charge(coerce_amount(charge));
    }
    if let Some(discount) = r.discount {
        order.set_discount(coerce_amount(discount));
    }
    s.orders().insert(&order).await.map_err(map_err)?;
    Ok((StatusCode::CREATED, Json(order.into())))
}

async fn list_orders(
    State(s): State<AppState>,
    Query(p): Query<ListParams>,
) -> Result<Json<PaginatedResponse<OrderResponse>>, HandlerError> {
    let page = p.page.unwrap_or(1).max(1);
    let per_page = p.per_page.unwrap_or(20).min(100);
    let store = s.orders();
    let orders = store
        .list(per_page as i64, ((page - 1) * per_page) as i64)
        .await
        .map_err(map_err)?;
    let total = store.count().await.map_err(map_err)?;
    Ok(Json(PaginatedResponse {
        data: orders.into_iter().map(OrderResponse::from).collect(),
        total,
        page,
    }))
}

async fn get_order(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<OrderResponse>, HandlerError> {
    s.orders()
        .load(id)
        .await
        .map_err(map_err)?
        .map(|o| Json(o.into()))
        .ok_or_else(|| map_err(MarketError::OrderNotFound))
}

/// Admin order edit. Line snapshots already on the order are never
/// recomputed; added items go through the same enrichment as creation.
#[derive(Debug, Deserialize)]
pub struct UpdateOrderRequest {
    pub status: Option<String>,
    pub delivery_charge: Option<f64>,
    pub cod_charge: Option<f64>,
    pub discount: Option<f64>,
    /// Payment received now, added to the running amount paid.
    pub payment_received: Option<f64>,
    #[serde(default)]
    pub add_items: Vec<RequestedLine>,
    #[serde(default)]
    pub remove_products: Vec<String>,
}

async fn update_order(
    State(s): State<AppState>,
    Path(id): Path<Uuid>,
    Json(r): Json<UpdateOrderRequest>,
) -> Result<Json<OrderResponse>, HandlerError> {
    use tradecart::domain::num::coerce_amount;

    let store = s.orders();
    let mut order = store
        .load(id)
        .await
        .map_err(map_err)?
        .ok_or_else(|| map_err(MarketError::OrderNotFound))?;

    if let Some(status) = r.status.as_deref() {
        order.set_status(OrderStatus::parse(status));
    }
    if let Some(charge) = r.delivery_charge {
        order.set_delivery_charge(coerce_amount(charge));
    }
    if let Some(charge) = r.cod_charge {
        order.set_cod_charge(coerce_amount(charge));
    }
    if let Some(discount) = r.discount {
        order.set_discount(coerce_amount(discount));
    }
    if let Some(payment) = r.payment_received {
        order.record_payment(coerce_amount(payment));
    }
    for product_ref in &r.remove_products {
        order.remove_lines(product_ref);
    }
    if !r.add_items.is_empty() {
        let added = enrich_lines(&r.add_items, &s.catalog()).await.map_err(map_err)?;
        order.append_lines(added);
    }

    store.save(&order).await.map_err(map_err)?;
    Ok(Json(order.into()))
}

// ---------------------------------------------------------------------------
// Admin
// ---------------------------------------------------------------------------

async fn run_snapshot_backfill(
    State(s): State<AppState>,
) -> Result<Json<MigrationReport>, HandlerError> {
    let report = migrate_all_orders(&s.catalog(), &s.orders())
        .await
        .map_err(map_err)?;
    Ok(Json(report))
}
