//! TradeCart - B2B Wholesale Marketplace Order Service
//!
//! Self-hosted order backend for wholesale buyers: bulk-tier pricing,
//! order-time price snapshots, and consistent total reconciliation.
//!
//! ## Features
//! - Quantity-tiered ("bulk") unit pricing with per-set thresholds
//! - Immutable price snapshots frozen at order placement
//! - Order totals (subtotal, GST, delivery/COD charges, discount, pending)
//! - Snapshot backfill migration for historical orders

use thiserror::Error;

pub mod catalog;
pub mod domain;
pub mod migration;
pub mod store;

#[derive(Error, Debug)]
pub enum MarketError {
    #[error("Order not found")]
    OrderNotFound,

    #[error("Catalog unavailable: {0}")]
    Catalog(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for MarketError {
    fn from(e: sqlx::Error) -> Self {
        MarketError::Storage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, MarketError>;
