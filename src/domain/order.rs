//! Order Aggregate
//!
//! Line-item snapshots are frozen at creation; only order-level adjustments
//! (delivery charge, COD charge, discount, amount paid), status, and the
//! line list itself (admin append/remove) change afterwards. Orders are
//! never hard-deleted, only moved through statuses.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::snapshot::OrderLine;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub order_number: String,
    pub customer_email: String,
    pub status: OrderStatus,
    pub payment_mode: PaymentMode,
    pub line_items: Vec<OrderLine>,
    #[serde(default)]
    pub delivery_charge: Decimal,
    #[serde(default)]
    pub cod_charge: Decimal,
    #[serde(default)]
    pub discount: Decimal,
    #[serde(default)]
    pub amount_paid: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMode {
    #[default]
    Cod,
    Online,
}

impl OrderStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
        }
    }

    /// Unknown storage values fall back to `Pending`.
    pub fn parse(value: &str) -> Self {
        match value {
            "confirmed" => Self::Confirmed,
            "processing" => Self::Processing,
            "shipped" => Self::Shipped,
            "delivered" => Self::Delivered,
            "cancelled" => Self::Cancelled,
            _ => Self::Pending,
        }
    }
}

impl PaymentMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cod => "cod",
            Self::Online => "online",
        }
    }

    pub fn parse(value: &str) -> Self {
        match value {
            "online" => Self::Online,
            _ => Self::Cod,
        }
    }
}

impl Order {
    pub fn create(
        order_number: impl Into<String>,
        customer_email: impl Into<String>,
        payment_mode: PaymentMode,
        line_items: Vec<OrderLine>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            order_number: order_number.into(),
            customer_email: customer_email.into(),
            status: OrderStatus::Pending,
            payment_mode,
            line_items,
            delivery_charge: Decimal::ZERO,
            cod_charge: Decimal::ZERO,
            discount: Decimal::ZERO,
            amount_paid: Decimal::ZERO,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn set_delivery_charge(&mut self, amount: Decimal) {
        self.delivery_charge = amount;
        self.touch();
    }

    pub fn set_cod_charge(&mut self, amount: Decimal) {
        self.cod_charge = amount;
        self.touch();
    }

    pub fn set_discount(&mut self, amount: Decimal) {
        self.discount = amount;
        self.touch();
    }

    pub fn record_payment(&mut self, amount: Decimal) {
        self.amount_paid += amount;
        self.touch();
    }

    pub fn set_status(&mut self, status: OrderStatus) {
        self.status = status;
        self.touch();
    }

    /// Append already-enriched lines (admin edit). Existing snapshots are
    /// left untouched.
    pub fn append_lines(&mut self, lines: Vec<OrderLine>) {
        self.line_items.extend(lines);
        self.touch();
    }

    /// Remove every line referencing `product_ref`. Returns how many were
    /// removed.
    pub fn remove_lines(&mut self, product_ref: &str) -> usize {
        let before = self.line_items.len();
        self.line_items.retain(|l| l.product_ref != product_ref);
        let removed = before - self.line_items.len();
        if removed > 0 {
            self.touch();
        }
        removed
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}
