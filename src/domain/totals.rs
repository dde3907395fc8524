//! Order Total Reconciler
//!
//! One totals computation shared by the order-detail view, the order-update
//! endpoint, and the snapshot backfill. Pure over the order's stored state:
//! totals are always derived on read, never persisted as fixed truth, so
//! they stay consistent with the mutable order-level adjustments.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::num::round2;
use crate::domain::order::Order;
use crate::domain::snapshot::OrderLine;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
    pub amount_pending: Decimal,
}

/// Reconcile an order's totals from its line items and adjustments.
/// Tolerates legacy lines missing snapshot amounts: net falls back to
/// `unit_price x quantity` and tax to a live computation from the GST
/// snapshot, with anything absent treated as zero.
pub fn compute_totals(order: &Order) -> OrderTotals {
    let mut subtotal = Decimal::ZERO;
    let mut tax = Decimal::ZERO;
    for line in &order.line_items {
        let net = line_net(line);
        subtotal += net;
        tax += line
            .tax_amount
            .unwrap_or_else(|| round2(net * line.gst_percent.unwrap_or(Decimal::ZERO) / Decimal::from(100)));
    }

    let total = subtotal + tax + order.delivery_charge + order.cod_charge - order.discount;
    let amount_pending = (total - order.amount_paid).max(Decimal::ZERO);
    OrderTotals { subtotal, tax, total, amount_pending }
}

fn line_net(line: &OrderLine) -> Decimal {
    line.net_amount
        .unwrap_or_else(|| round2(line.unit_price * Decimal::from(line.quantity)))
}
