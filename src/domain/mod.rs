//! Domain module
pub mod num;
pub mod order;
pub mod pricing;
pub mod snapshot;
pub mod totals;

pub use order::{Order, OrderStatus, PaymentMode};
pub use pricing::{resolve_unit_price, BulkTier, PricingConfig};
pub use snapshot::{enrich_lines, OrderLine, RequestedLine};
pub use totals::{compute_totals, OrderTotals};
