//! Catalog lookup capability
//!
//! The pricing core never touches the database directly; callers inject
//! anything that can fetch a product by id. The Postgres implementation
//! lives in [`crate::store`]; tests use in-memory fakes.

use std::future::Future;

use serde::{Deserialize, Serialize};

use crate::domain::PricingConfig;
use crate::Result;

/// Catalog attributes consumed at enrichment time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CatalogProduct {
    pub name: String,
    pub image: String,
    pub pricing: PricingConfig,
}

/// Fetch a product by its reference. `Ok(None)` means the product does not
/// exist (enrichment degrades, migration skips the line); `Err` means the
/// catalog itself is unavailable and propagates to the caller.
pub trait CatalogLookup: Sync {
    fn product_by_id(
        &self,
        id: &str,
    ) -> impl Future<Output = Result<Option<CatalogProduct>>> + Send;
}
