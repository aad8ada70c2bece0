//! Warehouse client trait.

use async_trait::async_trait;
use cohortql_core::CompiledQuery;

use crate::error::Result;
use crate::rows::QueryRows;

/// Runs a parameterized query and returns its rows.
///
/// Implementations bind `query.parameters` by name and must never inline
/// them into `query.sql`. Timeouts, cancellation and retries belong to the
/// implementation or its caller. Implementations must be `Send + Sync`.
#[async_trait]
pub trait WarehouseClient: Send + Sync {
    async fn execute(&self, query: &CompiledQuery) -> Result<QueryRows>;

    /// Backend name for logs.
    fn backend_name(&self) -> &'static str;
}
