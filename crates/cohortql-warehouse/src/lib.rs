//! Warehouse seam for compiled cohort queries.
//!
//! The compiler never talks to a warehouse directly; it hands a
//! [`CompiledQuery`](cohortql_core::CompiledQuery) to a [`WarehouseClient`]
//! and reads typed columns back from [`QueryRows`]. [`InMemoryWarehouse`]
//! evaluates the query plan over a small fixture and is used by tests and
//! the CLI.
//!
//! # Example
//!
//! ```ignore
//! use cohortql_warehouse::{InMemoryWarehouse, WarehouseClient};
//!
//! let warehouse = InMemoryWarehouse::from_path("fixture.json")?;
//! let rows = warehouse.execute(&compiled).await?;
//! let count = rows.single_i64("count")?;
//! ```

pub mod error;
pub mod fixture;
pub mod memory;
pub mod rows;
pub mod traits;

pub use error::{Result, WarehouseError};
pub use fixture::{Fixture, FixtureAncestor, FixtureCriterion, FixtureEvent, FixturePerson};
pub use memory::InMemoryWarehouse;
pub use rows::{QueryRows, Row};
pub use traits::WarehouseClient;

/// Type alias for a shareable warehouse client.
pub type DynWarehouse = std::sync::Arc<dyn WarehouseClient>;
