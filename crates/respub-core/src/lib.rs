//! # respub-core: published building-stock results
//!
//! Turns raw per-building batch simulation results (one baseline run plus
//! any number of upgrade runs) into published tables with a fixed schema.
//!
//! ## Pipeline
//!
//! - **Catalog**: the column-definition table mapping raw columns to
//!   published names and unit conversions ([`catalog`]).
//! - **Transform**: rename, convert and select raw columns ([`transform`]).
//! - **Derive**: income and energy burden, site-energy and all-fuels
//!   emissions totals, panel constraints, upgrade detail columns
//!   ([`derive`]).
//! - **Geo**: county FIPS and PUMA GIS join codes ([`geo`]).
//! - **Reconcile**: match each upgrade against the baseline, backfill
//!   buildings that failed only in the upgrade, compute savings
//!   ([`reconcile`]).
//! - **Schema**: validate against the catalog and emit its column order
//!   ([`schema`]).
//!
//! [`publish`] strings the stages together:
//!
//! ```rust,no_run
//! use respub_core::{publish_baseline, publish_upgrade, PublishContext};
//! # fn run(ctx: &PublishContext, raw_base: polars::prelude::DataFrame, raw_up: polars::prelude::DataFrame) -> respub_core::RespubResult<()> {
//! let baseline = publish_baseline(raw_base, ctx)?;
//! let upgrade = publish_upgrade(raw_up, &baseline.table, &baseline.failed, 1, ctx)?;
//! assert_eq!(upgrade.table.frame.height(), baseline.table.frame.height());
//! # Ok(())
//! # }
//! ```

pub mod catalog;
pub mod columns;
pub mod derive;
pub mod diagnostics;
pub mod error;
pub mod frame;
pub mod geo;
pub mod publish;
pub mod reconcile;
pub mod schema;
pub mod transform;

pub use catalog::{CatalogRecord, ColumnCatalog, ColumnMapEntry, ColumnType};
pub use derive::{Geography, IncomeLookup};
pub use diagnostics::{DiagnosticIssue, Diagnostics, Severity};
pub use error::{RespubError, RespubResult};
pub use geo::GeoLookups;
pub use publish::{
    publish_baseline, publish_upgrade, IncomeSource, PublishContext, PublishedBaseline,
    PublishedTable, PublishedUpgrade,
};
pub use reconcile::{FailedBuildingSet, UpgradeRecord};
pub use schema::{reorder_columns, SchemaReport};
