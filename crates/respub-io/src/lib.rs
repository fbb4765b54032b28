//! File-facing half of the publication pipeline: finding raw result files,
//! reading and writing tables, loading the static lookup assets, and the
//! standalone failure checker.

pub mod discovery;
pub mod failures;
pub mod frames;
pub mod lookups;

pub use discovery::{discover_result_files, upgrade_number, ResultFiles, UpgradeFile};
pub use failures::{get_failures, render_failures, FailureRecord};
pub use frames::{published_paths, read_frame, write_published, PublishedPaths, TableFormat};
pub use lookups::{load_catalog, load_geo_lookups, load_income_lookup};
