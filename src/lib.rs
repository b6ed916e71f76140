//! # stepmigrate
//!
//! > **Ordered, reversible SQL migrations, one transaction per step.**
//!
//! Migrations live in a directory as pairs of files:
//!
//! ```text
//! migrations/
//! ├── 1_init.up.sql
//! ├── 1_init.down.sql
//! ├── 2_add_col.up.sql
//! └── 2_add_col.down.sql
//! ```
//!
//! The database records the index of the last applied up migration. Moving to
//! another position runs the up files (or the down files) in between, each in
//! its own transaction together with the position update.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use stepmigrate::prelude::*;
//!
//! let store = PgStore::connect("postgres://localhost/app", DEFAULT_TABLE).await?;
//! let mut migrator = Migrator::new(store, "./migrations").await?;
//!
//! migrator.migrate_all().await?;      // up to the newest migration
//! migrator.migrate_relative(-1).await?; // undo the last one
//! migrator.migrate_to(0).await?;        // undo everything
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod migration;
pub mod parser;
pub mod sequence;
pub mod store;

pub mod prelude {
    pub use crate::config::Config;
    pub use crate::engine::{Migrator, PlannedStep};
    pub use crate::error::*;
    pub use crate::migration::{Direction, MigrationFile, Step};
    pub use crate::sequence::{scan_dir, ScanPolicy, Sequence};
    pub use crate::store::{AppliedStep, PgStore, PositionStore, StepRecord, DEFAULT_TABLE};
}

/// Scan `dir` and build a validated [`sequence::Sequence`], ignoring
/// malformed file names.
///
/// # Example
///
/// ```no_run
/// let sequence = stepmigrate::load("./migrations").unwrap();
/// println!("{} migrations available", sequence.len());
/// ```
pub fn load(dir: impl AsRef<std::path::Path>) -> Result<sequence::Sequence, error::MigrateError> {
    sequence::Sequence::load(dir, sequence::ScanPolicy::Lenient)
}
