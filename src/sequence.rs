//! Directory scanning and sequencing of migration files.
//!
//! A [`Sequence`] is built once from a directory and never changes afterwards.
//! It guarantees that indices run from 1 to `len()` without gaps and that every
//! index has both an up and a down file.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{MigrateError, MigrateResult};
use crate::migration::{Direction, MigrationFile, Step};
use crate::parser::parse_file_name;

/// How to treat files in the migrations directory that fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ScanPolicy {
    /// Log and ignore them.
    #[default]
    Lenient,
    /// Fail if any of them has a `.sql` extension.
    Strict,
}

/// A file found while scanning that is not a migration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

impl SkippedFile {
    fn is_sql(&self) -> bool {
        self.path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("sql"))
    }
}

/// Result of walking a migrations directory.
#[derive(Debug, Default)]
pub struct ScanReport {
    pub files: Vec<MigrationFile>,
    pub skipped: Vec<SkippedFile>,
}

impl ScanReport {
    /// Apply `policy` to the skipped files, logging each one.
    pub fn enforce(&self, policy: ScanPolicy) -> MigrateResult<()> {
        for skipped in &self.skipped {
            warn!(path = %skipped.path.display(), "Skipping file: {}", skipped.reason);
        }

        if policy == ScanPolicy::Strict {
            let offending: Vec<String> = self
                .skipped
                .iter()
                .filter(|s| s.is_sql())
                .map(|s| s.path.display().to_string())
                .collect();
            if !offending.is_empty() {
                return Err(MigrateError::SkippedMigrationFiles(offending));
            }
        }

        Ok(())
    }
}

/// Recursively collect every migration file below `dir`.
///
/// Files are visited in file name order so that duplicate detection is
/// deterministic.
pub fn scan_dir(dir: impl AsRef<Path>) -> MigrateResult<ScanReport> {
    let dir = dir.as_ref();
    let mut report = ScanReport::default();

    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| MigrateError::scan(dir, e.to_string()))?;
        if entry.file_type().is_dir() {
            continue;
        }

        let name = entry.file_name().to_string_lossy();
        match parse_file_name(&name, entry.path()) {
            Ok(file) => {
                debug!(index = file.index, direction = %file.direction, "Found {}", name);
                report.files.push(file);
            }
            Err(MigrateError::MalformedMigrationFile { reason, .. }) => {
                report.skipped.push(SkippedFile {
                    path: entry.path().to_path_buf(),
                    reason,
                });
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

#[derive(Default)]
struct PartialStep {
    forward: Option<MigrationFile>,
    reverse: Option<MigrationFile>,
}

/// Validated, gap-free mapping from index to [`Step`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Sequence {
    steps: BTreeMap<usize, Step>,
}

impl Sequence {
    /// Pair up and down files and check the result is complete.
    pub fn build(files: impl IntoIterator<Item = MigrationFile>) -> MigrateResult<Self> {
        let mut partial: BTreeMap<usize, PartialStep> = BTreeMap::new();
        let mut ix_high = 0;

        for file in files {
            let index = file.index;
            let direction = file.direction;
            let entry = partial.entry(index).or_default();
            let slot = match direction {
                Direction::Forward => &mut entry.forward,
                Direction::Reverse => &mut entry.reverse,
            };
            if slot.is_some() {
                return Err(MigrateError::DuplicateMigration { index, direction });
            }
            *slot = Some(file);
            ix_high = ix_high.max(index);
        }

        let mut steps = BTreeMap::new();
        for index in 1..=ix_high {
            let candidate = partial
                .remove(&index)
                .ok_or(MigrateError::NonSequentialMigrations(index))?;
            let forward = candidate
                .forward
                .ok_or(MigrateError::MissingForwardMigration(index))?;
            let reverse = candidate
                .reverse
                .ok_or(MigrateError::MissingReverseMigration(index))?;
            steps.insert(index, Step { forward, reverse });
        }

        Ok(Self { steps })
    }

    /// Scan `dir`, apply `policy` to unparseable files and build the sequence.
    pub fn load(dir: impl AsRef<Path>, policy: ScanPolicy) -> MigrateResult<Self> {
        let report = scan_dir(dir)?;
        report.enforce(policy)?;
        Self::build(report.files)
    }

    /// Number of steps, which is also the highest index.
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Step> {
        self.steps.get(&index)
    }

    /// Steps in increasing index order.
    pub fn iter(&self) -> impl Iterator<Item = &Step> {
        self.steps.values()
    }
}
