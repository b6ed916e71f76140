//! Migration engine.
//!
//! A [`Migrator`] owns a [`PositionStore`], the validated [`Sequence`] and the
//! current position. It walks from the current position to a target one step
//! at a time; each step is its own transaction. A failing step stops the walk
//! and leaves every earlier step committed.

use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{MigrateError, MigrateResult};
use crate::migration::{Direction, Step};
use crate::sequence::{ScanPolicy, Sequence};
use crate::store::{AppliedStep, PositionStore, StepRecord};

/// One step a walk would run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedStep {
    pub index: usize,
    pub direction: Direction,
    pub label: String,
    pub path: PathBuf,
    /// Position once the step has been applied.
    pub position: usize,
}

/// Clamp a requested target into `0..=len`.
///
/// Returns the clamped value and whether clamping happened.
pub fn clamp_target(target: i64, len: usize) -> (usize, bool) {
    if target < 0 {
        (0, true)
    } else if target as u64 > len as u64 {
        (len, true)
    } else {
        (target as usize, false)
    }
}

/// Applies migrations from a directory to a database.
pub struct Migrator<S> {
    store: S,
    dir: PathBuf,
    sequence: Sequence,
    current: usize,
}

impl<S: PositionStore> Migrator<S> {
    /// Create a migrator, skipping (and logging) malformed files.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let store = PgStore::connect("postgres://localhost/mydb", DEFAULT_TABLE).await?;
    /// let mut migrator = Migrator::new(store, "./migrations").await?;
    /// migrator.migrate_all().await?;
    /// ```
    pub async fn new(store: S, dir: impl AsRef<Path>) -> MigrateResult<Self> {
        Self::with_policy(store, dir, ScanPolicy::default()).await
    }

    /// Create a migrator with an explicit policy for malformed files.
    pub async fn with_policy(
        mut store: S,
        dir: impl AsRef<Path>,
        policy: ScanPolicy,
    ) -> MigrateResult<Self> {
        let dir = dir.as_ref().to_path_buf();

        store.ensure_store().await?;

        let position = match store.latest_position().await? {
            None => 0,
            Some(p) => usize::try_from(p).map_err(|_| MigrateError::InvalidPosition(p))?,
        };

        let sequence = Sequence::load(&dir, policy)?;

        if position > sequence.len() {
            return Err(MigrateError::PositionAheadOfMigrations {
                position,
                available: sequence.len(),
            });
        }

        info!(
            "Database at position {}, {} migration(s) available in {}",
            position,
            sequence.len(),
            dir.display()
        );

        Ok(Self {
            store,
            dir,
            sequence,
            current: position,
        })
    }

    /// Index of the last applied up migration (0 when none are applied).
    pub fn current_position(&self) -> usize {
        self.current
    }

    pub fn sequence(&self) -> &Sequence {
        &self.sequence
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of up migrations not yet applied.
    pub fn pending(&self) -> usize {
        self.sequence.len() - self.current
    }

    /// The steps `migrate_to(target)` would run, without touching the database.
    pub fn plan_to(&self, target: i64) -> MigrateResult<Vec<PlannedStep>> {
        let (target, _) = clamp_target(target, self.sequence.len());
        let direction = if target > self.current {
            Direction::Forward
        } else {
            Direction::Reverse
        };

        let mut plan = Vec::new();
        let mut position = self.current;
        while position != target {
            // Undoing step `position` lands on `position - 1`.
            let (index, next) = match direction {
                Direction::Forward => (position + 1, position + 1),
                Direction::Reverse => (position, position - 1),
            };
            let step = self.step(index)?;
            let file = step.file(direction);
            plan.push(PlannedStep {
                index,
                direction,
                label: file.label.clone(),
                path: file.path.clone(),
                position: next,
            });
            position = next;
        }

        Ok(plan)
    }

    /// Walk to `target`, clamped into `0..=len`.
    pub async fn migrate_to(&mut self, target: i64) -> MigrateResult<()> {
        let len = self.sequence.len();
        let (clamped, was_clamped) = clamp_target(target, len);
        if was_clamped {
            if target < 0 {
                warn!("Trying to migrate below 0, defaulting to 0");
            } else {
                warn!(
                    "Trying to migrate to {}, but highest available is {}",
                    target, len
                );
            }
        }

        info!("Migrating from {} to {}", self.current, clamped);

        for planned in self.plan_to(clamped as i64)? {
            self.apply(planned).await?;
        }

        Ok(())
    }

    /// Move `delta` steps forward (positive) or back (negative).
    pub async fn migrate_relative(&mut self, delta: i64) -> MigrateResult<()> {
        let target = (self.current as i64).saturating_add(delta);
        self.migrate_to(target).await
    }

    /// Apply every pending migration.
    pub async fn migrate_all(&mut self) -> MigrateResult<()> {
        let len = self.sequence.len();
        self.migrate_to(len as i64).await
    }

    /// The persisted log of applied steps.
    pub async fn history(&mut self) -> MigrateResult<Vec<AppliedStep>> {
        self.store.history().await
    }

    /// Give back the store, e.g. to close its connection.
    pub fn into_store(self) -> S {
        self.store
    }

    fn step(&self, index: usize) -> MigrateResult<&Step> {
        self.sequence
            .get(index)
            .ok_or(MigrateError::MissingStep(index))
    }

    async fn apply(&mut self, planned: PlannedStep) -> MigrateResult<()> {
        let PlannedStep {
            index,
            direction,
            label,
            path,
            position,
        } = planned;

        let fail = |reason: String| MigrateError::StepFailed {
            index,
            direction,
            label: label.clone(),
            reason,
        };

        info!(index, %direction, "{} migration {} {}", direction.verb(), index, label);

        let sql = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| fail(format!("could not read '{}': {}", path.display(), e)))?;

        let record = StepRecord {
            position,
            index,
            direction,
            label: label.clone(),
        };
        self.store
            .apply_step(&sql, &record)
            .await
            .map_err(|e| fail(e.to_string()))?;

        self.current = position;
        info!(position, "Migration {} {} done", index, label);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clamp_target() {
        assert_eq!(clamp_target(2, 4), (2, false));
        assert_eq!(clamp_target(0, 4), (0, false));
        assert_eq!(clamp_target(4, 4), (4, false));
        assert_eq!(clamp_target(9, 4), (4, true));
        assert_eq!(clamp_target(-3, 4), (0, true));
        assert_eq!(clamp_target(1, 0), (0, true));
        assert_eq!(clamp_target(i64::MAX, 4), (4, true));
    }
}
