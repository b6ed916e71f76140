//! Error types for stepmigrate.

use std::path::PathBuf;

use thiserror::Error;

use crate::migration::Direction;

/// The main error type for migration operations.
#[derive(Debug, Error)]
pub enum MigrateError {
    /// A file name does not follow `<index>_<label>.<up|down>.sql`.
    #[error("Malformed migration file '{file_name}': {reason}")]
    MalformedMigrationFile { file_name: String, reason: String },

    /// Two files claim the same index and direction.
    #[error("Duplicate {direction} migration found for index {index}")]
    DuplicateMigration { index: usize, direction: Direction },

    /// An index between 1 and the highest index has no files at all.
    #[error("Migration index is not sequential, missing index {0}")]
    NonSequentialMigrations(usize),

    /// An index has a down file but no up file.
    #[error("Missing up migration for index {0}")]
    MissingForwardMigration(usize),

    /// An index has an up file but no down file.
    #[error("Missing down migration for index {0}")]
    MissingReverseMigration(usize),

    /// Strict scanning found `.sql` files that are not migrations.
    #[error("Found SQL files that are not valid migrations: {}", .0.join(", "))]
    SkippedMigrationFiles(Vec<String>),

    /// The database is further along than the migration files on disk.
    #[error("Database is currently at {position}, but migrations only go up to {available}")]
    PositionAheadOfMigrations { position: usize, available: usize },

    /// The persisted position is not a valid step count.
    #[error("Database records an invalid migration position: {0}")]
    InvalidPosition(i64),

    /// A step that the sequence should contain could not be found.
    #[error("No migration step at index {0}")]
    MissingStep(usize),

    /// Applying a single step failed; earlier steps stay committed.
    #[error("Could not {verb} migration {index} ({label}): {reason}", verb = .direction.verb())]
    StepFailed {
        index: usize,
        direction: Direction,
        label: String,
        reason: String,
    },

    /// Database error.
    #[error("Database error: {0}")]
    Database(String),

    /// Connection error.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The migrations directory could not be walked.
    #[error("Could not scan '{}': {message}", .path.display())]
    Scan { path: PathBuf, message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MigrateError {
    /// Create a malformed file error.
    pub fn malformed(file_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedMigrationFile {
            file_name: file_name.into(),
            reason: reason.into(),
        }
    }

    /// Create a scan error for the given directory.
    pub fn scan(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::Scan {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for MigrateError {
    fn from(e: sqlx::Error) -> Self {
        Self::Database(e.to_string())
    }
}

/// Result type alias for migration operations.
pub type MigrateResult<T> = Result<T, MigrateError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = MigrateError::malformed("x.sql", "missing index");
        assert_eq!(
            err.to_string(),
            "Malformed migration file 'x.sql': missing index"
        );
    }

    #[test]
    fn test_duplicate_names_direction() {
        let err = MigrateError::DuplicateMigration {
            index: 3,
            direction: Direction::Forward,
        };
        assert_eq!(err.to_string(), "Duplicate up migration found for index 3");
    }

    #[test]
    fn test_step_failed_names_step() {
        let err = MigrateError::StepFailed {
            index: 2,
            direction: Direction::Reverse,
            label: "add_col".to_string(),
            reason: "syntax error".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Could not undo migration 2 (add_col): syntax error"
        );
    }
}
