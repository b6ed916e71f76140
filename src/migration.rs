//! Core migration types.

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

/// Which way a migration file moves the database.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Direction {
    /// `.up.sql`: advances the position by one.
    #[serde(rename = "up")]
    Forward,
    /// `.down.sql`: undoes a step, lowering the position by one.
    #[serde(rename = "down")]
    Reverse,
}

impl Direction {
    /// Integer code stored in the position log.
    pub fn code(self) -> i32 {
        match self {
            Direction::Forward => 1,
            Direction::Reverse => 0,
        }
    }

    /// Inverse of [`Direction::code`].
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            1 => Some(Direction::Forward),
            0 => Some(Direction::Reverse),
            _ => None,
        }
    }

    /// Verb used in logs and error messages.
    pub fn verb(self) -> &'static str {
        match self {
            Direction::Forward => "apply",
            Direction::Reverse => "undo",
        }
    }

    /// File name token (`up` or `down`).
    pub fn token(self) -> &'static str {
        match self {
            Direction::Forward => "up",
            Direction::Reverse => "down",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

/// One migration file on disk. Its content is read only when applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MigrationFile {
    pub path: PathBuf,
    pub index: usize,
    pub direction: Direction,
    pub label: String,
}

/// The up and down files sharing one index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub forward: MigrationFile,
    pub reverse: MigrationFile,
}

impl Step {
    pub fn index(&self) -> usize {
        self.forward.index
    }

    pub fn label(&self) -> &str {
        &self.forward.label
    }

    /// The file to run when walking in `direction`.
    pub fn file(&self, direction: Direction) -> &MigrationFile {
        match direction {
            Direction::Forward => &self.forward,
            Direction::Reverse => &self.reverse,
        }
    }
}
