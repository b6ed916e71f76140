//! Migration file name parser using nom.
//!
//! # File Name Layout
//!
//! ```text
//! 12_add_user_email.up.sql
//! ┬─ ──────┬─────── ┬─ ─┬─
//! │        │        │   └── Extension
//! │        │        └── Direction (up or down)
//! │        └── Label (anything non-empty, dots allowed)
//! └── Index (positive integer)
//! ```

use std::path::Path;

use nom::{
    branch::alt,
    bytes::complete::tag,
    character::complete::{anychar, char, digit1},
    combinator::{eof, peek, recognize, value},
    multi::many_till,
    sequence::{preceded, terminated, tuple},
    IResult,
};

use crate::error::{MigrateError, MigrateResult};
use crate::migration::{Direction, MigrationFile};

/// Parse a file name into a migration descriptor pointing at `path`.
///
/// # Example
///
/// ```
/// use stepmigrate::parser::parse_file_name;
/// use stepmigrate::migration::Direction;
///
/// let file = parse_file_name("2_add_col.down.sql", "migrations/2_add_col.down.sql").unwrap();
/// assert_eq!(file.index, 2);
/// assert_eq!(file.label, "add_col");
/// assert_eq!(file.direction, Direction::Reverse);
/// ```
pub fn parse_file_name(name: &str, path: impl AsRef<Path>) -> MigrateResult<MigrationFile> {
    let (input, digits) = parse_index(name)
        .map_err(|_| MigrateError::malformed(name, "file name must start with a numeric index"))?;

    let (input, _) = char::<_, nom::error::Error<&str>>('_')(input)
        .map_err(|_| MigrateError::malformed(name, "index must be followed by '_'"))?;

    let (_, (label, direction)) = parse_label_and_direction(input).map_err(|_| {
        MigrateError::malformed(name, "file name must end in '.up.sql' or '.down.sql'")
    })?;

    if label.is_empty() {
        return Err(MigrateError::malformed(name, "migration must contain a label"));
    }

    let index: usize = digits
        .parse()
        .map_err(|_| MigrateError::malformed(name, format!("index '{}' is out of range", digits)))?;
    if index == 0 {
        return Err(MigrateError::malformed(name, "index must start at 1"));
    }

    Ok(MigrationFile {
        path: path.as_ref().to_path_buf(),
        index,
        direction,
        label: label.to_string(),
    })
}

/// Parse the leading index digits.
fn parse_index(input: &str) -> IResult<&str, &str> {
    digit1(input)
}

/// Parse `up` or `down`.
fn parse_direction(input: &str) -> IResult<&str, Direction> {
    alt((
        value(Direction::Forward, tag("up")),
        value(Direction::Reverse, tag("down")),
    ))(input)
}

/// Parse the `.<direction>.sql` suffix, which must end the input.
fn parse_suffix(input: &str) -> IResult<&str, Direction> {
    terminated(
        preceded(char('.'), parse_direction),
        tuple((tag(".sql"), eof)),
    )(input)
}

/// Parse the label (everything up to the suffix) and the direction.
fn parse_label_and_direction(input: &str) -> IResult<&str, (&str, Direction)> {
    let (input, label) = recognize(many_till(anychar, peek(parse_suffix)))(input)?;
    let (input, direction) = parse_suffix(input)?;
    Ok((input, (label, direction)))
}
