//! Warehouse row model.

use thiserror::Error;

pub const ID_COLUMN: &str = "ID";
pub const PROMPT_COLUMN: &str = "PROMPT";
pub const RESPONSE_COLUMN: &str = "RESPONSE";

/// Errors mapping a warehouse record onto a [`Row`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowError {
    #[error("Result set has no {0} column")]
    MissingColumn(&'static str),
    #[error("Row has a NULL {0}")]
    NullId(&'static str),
    #[error("Row ID is not an integer: {0:?}")]
    InvalidId(String),
}

/// A record of the synchronized table.
///
/// Only the columns the connector understands are kept. `PROMPT` and
/// `RESPONSE` are optional because the table may hold NULLs (or omit the
/// column entirely for `RESPONSE` on a fresh table).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Row {
    pub id: i64,
    pub prompt: Option<String>,
    pub response: Option<String>,
}

impl Row {
    pub fn new(id: i64, prompt: impl Into<String>) -> Self {
        Self {
            id,
            prompt: Some(prompt.into()),
            response: None,
        }
    }

    /// Build a row from a raw record. Column names match case-insensitively.
    pub fn from_record(columns: &[String], values: &[Option<String>]) -> Result<Self, RowError> {
        let cell = |name: &str| -> Option<Option<&String>> {
            columns
                .iter()
                .position(|c| c.eq_ignore_ascii_case(name))
                .map(|idx| values.get(idx).and_then(|v| v.as_ref()))
        };

        let raw_id = cell(ID_COLUMN)
            .ok_or(RowError::MissingColumn(ID_COLUMN))?
            .ok_or(RowError::NullId(ID_COLUMN))?;
        let id = parse_integer(raw_id).ok_or_else(|| RowError::InvalidId(raw_id.clone()))?;

        Ok(Self {
            id,
            prompt: cell(PROMPT_COLUMN).flatten().cloned(),
            response: cell(RESPONSE_COLUMN).flatten().cloned(),
        })
    }
}

/// Warehouses hand NUMBER columns back as text, sometimes with a zero scale
/// suffix (`"42.0"`).
fn parse_integer(raw: &str) -> Option<i64> {
    let trimmed = raw.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Some(n);
    }
    let (whole, frac) = trimmed.split_once('.')?;
    if !frac.is_empty() && frac.chars().all(|c| c == '0') {
        whole.parse::<i64>().ok()
    } else {
        None
    }
}
