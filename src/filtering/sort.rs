use std::fmt;

use super::resolver::FieldResolver;
use crate::errors::SearchError;

/// Sorts rows in random order; the direction is ignored.
pub const RANDOM_SORT_KEY: &str = "@random";
/// Sorts by the implicit SQLite row id.
pub const ROWID_SORT_KEY: &str = "@rowid";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl fmt::Display for SortDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Asc => f.write_str("ASC"),
            Self::Desc => f.write_str("DESC"),
        }
    }
}

/// A single ORDER BY term as requested by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortField {
    pub name: String,
    pub direction: SortDirection,
}

impl SortField {
    pub fn new(name: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }

    /// Compile into an ORDER BY term.
    ///
    /// Only plain column expressions are accepted: the resolved identifier
    /// must be non-empty, not `NULL` and carry no bound params.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidSortField`] for anything else, including
    /// resolver failures.
    pub fn build_expr<R>(&self, resolver: &mut R) -> Result<String, SearchError>
    where
        R: FieldResolver + ?Sized,
    {
        match self.name.as_str() {
            RANDOM_SORT_KEY => return Ok("RANDOM()".to_string()),
            ROWID_SORT_KEY => return Ok(format!("[[_rowid_]] {}", self.direction)),
            _ => {}
        }

        let invalid = || SearchError::InvalidSortField(self.name.clone());
        let result = resolver.resolve(&self.name).map_err(|_| invalid())?;

        if !result.params.is_empty() || result.identifier.is_empty() || result.identifier.eq_ignore_ascii_case("null") {
            return Err(invalid());
        }

        Ok(format!("{} {}", result.identifier, self.direction))
    }
}

/// Parse `-a,+b, c` into `[a DESC, b ASC, c ASC]`.
///
/// Segments are trimmed; empty segments are kept as empty names so they fail
/// later in [`SortField::build_expr`].
#[must_use]
pub fn parse_sort(raw: &str) -> Vec<SortField> {
    raw.split(',')
        .map(|segment| {
            let segment = segment.trim();
            match segment.strip_prefix('-') {
                Some(name) => SortField::new(name, SortDirection::Desc),
                None => SortField::new(segment.strip_prefix('+').unwrap_or(segment), SortDirection::Asc),
            }
        })
        .collect()
}
