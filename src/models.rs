use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::errors::SearchError;

pub const PAGE_QUERY_PARAM: &str = "page";
pub const PER_PAGE_QUERY_PARAM: &str = "perPage";
pub const SORT_QUERY_PARAM: &str = "sort";
pub const FILTER_QUERY_PARAM: &str = "filter";
pub const SKIP_TOTAL_QUERY_PARAM: &str = "skipTotal";

/// Query parameters for filtering, sorting and paginating a list.
///
/// # Filtering
/// `filter` is an expression such as
/// `title ~ 'lorem' && (views > 10 || created >= @todayStart)`.
/// Supported operators are `= != ~ !~ < <= > >=`, joined with `&&` / `||`
/// and grouped with parentheses.
///
/// # Sorting
/// `sort` is a comma separated field list; `-` prefixes a descending field,
/// `+` (or nothing) an ascending one. `@random` and `@rowid` are reserved.
///
/// # Pagination
/// `page` is 1-based; `perPage` defaults to 30 and is capped at 400.
/// `skipTotal=true` skips the count query and reports `-1` totals.
///
/// Values are kept as raw strings so that invalid numbers or booleans are
/// reported by [`crate::Provider::parse`] instead of being silently dropped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct SearchParams {
    /// Page number (1-based).
    #[param(example = "1")]
    pub page: Option<String>,
    /// Number of items per page.
    #[serde(rename = "perPage")]
    #[param(example = "30")]
    pub per_page: Option<String>,
    /// Comma separated sort fields.
    #[param(example = "-created,title")]
    pub sort: Option<String>,
    /// Filter expression.
    #[param(example = "title ~ 'lorem' && views > 10")]
    pub filter: Option<String>,
    /// Skip the total count query.
    #[serde(rename = "skipTotal")]
    #[param(example = "true")]
    pub skip_total: Option<String>,
}

impl SearchParams {
    /// Read the recognized parameters from an URL-encoded query string.
    ///
    /// A leading `?` is ignored, unknown keys are skipped and only the first
    /// occurrence of a key counts.
    #[must_use]
    pub fn from_query(query: &str) -> Self {
        let query = query.strip_prefix('?').unwrap_or(query);
        let mut params = Self::default();

        for (key, value) in url::form_urlencoded::parse(query.as_bytes()) {
            let slot = match key.as_ref() {
                PAGE_QUERY_PARAM => &mut params.page,
                PER_PAGE_QUERY_PARAM => &mut params.per_page,
                SORT_QUERY_PARAM => &mut params.sort,
                FILTER_QUERY_PARAM => &mut params.filter,
                SKIP_TOTAL_QUERY_PARAM => &mut params.skip_total,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }

        params
    }
}

/// One page of search results.
///
/// `total_items` and `total_pages` are `-1` when the count was skipped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult<T> {
    pub page: u64,
    pub per_page: u64,
    pub total_items: i64,
    pub total_pages: i64,
    pub items: Vec<T>,
}

/// Accepts `1 t T TRUE true True` and `0 f F FALSE false False`.
pub(crate) fn parse_bool(name: &'static str, raw: &str) -> Result<bool, SearchError> {
    match raw {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Ok(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Ok(false),
        _ => Err(SearchError::InvalidQueryParam {
            name,
            value: raw.to_string(),
        }),
    }
}

pub(crate) fn parse_int(name: &'static str, raw: &str) -> Result<i64, SearchError> {
    raw.trim().parse::<i64>().map_err(|_| SearchError::InvalidQueryParam {
        name,
        value: raw.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_query_reads_known_keys() {
        let params = SearchParams::from_query(
            "?page=2&perPage=15&sort=-created,title&filter=title%20~%20%27a%26b%27&skipTotal=1&other=x",
        );
        assert_eq!(params.page.as_deref(), Some("2"));
        assert_eq!(params.per_page.as_deref(), Some("15"));
        assert_eq!(params.sort.as_deref(), Some("-created,title"));
        assert_eq!(params.filter.as_deref(), Some("title ~ 'a&b'"));
        assert_eq!(params.skip_total.as_deref(), Some("1"));
    }

    #[test]
    fn test_from_query_first_occurrence_wins() {
        let params = SearchParams::from_query("page=1&page=9");
        assert_eq!(params.page.as_deref(), Some("1"));
        assert_eq!(SearchParams::from_query(""), SearchParams::default());
    }

    #[test]
    fn test_parse_bool_accepted_values() {
        for raw in ["1", "t", "T", "TRUE", "true", "True"] {
            assert!(parse_bool("skipTotal", raw).unwrap());
        }
        for raw in ["0", "f", "F", "FALSE", "false", "False"] {
            assert!(!parse_bool("skipTotal", raw).unwrap());
        }
        for raw in ["yes", "tRuE", "", "2"] {
            assert!(matches!(
                parse_bool("skipTotal", raw),
                Err(SearchError::InvalidQueryParam { name: "skipTotal", .. })
            ));
        }
    }

    #[test]
    fn test_parse_int() {
        assert_eq!(parse_int("page", "-3").unwrap(), -3);
        assert!(parse_int("page", "abc").is_err());
    }

    #[test]
    fn test_search_result_serializes_camel_case() {
        let result = SearchResult {
            page: 1,
            per_page: 30,
            total_items: -1,
            total_pages: -1,
            items: vec![1, 2],
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"page": 1, "perPage": 30, "totalItems": -1, "totalPages": -1, "items": [1, 2]})
        );
    }
}
