use serde::{Deserialize, Serialize};

pub const DEFAULT_PER_PAGE: u64 = 30;
pub const MAX_PER_PAGE: u64 = 400;
pub const MAX_FILTER_LENGTH: usize = 3500;
pub const MAX_SORT_FIELDS: usize = 8;
pub const MAX_SORT_FIELD_LENGTH: usize = 255;
pub const DEFAULT_CACHE_CAPACITY: usize = 500;

/// Limits and defaults applied by [`crate::Provider::exec`].
///
/// Every field has a default, so any subset can be loaded from the
/// application's own configuration:
///
/// ```rust
/// use searchcrate::SearchConfig;
///
/// let config: SearchConfig = serde_json::from_str(r#"{"maxPerPage": 100}"#).unwrap();
/// assert_eq!(config.max_per_page, 100);
/// assert_eq!(config.default_per_page, 30);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SearchConfig {
    /// Page size used when the request gives none (or a non-positive one).
    pub default_per_page: u64,
    /// Larger page sizes are clamped to this value.
    pub max_per_page: u64,
    /// Maximum length in bytes of a single filter expression.
    pub max_filter_length: usize,
    /// Maximum number of sort terms per request.
    pub max_sort_fields: usize,
    /// Maximum length in bytes of a single sort field name.
    pub max_sort_field_length: usize,
    /// Number of distinct filter strings kept in the parse cache.
    pub cache_capacity: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_per_page: DEFAULT_PER_PAGE,
            max_per_page: MAX_PER_PAGE,
            max_filter_length: MAX_FILTER_LENGTH,
            max_sort_fields: MAX_SORT_FIELDS,
            max_sort_field_length: MAX_SORT_FIELD_LENGTH,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let config = SearchConfig::default();
        assert_eq!(config.default_per_page, 30);
        assert_eq!(config.max_per_page, 400);
        assert_eq!(config.max_filter_length, 3500);
        assert_eq!(config.max_sort_fields, 8);
        assert_eq!(config.max_sort_field_length, 255);
        assert_eq!(config.cache_capacity, 500);
    }

    #[test]
    fn test_partial_deserialize_keeps_defaults() {
        let config: SearchConfig = serde_json::from_str(r#"{"cacheCapacity": 10, "defaultPerPage": 5}"#).unwrap();
        assert_eq!(config.cache_capacity, 10);
        assert_eq!(config.default_per_page, 5);
        assert_eq!(config.max_per_page, 400);
    }
}
