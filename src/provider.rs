//! # Search Provider
//!
//! Request-scoped orchestration of one paginated search:
//!
//! 1. configure a [`Provider`] from code and/or the request query string,
//! 2. [`Provider::exec`] compiles every filter and sort term against the
//!    resolver, counts the matching rows (unless `skipTotal`), normalizes the
//!    page numbers and fetches one page of rows.
//!
//! Process-wide state (the parse cache, the function registry and the limits)
//! lives in a [`SearchContext`] that is built once and cloned into every
//! provider.
//!
//! ```rust,ignore
//! let context = SearchContext::new(SearchConfig::default());
//!
//! async fn list(db: &DatabaseConnection, context: &SearchContext, raw_query: &str)
//!     -> Result<SearchResult<Post>, SearchError>
//! {
//!     let resolver = SimpleFieldResolver::new(["title", "views", "created"])?;
//!     let mut provider = Provider::new(context.clone(), resolver);
//!     provider.query(SelectQuery::new("posts")).parse(raw_query)?;
//!     provider.exec::<Post, _>(db).await
//! }
//! ```

use std::sync::Arc;

use sea_orm::{ConnectionTrait, DbBackend, FromQueryResult};

use crate::config::SearchConfig;
use crate::errors::SearchError;
use crate::filtering::{FieldResolver, FilterCache, FilterData, SortField, TokenFunctions, parse_sort};
use crate::models::{
    PAGE_QUERY_PARAM, PER_PAGE_QUERY_PARAM, SKIP_TOTAL_QUERY_PARAM, SearchParams, SearchResult, parse_bool, parse_int,
};
use crate::sql::SelectQuery;

/// Largest OFFSET the database drivers bind as a signed 64-bit integer.
const MAX_OFFSET: u64 = i64::MAX.unsigned_abs();

/// Shared, process-wide search state.
#[derive(Debug, Clone)]
pub struct SearchContext {
    cache: Arc<FilterCache>,
    functions: Arc<TokenFunctions>,
    config: SearchConfig,
}

impl Default for SearchContext {
    fn default() -> Self {
        Self::new(SearchConfig::default())
    }
}

impl SearchContext {
    /// Context with the built-in functions and a cache sized from `config`.
    #[must_use]
    pub fn new(config: SearchConfig) -> Self {
        Self {
            cache: Arc::new(FilterCache::new(config.cache_capacity)),
            functions: Arc::new(TokenFunctions::default()),
            config,
        }
    }

    /// Replace the function registry.
    #[must_use]
    pub fn with_functions(mut self, functions: TokenFunctions) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    /// Share an existing cache, e.g. between contexts with different limits.
    #[must_use]
    pub fn with_cache(mut self, cache: Arc<FilterCache>) -> Self {
        self.cache = cache;
        self
    }

    #[must_use]
    pub fn cache(&self) -> &FilterCache {
        &self.cache
    }

    #[must_use]
    pub fn functions(&self) -> &TokenFunctions {
        &self.functions
    }

    #[must_use]
    pub fn config(&self) -> &SearchConfig {
        &self.config
    }
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total: i64,
}

/// Builds and runs one paginated search.
pub struct Provider<R: FieldResolver> {
    context: SearchContext,
    resolver: R,
    query: Option<SelectQuery>,
    page: i64,
    per_page: i64,
    sort: Vec<SortField>,
    filter: Vec<FilterData>,
    count_column: Option<String>,
    skip_total: bool,
}

impl<R: FieldResolver> Provider<R> {
    pub fn new(context: SearchContext, resolver: R) -> Self {
        Self {
            context,
            resolver,
            query: None,
            page: 1,
            per_page: 0,
            sort: Vec::new(),
            filter: Vec::new(),
            count_column: None,
            skip_total: false,
        }
    }

    /// Set the base query; `exec` works on a clone of it.
    pub fn query(&mut self, query: SelectQuery) -> &mut Self {
        self.query = Some(query);
        self
    }

    pub fn page(&mut self, page: i64) -> &mut Self {
        self.page = page;
        self
    }

    /// Non-positive values fall back to the configured default.
    pub fn per_page(&mut self, per_page: i64) -> &mut Self {
        self.per_page = per_page;
        self
    }

    /// Replace all sort terms.
    pub fn sort(&mut self, sort: Vec<SortField>) -> &mut Self {
        self.sort = sort;
        self
    }

    pub fn add_sort(&mut self, field: SortField) -> &mut Self {
        self.sort.push(field);
        self
    }

    /// Replace all filters.
    pub fn filter(&mut self, filter: Vec<FilterData>) -> &mut Self {
        self.filter = filter;
        self
    }

    /// Add a filter, AND-ed with the others.
    pub fn add_filter(&mut self, filter: impl Into<FilterData>) -> &mut Self {
        self.filter.push(filter.into());
        self
    }

    pub fn skip_total(&mut self, skip_total: bool) -> &mut Self {
        self.skip_total = skip_total;
        self
    }

    /// Count `DISTINCT` values of this column instead of `COUNT(*)`.
    pub fn count_column(&mut self, column: impl Into<String>) -> &mut Self {
        self.count_column = Some(column.into());
        self
    }

    /// Read `page`, `perPage`, `sort`, `filter` and `skipTotal` from an
    /// URL-encoded query string. Sort and filter entries are appended.
    ///
    /// # Errors
    ///
    /// [`SearchError::InvalidQueryParam`] for a non-integer page/perPage or a
    /// non-boolean skipTotal.
    pub fn parse(&mut self, url_query: &str) -> Result<&mut Self, SearchError> {
        self.parse_params(&SearchParams::from_query(url_query))
    }

    /// Same as [`Self::parse`] for already deserialized parameters.
    ///
    /// # Errors
    ///
    /// See [`Self::parse`].
    pub fn parse_params(&mut self, params: &SearchParams) -> Result<&mut Self, SearchError> {
        let present = |value: &Option<String>| value.clone().filter(|v| !v.is_empty());

        if let Some(raw) = present(&params.page) {
            self.page(parse_int(PAGE_QUERY_PARAM, &raw)?);
        }
        if let Some(raw) = present(&params.per_page) {
            self.per_page(parse_int(PER_PAGE_QUERY_PARAM, &raw)?);
        }
        if let Some(raw) = present(&params.sort) {
            self.sort.extend(parse_sort(&raw));
        }
        if let Some(raw) = present(&params.filter) {
            self.add_filter(raw);
        }
        if let Some(raw) = present(&params.skip_total) {
            self.skip_total(parse_bool(SKIP_TOTAL_QUERY_PARAM, &raw)?);
        }

        Ok(self)
    }

    fn check_limits(&self) -> Result<(), SearchError> {
        let config = self.context.config();

        if self.filter.iter().any(|f| f.as_str().len() > config.max_filter_length) {
            return Err(SearchError::LimitExceeded {
                what: "filter expression length",
                limit: config.max_filter_length,
            });
        }
        if self.sort.len() > config.max_sort_fields {
            return Err(SearchError::LimitExceeded {
                what: "number of sort fields",
                limit: config.max_sort_fields,
            });
        }
        if self.sort.iter().any(|s| s.name.len() > config.max_sort_field_length) {
            return Err(SearchError::LimitExceeded {
                what: "sort field length",
                limit: config.max_sort_field_length,
            });
        }

        Ok(())
    }

    /// Compile, count and fetch one page, decoding rows as `M`.
    ///
    /// # Errors
    ///
    /// [`SearchError::MissingQuery`] without a base query,
    /// [`SearchError::UnsupportedBackend`] for a non-SQLite connection, any
    /// limit, compile or resolver error, and database errors unchanged.
    pub async fn exec<M, C>(mut self, db: &C) -> Result<SearchResult<M>, SearchError>
    where
        M: FromQueryResult,
        C: ConnectionTrait,
    {
        let Some(base) = self.query.as_ref() else {
            return Err(SearchError::MissingQuery);
        };
        let backend = db.get_database_backend();
        if backend != DbBackend::Sqlite {
            return Err(SearchError::UnsupportedBackend(backend));
        }
        self.check_limits()?;

        let mut query = base.clone();

        for filter in &self.filter {
            let expr = filter.build_expr(&self.context, &mut self.resolver)?;
            query.and_where(expr);
        }
        for field in &self.sort {
            let term = field.build_expr(&mut self.resolver)?;
            query.order_by(term);
        }
        self.resolver.update_query(&mut query)?;

        let config = self.context.config();

        let per_page = match u64::try_from(self.per_page) {
            Ok(0) | Err(_) => config.default_per_page,
            Ok(n) => n.min(config.max_per_page),
        }
        .max(1);

        let mut total_items: i64 = -1;
        let mut total_pages: i64 = -1;
        if !self.skip_total {
            let stmt = query.build_count(self.count_column.as_deref(), backend)?;
            tracing::trace!(sql = %stmt.sql, "search count statement");

            let total = CountRow::find_by_statement(stmt).one(db).await?.map_or(0, |row| row.total);
            let pages = u64::try_from(total).unwrap_or(0).div_ceil(per_page);
            total_items = total;
            total_pages = i64::try_from(pages).unwrap_or(i64::MAX);
        }

        let mut page = self.page;
        if page <= 0 || total_items == 0 {
            page = 1;
        } else if !self.skip_total && page > total_pages {
            page = total_pages;
        }
        let page = u64::try_from(page).unwrap_or(1);

        query
            .limit(per_page)
            .offset(per_page.saturating_mul(page - 1).min(MAX_OFFSET));
        let stmt = query.build(backend)?;
        tracing::trace!(sql = %stmt.sql, "search data statement");

        let items = M::find_by_statement(stmt).all(db).await?;

        tracing::debug!(
            page,
            per_page,
            total_items,
            total_pages,
            skip_total = self.skip_total,
            items = items.len(),
            "search executed"
        );

        Ok(SearchResult {
            page,
            per_page,
            total_items,
            total_pages,
            items,
        })
    }
}
