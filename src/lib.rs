//! # searchcrate
//!
//! Filter/sort query compiler and paginated search executor for sea-orm.
//!
//! Clients send a filter expression, a sort list and page numbers:
//!
//! ```text
//! GET /posts?filter=(title ~ 'rust' || views > 100) && created >= @monthStart&sort=-created,title&page=2&perPage=20
//! ```
//!
//! The crate parses the expression, resolves every field name through an
//! allow-list ([`FieldResolver`]), binds every literal as a parameter and runs
//! one `SELECT` plus one optional `COUNT` through a sea-orm SQLite connection:
//!
//! ```rust,ignore
//! use searchcrate::{Provider, SearchContext, SimpleFieldResolver};
//! use searchcrate::sql::SelectQuery;
//!
//! let context = SearchContext::default(); // build once, clone per request
//!
//! let mut provider = Provider::new(context.clone(), SimpleFieldResolver::new(["title", "views", "created"])?);
//! provider.query(SelectQuery::new("posts")).parse(raw_query_string)?;
//! let page: SearchResult<post::Model> = provider.exec(&db).await?;
//! ```
//!
//! ## Database support
//!
//! Compiled filters are SQLite SQL (`JSON_EXTRACT`, `||` concatenation,
//! `RANDOM()`, `_rowid_`), so [`Provider::exec`] rejects other backends with
//! [`SearchError::UnsupportedBackend`].
//!
//! `geoDistance` needs SQLite's math functions. The bundled library includes
//! them only when built with the flag this repository sets in
//! `.cargo/config.toml`; downstream crates need the same entry:
//!
//! ```toml
//! [env]
//! LIBSQLITE3_FLAGS = "-DSQLITE_ENABLE_MATH_FUNCTIONS"
//! ```
//!
//! ## Modules
//!
//! - [`fexpr`]: filter grammar scanner and parser
//! - [`filtering`]: expression and sort compilation, resolvers, functions
//! - [`sql`]: SQL fragments and the `SELECT` builder
//! - [`provider`]: request orchestration and pagination
//! - [`models`]: query-string parameters and the result envelope
//! - [`config`]: limits and defaults

pub mod config;
pub mod errors;
pub mod fexpr;
pub mod filtering;
pub mod models;
pub mod provider;
pub mod sql;

pub use config::SearchConfig;
pub use errors::{OperandSide, ParseError, SearchError};
pub use filtering::{
    FieldResolver, FilterCache, FilterData, NullFallback, ResolverResult, SimpleFieldResolver, SortDirection,
    SortField, TokenFunctions, parse_sort,
};
pub use models::{SearchParams, SearchResult};
pub use provider::{Provider, SearchContext};
