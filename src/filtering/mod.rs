//! # Filter & Sort Compilation
//!
//! Turns client filter expressions and sort strings into parameterized SQL
//! fragments. Client input never reaches the SQL text directly: field names
//! go through a [`FieldResolver`] allow-list and every literal becomes a bound
//! parameter.
//!
//! ## Main Components
//!
//! - **[`FilterData`]**: a raw filter expression and its compiler (`build_expr`)
//! - **[`FilterCache`]**: bounded, shared cache of parsed expressions
//! - **[`FieldResolver`]** / **[`SimpleFieldResolver`]**: field name allow-lists
//! - **[`SortField`]** / **[`parse_sort`]**: ORDER BY terms
//! - **[`TokenFunctions`]**: `geoDistance(...)`, `strftime(...)` and custom functions
//! - **[`MultiMatchSubquery`]**: comparisons against multi-valued fields
//!
//! ## Operator Semantics
//!
//! | filter | SQL |
//! |---|---|
//! | `a = b` | `COALESCE(a, '') = COALESCE(b, '')` (NULL equals `''`) |
//! | `a != b` | `COALESCE(a, '') != COALESCE(b, '')` |
//! | `a ~ 'txt'` | `a LIKE {:p} ESCAPE '\'` with `%`, `_` and `\` escaped in `txt` |
//! | `a ~ b` | `a LIKE ('%' \|\| b \|\| '%') ESCAPE '\'` |
//! | `a !~ ...` | as `~` with `NOT LIKE` |
//! | `a < b` etc. | direct comparison |
//!
//! Operands resolved with [`NullFallback::Disabled`] (JSON paths, geo
//! distances) compare with `IS` / `IS NOT` instead of coalescing.
//!
//! ## Example
//!
//! ```rust
//! use searchcrate::filtering::{FilterData, SimpleFieldResolver, SortField, SortDirection};
//! use searchcrate::SearchContext;
//! use searchcrate::sql::Params;
//!
//! let context = SearchContext::default();
//! let mut resolver = SimpleFieldResolver::new(["status", "created"]).unwrap();
//!
//! let expr = FilterData::from("status = 'active' || status = null")
//!     .build_expr(&context, &mut resolver)
//!     .unwrap();
//! let mut params = Params::new();
//! let sql = expr.build(&mut params);
//! assert!(sql.contains("COALESCE(NULL, '')"));
//!
//! let order = SortField::new("created", SortDirection::Desc).build_expr(&mut resolver).unwrap();
//! assert_eq!(order, "[[created]] DESC");
//! ```

pub mod filter;
pub mod functions;
pub mod macros;
pub mod multi_match;
pub mod resolver;
pub mod sort;

pub use filter::{FilterCache, FilterData, escape_like};
pub use functions::{ArgResolver, TokenFunction, TokenFunctions};
pub use multi_match::{Join, MultiMatchExpr, MultiMatchSubquery};
pub use resolver::{AfterBuild, FieldResolver, NullFallback, ResolverResult, SimpleFieldResolver, columnify};
pub use sort::{SortDirection, SortField, parse_sort};
