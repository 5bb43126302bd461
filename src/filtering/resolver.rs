use std::fmt;
use std::sync::Arc;

use regex::Regex;

use crate::errors::SearchError;
use crate::sql::{Params, SelectQuery, SqlExpr};

/// How `=` / `!=` treat NULL for a resolved operand.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NullFallback {
    /// Coalesce NULL to `''` so NULL and empty text compare equal.
    #[default]
    Auto,
    /// Always coalesce, even when the other side is `Disabled`.
    Enforced,
    /// Compare raw with `IS` / `IS NOT`.
    Disabled,
}

/// Wraps the final comparison an operand took part in.
pub type AfterBuild = Arc<dyn Fn(Arc<dyn SqlExpr>) -> Arc<dyn SqlExpr> + Send + Sync>;

/// A resolved operand: a SQL identifier/expression plus its bound values.
#[derive(Clone, Default)]
pub struct ResolverResult {
    pub identifier: String,
    pub params: Params,
    /// Set for fields that can match several related rows.
    pub multi_match_subquery: Option<Arc<dyn SqlExpr>>,
    pub after_build: Option<AfterBuild>,
    pub null_fallback: NullFallback,
}

impl ResolverResult {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            ..Self::default()
        }
    }

    pub fn with_params(identifier: impl Into<String>, params: Params) -> Self {
        Self {
            identifier: identifier.into(),
            params,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn null_fallback(mut self, null_fallback: NullFallback) -> Self {
        self.null_fallback = null_fallback;
        self
    }

    #[must_use]
    pub fn multi_match(mut self, subquery: Arc<dyn SqlExpr>) -> Self {
        self.multi_match_subquery = Some(subquery);
        self
    }

    #[must_use]
    pub fn after_build<F>(mut self, wrap: F) -> Self
    where
        F: Fn(Arc<dyn SqlExpr>) -> Arc<dyn SqlExpr> + Send + Sync + 'static,
    {
        self.after_build = Some(Arc::new(wrap));
        self
    }
}

impl fmt::Debug for ResolverResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolverResult")
            .field("identifier", &self.identifier)
            .field("params", &self.params)
            .field("multi_match_subquery", &self.multi_match_subquery)
            .field("after_build", &self.after_build.as_ref().map(|_| "Fn"))
            .field("null_fallback", &self.null_fallback)
            .finish()
    }
}

/// Maps client field names to SQL.
///
/// A resolver is request-scoped: it may record joins while resolving and
/// apply them in [`FieldResolver::update_query`], which the provider calls
/// exactly once after every filter and sort term has been compiled.
pub trait FieldResolver {
    /// Resolve `field`, rejecting anything outside the resolver's allow-list.
    ///
    /// # Errors
    ///
    /// Typically [`SearchError::UnknownField`].
    fn resolve(&mut self, field: &str) -> Result<ResolverResult, SearchError>;

    /// Apply whatever the resolver accumulated to the final query.
    ///
    /// # Errors
    ///
    /// Implementation defined.
    fn update_query(&mut self, query: &mut SelectQuery) -> Result<(), SearchError>;
}

impl<R: FieldResolver + ?Sized> FieldResolver for &mut R {
    fn resolve(&mut self, field: &str) -> Result<ResolverResult, SearchError> {
        (**self).resolve(field)
    }

    fn update_query(&mut self, query: &mut SelectQuery) -> Result<(), SearchError> {
        (**self).update_query(query)
    }
}

impl<R: FieldResolver + ?Sized> FieldResolver for Box<R> {
    fn resolve(&mut self, field: &str) -> Result<ResolverResult, SearchError> {
        (**self).resolve(field)
    }

    fn update_query(&mut self, query: &mut SelectQuery) -> Result<(), SearchError> {
        (**self).update_query(query)
    }
}

#[derive(Debug, Clone)]
enum AllowedField {
    Exact(String),
    Pattern(Regex),
}

impl AllowedField {
    fn matches(&self, field: &str) -> bool {
        match self {
            Self::Exact(name) => name == field,
            Self::Pattern(re) => re.is_match(field),
        }
    }
}

/// Allow-list resolver for flat tables.
///
/// Entries are exact names, or regex patterns when wrapped in `^...$`.
/// A single name resolves to a column; a dotted path `data.a.0.b` resolves
/// to `JSON_EXTRACT([[data]], '$.a[0].b')` with [`NullFallback::Disabled`].
///
/// ```rust
/// use searchcrate::{FieldResolver, SimpleFieldResolver};
///
/// let mut resolver = SimpleFieldResolver::new(["title", r"^meta\.\w+$"]).unwrap();
/// assert_eq!(resolver.resolve("title").unwrap().identifier, "[[title]]");
/// assert_eq!(
///     resolver.resolve("meta.author").unwrap().identifier,
///     "JSON_EXTRACT([[meta]], '$.author')"
/// );
/// assert!(resolver.resolve("password").is_err());
/// ```
#[derive(Debug, Clone)]
pub struct SimpleFieldResolver {
    allowed: Vec<AllowedField>,
}

impl SimpleFieldResolver {
    /// # Errors
    ///
    /// Returns [`SearchError::InvalidPattern`] for a pattern that does not compile.
    pub fn new<I, S>(allowed: I) -> Result<Self, SearchError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let allowed = allowed
            .into_iter()
            .map(|entry| -> Result<AllowedField, SearchError> {
                let entry = entry.as_ref();
                if entry.len() > 1 && entry.starts_with('^') && entry.ends_with('$') {
                    Ok(AllowedField::Pattern(Regex::new(entry)?))
                } else {
                    Ok(AllowedField::Exact(entry.to_string()))
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { allowed })
    }

    #[must_use]
    pub fn is_allowed(&self, field: &str) -> bool {
        self.allowed.iter().any(|entry| entry.matches(field))
    }
}

impl FieldResolver for SimpleFieldResolver {
    fn resolve(&mut self, field: &str) -> Result<ResolverResult, SearchError> {
        if !self.is_allowed(field) {
            return Err(SearchError::UnknownField(field.to_string()));
        }

        let mut parts = field.split('.');
        let column = columnify(parts.next().unwrap_or_default());
        let path: Vec<&str> = parts.collect();

        if path.is_empty() {
            return Ok(ResolverResult::new(format!("[[{column}]]")));
        }

        let mut json_path = String::from("$");
        for part in path {
            let part = columnify(part);
            if !part.is_empty() && part.chars().all(|c| c.is_ascii_digit()) {
                json_path.push_str(&format!("[{part}]"));
            } else {
                json_path.push('.');
                json_path.push_str(&part);
            }
        }

        Ok(ResolverResult::new(format!("JSON_EXTRACT([[{column}]], '{json_path}')"))
            .null_fallback(NullFallback::Disabled))
    }

    fn update_query(&mut self, _query: &mut SelectQuery) -> Result<(), SearchError> {
        Ok(())
    }
}

/// Strips every character outside `[\w.*\-@#]`.
#[must_use]
pub fn columnify(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, '_' | '.' | '*' | '-' | '@' | '#'))
        .collect()
}
