use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use sea_orm::Value;
use tracing::trace;

use super::functions::TokenFunctions;
use super::macros::resolve_macro;
use super::multi_match::MultiMatchExpr;
use super::resolver::{FieldResolver, NullFallback, ResolverResult};
use crate::config::DEFAULT_CACHE_CAPACITY;
use crate::errors::{OperandSide, ParseError, SearchError};
use crate::fexpr::{self, Expr, ExprGroup, ExprItem, JoinOp, SignOp, Token};
use crate::provider::SearchContext;
use crate::sql::{AndExpr, EncloseExpr, OrExpr, Params, RawExpr, SqlExpr, param_name, random_name};

/// Bounded cache of parsed filter strings, shared across requests.
///
/// Once full, new entries are skipped; existing entries are never evicted.
#[derive(Debug)]
pub struct FilterCache {
    capacity: usize,
    entries: RwLock<HashMap<String, Arc<Vec<ExprGroup>>>>,
}

impl Default for FilterCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_CAPACITY)
    }
}

impl FilterCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            entries: RwLock::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    #[must_use]
    pub fn get(&self, raw: &str) -> Option<Arc<Vec<ExprGroup>>> {
        self.entries.read().get(raw).cloned()
    }

    /// Return the cached tree for `raw`, running `parse` on a miss.
    ///
    /// # Errors
    ///
    /// Whatever `parse` returns; failures are not cached.
    pub fn get_or_parse<F>(&self, raw: &str, parse: F) -> Result<Arc<Vec<ExprGroup>>, ParseError>
    where
        F: FnOnce(&str) -> Result<Vec<ExprGroup>, ParseError>,
    {
        if let Some(groups) = self.get(raw) {
            trace!(filter = raw, "filter cache hit");
            return Ok(groups);
        }

        trace!(filter = raw, "filter cache miss");
        let groups = Arc::new(parse(raw)?);

        let mut entries = self.entries.write();
        if entries.len() < self.capacity {
            entries.insert(raw.to_string(), Arc::clone(&groups));
        } else {
            trace!(capacity = self.capacity, "filter cache full, skipping insert");
        }

        Ok(groups)
    }
}

/// A raw client filter expression.
///
/// ```rust
/// use searchcrate::{FilterData, SearchContext, SimpleFieldResolver};
/// use searchcrate::sql::Params;
///
/// let context = SearchContext::default();
/// let mut resolver = SimpleFieldResolver::new(["title", "views"]).unwrap();
///
/// let expr = FilterData::from("title ~ 'abc' && views > 10")
///     .build_expr(&context, &mut resolver)
///     .unwrap();
///
/// let mut params = Params::new();
/// let sql = expr.build(&mut params);
/// assert!(sql.starts_with("([[title]] LIKE {:"));
/// assert_eq!(params.len(), 2);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FilterData(String);

impl From<&str> for FilterData {
    fn from(raw: &str) -> Self {
        Self(raw.to_string())
    }
}

impl From<String> for FilterData {
    fn from(raw: String) -> Self {
        Self(raw)
    }
}

impl FilterData {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Substitute `{:name}` placeholders of a trusted template with quoted
    /// literals. Unknown placeholders are left in place.
    ///
    /// ```rust
    /// use searchcrate::FilterData;
    /// use serde_json::json;
    ///
    /// let filter = FilterData::bind(
    ///     "title = {:title} && views > {:min} && draft = {:draft}",
    ///     [("title", json!("it's")), ("min", json!(10)), ("draft", json!(false))],
    /// );
    /// assert_eq!(filter.as_str(), r"title = 'it\'s' && views > 10 && draft = false");
    /// ```
    pub fn bind<I, K>(template: &str, params: I) -> Self
    where
        I: IntoIterator<Item = (K, serde_json::Value)>,
        K: Into<String>,
    {
        let params: HashMap<String, serde_json::Value> = params.into_iter().map(|(k, v)| (k.into(), v)).collect();

        let mut out = String::with_capacity(template.len());
        let mut rest = template;
        while let Some(start) = rest.find("{:") {
            out.push_str(&rest[..start]);
            let after = &rest[start + 2..];

            let name_len = after
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                .unwrap_or(after.len());
            let name = &after[..name_len];

            match params.get(name) {
                Some(value) if !name.is_empty() && after[name_len..].starts_with('}') => {
                    out.push_str(&filter_literal(value));
                    rest = &after[name_len + 1..];
                }
                _ => {
                    out.push_str("{:");
                    rest = after;
                }
            }
        }
        out.push_str(rest);

        Self(out)
    }

    /// Compile into a SQL expression.
    ///
    /// # Errors
    ///
    /// Parse, operand, operator and function errors; see [`SearchError`].
    pub fn build_expr<R>(&self, context: &SearchContext, resolver: &mut R) -> Result<Arc<dyn SqlExpr>, SearchError>
    where
        R: FieldResolver + ?Sized,
    {
        let groups = context.cache().get_or_parse(self.as_str(), fexpr::parse)?;

        let mut compiler = Compiler {
            functions: context.functions(),
            resolver,
        };
        compiler.build_groups(&groups)
    }
}

fn quote_text(text: &str) -> String {
    format!("'{}'", text.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn filter_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "null".to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_text(s),
        other => quote_text(&other.to_string()),
    }
}

/// Escape `\`, `%` and `_` so the text matches literally in `LIKE ... ESCAPE '\'`.
#[must_use]
pub fn escape_like(text: &str) -> String {
    text.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn escape_like_params(params: &Params) -> Params {
    params
        .iter()
        .map(|(name, value)| {
            let value = match value {
                Value::String(Some(text)) => Value::from(escape_like(text.as_str())),
                other => other.clone(),
            };
            (name.clone(), value)
        })
        .collect()
}

fn merge_params(left: &Params, right: &Params) -> Params {
    let mut merged = left.clone();
    merged.extend(right.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

fn bound_param(value: Value) -> ResolverResult {
    let name = param_name();
    let identifier = format!("{{:{name}}}");
    let mut params = Params::new();
    params.insert(name, value);
    ResolverResult::with_params(identifier, params)
}

/// Build `left <op> right` without multi-match or wrappers.
fn build_operator_expr(left: &ResolverResult, op: SignOp, right: &ResolverResult) -> Arc<dyn SqlExpr> {
    let (l, r) = (&left.identifier, &right.identifier);

    let expr = match op {
        SignOp::Eq | SignOp::Neq => {
            let enforced = left.null_fallback == NullFallback::Enforced || right.null_fallback == NullFallback::Enforced;
            let disabled = left.null_fallback == NullFallback::Disabled || right.null_fallback == NullFallback::Disabled;

            let sql = match (op, disabled && !enforced) {
                (SignOp::Eq, true) => format!("{l} IS {r}"),
                (_, true) => format!("{l} IS NOT {r}"),
                (SignOp::Eq, false) => format!("COALESCE({l}, '') = COALESCE({r}, '')"),
                (_, false) => format!("COALESCE({l}, '') != COALESCE({r}, '')"),
            };
            RawExpr::with_params(sql, merge_params(&left.params, &right.params))
        }
        SignOp::Like | SignOp::NotLike => {
            let (left, right) = if op == SignOp::NotLike && !left.params.is_empty() && right.params.is_empty() {
                (right, left)
            } else {
                (left, right)
            };
            let keyword = if op == SignOp::Like { "LIKE" } else { "NOT LIKE" };

            if right.params.is_empty() {
                RawExpr::with_params(
                    format!("{} {keyword} ('%' || {} || '%') ESCAPE '\\'", left.identifier, right.identifier),
                    left.params.clone(),
                )
            } else {
                RawExpr::with_params(
                    format!("{} {keyword} {} ESCAPE '\\'", left.identifier, right.identifier),
                    merge_params(&left.params, &escape_like_params(&right.params)),
                )
            }
        }
        SignOp::Lt | SignOp::Lte | SignOp::Gt | SignOp::Gte => RawExpr::with_params(
            format!("{l} {op} {r}"),
            merge_params(&left.params, &right.params),
        ),
    };

    Arc::new(expr)
}

/// Full comparison: operator, then multi-match, then `after_build` wrappers.
fn build_resolvers_expr(left: &ResolverResult, op: SignOp, right: &ResolverResult) -> Arc<dyn SqlExpr> {
    let mut expr = build_operator_expr(left, op, right);

    if left.multi_match_subquery.is_some() || right.multi_match_subquery.is_some() {
        let mut sources = Vec::new();
        let mut value_side = |side: &ResolverResult, prefix: &str| match &side.multi_match_subquery {
            Some(subquery) => {
                let alias = random_name(prefix, 5);
                let value = ResolverResult::new(format!("[[{alias}.multiMatchValue]]")).null_fallback(side.null_fallback);
                sources.push((Arc::clone(subquery), alias));
                value
            }
            None => ResolverResult {
                multi_match_subquery: None,
                after_build: None,
                ..side.clone()
            },
        };
        let left_value = value_side(left, "__ml");
        let right_value = value_side(right, "__mr");

        let condition = build_operator_expr(&left_value, op, &right_value);
        expr = Arc::new(EncloseExpr(Arc::new(AndExpr(vec![
            expr,
            Arc::new(MultiMatchExpr { sources, condition }),
        ]))));
    }

    for side in [left, right] {
        if let Some(wrap) = &side.after_build {
            expr = wrap(expr);
        }
    }

    expr
}

struct Compiler<'a, R: ?Sized> {
    functions: &'a TokenFunctions,
    resolver: &'a mut R,
}

impl<R: FieldResolver + ?Sized> Compiler<'_, R> {
    fn build_groups(&mut self, groups: &[ExprGroup]) -> Result<Arc<dyn SqlExpr>, SearchError> {
        let mut result: Option<Arc<dyn SqlExpr>> = None;

        for group in groups {
            let expr = match &group.item {
                ExprItem::Expr(expr) => self.build_comparison(expr)?,
                ExprItem::Group(inner) => Arc::new(EncloseExpr(self.build_groups(inner)?)),
            };

            result = Some(match result {
                None => expr,
                Some(prev) => match group.join {
                    JoinOp::And => Arc::new(AndExpr(vec![prev, expr])),
                    JoinOp::Or => Arc::new(OrExpr(vec![prev, expr])),
                },
            });
        }

        result.ok_or(SearchError::EmptyExpression)
    }

    fn build_comparison(&mut self, expr: &Expr) -> Result<Arc<dyn SqlExpr>, SearchError> {
        let left = self.resolve_operand(&expr.left, OperandSide::Left)?;
        let right = self.resolve_operand(&expr.right, OperandSide::Right)?;
        Ok(build_resolvers_expr(&left, expr.op, &right))
    }

    fn resolve_operand(&mut self, token: &Token, side: OperandSide) -> Result<ResolverResult, SearchError> {
        let literal = token.literal();
        match self.resolve_token(token) {
            Ok(result) if result.identifier.is_empty() => Err(SearchError::invalid_operand(
                side,
                literal.clone(),
                SearchError::UnknownField(literal),
            )),
            Ok(result) => Ok(result),
            Err(err) => Err(SearchError::invalid_operand(side, literal, err)),
        }
    }

    fn resolve_token(&mut self, token: &Token) -> Result<ResolverResult, SearchError> {
        match token {
            Token::Identifier(name) => {
                if let Some(result) = resolve_macro(name) {
                    return Ok(result);
                }

                match self.resolver.resolve(name) {
                    Ok(result) => Ok(result),
                    Err(err) => match name.to_ascii_lowercase().as_str() {
                        "null" => Ok(ResolverResult::new("NULL")),
                        "true" => Ok(ResolverResult::new("1")),
                        "false" => Ok(ResolverResult::new("0")),
                        _ => Err(err),
                    },
                }
            }
            Token::Text(text) => Ok(bound_param(Value::from(text.clone()))),
            Token::Number(number) => Ok(bound_param(Value::from(*number))),
            Token::Function { name, args } => {
                let functions = self.functions;
                let mut resolve_arg = |arg: &Token| self.resolve_token(arg);
                functions.call(name, &mut resolve_arg, args)
            }
        }
    }
}
