//! Function tokens such as `geoDistance(lon, lat, 23.4, 42.7) < 25`.
//!
//! Functions live in an explicit [`TokenFunctions`] registry carried by the
//! [`crate::SearchContext`]. A function receives the raw argument tokens and a
//! callback that resolves a single token the same way a comparison operand
//! would be resolved, and returns the [`ResolverResult`] to compare with.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::resolver::{NullFallback, ResolverResult};
use crate::errors::SearchError;
use crate::fexpr::Token;
use crate::sql::Params;

/// Resolves one argument token.
pub type ArgResolver<'a> = dyn FnMut(&Token) -> Result<ResolverResult, SearchError> + 'a;

pub trait TokenFunction: Send + Sync {
    /// # Errors
    ///
    /// Arity mismatches, unsupported argument kinds and argument resolution
    /// failures.
    fn call(&self, resolve_arg: &mut ArgResolver<'_>, args: &[Token]) -> Result<ResolverResult, SearchError>;
}

impl<F> TokenFunction for F
where
    F: Fn(&mut ArgResolver<'_>, &[Token]) -> Result<ResolverResult, SearchError> + Send + Sync,
{
    fn call(&self, resolve_arg: &mut ArgResolver<'_>, args: &[Token]) -> Result<ResolverResult, SearchError> {
        self(resolve_arg, args)
    }
}

/// Named function registry.
///
/// [`TokenFunctions::default`] registers `geoDistance` and `strftime`.
///
/// ```rust
/// use searchcrate::filtering::{ResolverResult, TokenFunctions};
///
/// let mut functions = TokenFunctions::default();
/// functions.register("one", |_resolve, _args| Ok(ResolverResult::new("1")));
/// assert!(functions.contains("one"));
/// assert!(functions.contains("geoDistance"));
/// ```
#[derive(Clone)]
pub struct TokenFunctions {
    functions: HashMap<String, Arc<dyn TokenFunction>>,
}

impl TokenFunctions {
    /// A registry without any functions.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            functions: HashMap::new(),
        }
    }

    /// Register (or replace) a function under `name`.
    pub fn register<F>(&mut self, name: impl Into<String>, function: F) -> &mut Self
    where
        F: Fn(&mut ArgResolver<'_>, &[Token]) -> Result<ResolverResult, SearchError> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
        self
    }

    pub fn register_arc(&mut self, name: impl Into<String>, function: Arc<dyn TokenFunction>) -> &mut Self {
        self.functions.insert(name.into(), function);
        self
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Arc<dyn TokenFunction>> {
        self.functions.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }

    /// Call `name`, failing for an unregistered function.
    ///
    /// # Errors
    ///
    /// [`SearchError::Function`] for an unknown name, otherwise whatever the
    /// function returns.
    pub fn call(&self, name: &str, resolve_arg: &mut ArgResolver<'_>, args: &[Token]) -> Result<ResolverResult, SearchError> {
        let function = self
            .get(name)
            .ok_or_else(|| SearchError::function(name, "unknown function"))?;
        function.call(resolve_arg, args)
    }
}

impl Default for TokenFunctions {
    fn default() -> Self {
        let mut functions = Self::empty();
        functions
            .register("geoDistance", geo_distance)
            .register("strftime", strftime);
        functions
    }
}

impl fmt::Debug for TokenFunctions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("TokenFunctions").field("functions", &names).finish()
    }
}

const EARTH_RADIUS_KM: u32 = 6371;

/// Great-circle distance in km between `(lonA, latA)` and `(lonB, latB)`
/// using the haversine formula.
///
/// The SQL relies on SQLite's math functions, which the bundled
/// `libsqlite3-sys` only compiles in with
/// `LIBSQLITE3_FLAGS=-DSQLITE_ENABLE_MATH_FUNCTIONS` set at build time.
///
/// # Errors
///
/// Fails unless called with exactly 4 identifier or number arguments.
pub fn geo_distance(resolve_arg: &mut ArgResolver<'_>, args: &[Token]) -> Result<ResolverResult, SearchError> {
    const NAME: &str = "geoDistance";

    if args.len() != 4 {
        return Err(SearchError::function(NAME, format!("expected 4 arguments, got {}", args.len())));
    }

    let mut params = Params::new();
    let mut identifiers = Vec::with_capacity(4);
    for (i, arg) in args.iter().enumerate() {
        if !matches!(arg, Token::Identifier(_) | Token::Number(_)) {
            return Err(SearchError::function(NAME, format!("argument {i} must be an identifier or number")));
        }
        let resolved = resolve_arg(arg)?;
        params.extend(resolved.params);
        identifiers.push(resolved.identifier);
    }

    let (lon_a, lat_a, lon_b, lat_b) = (&identifiers[0], &identifiers[1], &identifiers[2], &identifiers[3]);
    let identifier = format!(
        "({r2} * ASIN(SQRT(\
         POWER(SIN((RADIANS({lat_b}) - RADIANS({lat_a})) / 2), 2) + \
         COS(RADIANS({lat_a})) * COS(RADIANS({lat_b})) * \
         POWER(SIN((RADIANS({lon_b}) - RADIANS({lon_a})) / 2), 2))))",
        r2 = 2 * EARTH_RADIUS_KM,
    );

    Ok(ResolverResult::with_params(identifier, params).null_fallback(NullFallback::Disabled))
}

/// `strftime(format, [time-value, modifiers...])`
///
/// # Errors
///
/// Fails without arguments, when the format is not a text literal, or for
/// a nested function argument.
pub fn strftime(resolve_arg: &mut ArgResolver<'_>, args: &[Token]) -> Result<ResolverResult, SearchError> {
    const NAME: &str = "strftime";

    let Some(format) = args.first() else {
        return Err(SearchError::function(NAME, "expected at least 1 argument"));
    };
    if !matches!(format, Token::Text(_)) {
        return Err(SearchError::function(NAME, "the first argument must be a text literal"));
    }

    let mut params = Params::new();
    let mut identifiers = Vec::with_capacity(args.len());
    for (i, arg) in args.iter().enumerate() {
        if matches!(arg, Token::Function { .. }) {
            return Err(SearchError::function(NAME, format!("argument {i} must be an identifier, number or text")));
        }
        let resolved = resolve_arg(arg)?;
        params.extend(resolved.params);
        identifiers.push(resolved.identifier);
    }

    Ok(ResolverResult::with_params(
        format!("strftime({})", identifiers.join(", ")),
        params,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::Value;

    /// Identifiers become columns, literals become `{:argN}` params.
    fn resolve_test_arg() -> impl FnMut(&Token) -> Result<ResolverResult, SearchError> {
        let mut counter = 0;
        move |token: &Token| {
            counter += 1;
            match token {
                Token::Identifier(name) => Ok(ResolverResult::new(format!("[[{name}]]"))),
                Token::Number(n) => {
                    let mut params = Params::new();
                    params.insert(format!("arg{counter}"), Value::from(*n));
                    Ok(ResolverResult::with_params(format!("{{:arg{counter}}}"), params))
                }
                Token::Text(t) => {
                    let mut params = Params::new();
                    params.insert(format!("arg{counter}"), Value::from(t.clone()));
                    Ok(ResolverResult::with_params(format!("{{:arg{counter}}}"), params))
                }
                Token::Function { name, .. } => Err(SearchError::function(name.clone(), "nested")),
            }
        }
    }

    fn ident(name: &str) -> Token {
        Token::Identifier(name.to_string())
    }

    #[test]
    fn test_geo_distance_builds_haversine() {
        let mut resolve = resolve_test_arg();
        let args = [ident("lon"), ident("lat"), Token::Number(23.4), Token::Number(42.7)];

        let result = geo_distance(&mut resolve, &args).unwrap();

        assert_eq!(result.null_fallback, NullFallback::Disabled);
        assert_eq!(result.params.len(), 2);
        assert!(result.identifier.starts_with("(12742 * ASIN(SQRT("));
        assert!(result.identifier.contains("RADIANS({:arg4}) - RADIANS([[lat]])"));
        assert!(result.identifier.contains("RADIANS({:arg3}) - RADIANS([[lon]])"));
    }

    #[test]
    fn test_geo_distance_rejects_bad_arguments() {
        let mut resolve = resolve_test_arg();

        let err = geo_distance(&mut resolve, &[ident("a"), ident("b")]).unwrap_err();
        assert_eq!(err.to_string(), "[geoDistance] expected 4 arguments, got 2");

        let args = [ident("a"), Token::Text("1".into()), ident("c"), ident("d")];
        let err = geo_distance(&mut resolve, &args).unwrap_err();
        assert_eq!(err.to_string(), "[geoDistance] argument 1 must be an identifier or number");

        let nested = Token::Function {
            name: "geoDistance".into(),
            args: vec![],
        };
        let args = [ident("a"), ident("b"), ident("c"), nested];
        assert!(geo_distance(&mut resolve, &args).is_err());
    }

    #[test]
    fn test_geo_distance_propagates_argument_errors() {
        let mut failing = |_: &Token| -> Result<ResolverResult, SearchError> { Err(SearchError::UnknownField("x".into())) };
        let args = [ident("x"), ident("y"), ident("z"), ident("w")];
        let err = geo_distance(&mut failing, &args).unwrap_err();
        assert!(matches!(err, SearchError::UnknownField(_)));
    }

    #[test]
    fn test_strftime() {
        let mut resolve = resolve_test_arg();
        let args = [Token::Text("%Y-%m".into()), ident("created"), Token::Text("start of month".into())];

        let result = strftime(&mut resolve, &args).unwrap();
        assert_eq!(result.identifier, "strftime({:arg1}, [[created]], {:arg3})");
        assert_eq!(result.params.get("arg1"), Some(&Value::from("%Y-%m")));
        assert_eq!(result.null_fallback, NullFallback::Auto);
    }

    #[test]
    fn test_strftime_rejects_bad_arguments() {
        let mut resolve = resolve_test_arg();
        assert!(strftime(&mut resolve, &[]).is_err());
        assert!(strftime(&mut resolve, &[ident("created")]).is_err());
    }

    #[test]
    fn test_registry_lookup_and_unknown_function() {
        let mut functions = TokenFunctions::empty();
        functions.register("answer", |_resolve, _args| Ok(ResolverResult::new("42")));

        let mut resolve = resolve_test_arg();
        assert_eq!(functions.call("answer", &mut resolve, &[]).unwrap().identifier, "42");

        let err = functions.call("missing", &mut resolve, &[]).unwrap_err();
        assert_eq!(err.to_string(), "[missing] unknown function");
        assert!(!TokenFunctions::empty().contains("geoDistance"));
    }
}
