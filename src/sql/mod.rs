//! # SQL Expressions
//!
//! A small expression layer between the filter compiler and sea-orm. Compiled
//! fragments are plain SQL text using three portable markers:
//!
//! | marker | meaning |
//! |---|---|
//! | `[[col]]` / `[[t.col]]` | column, quoted per backend (`*` left bare) |
//! | `{{table}}` | table name or alias, quoted per backend |
//! | `{:name}` | named bound parameter, looked up in [`Params`] |
//!
//! [`to_simple_expr`] turns such a fragment into a sea-query [`SimpleExpr`];
//! quoting and placeholder numbering are left to the backend's query builder.

pub mod select;

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use sea_orm::sea_query::{Alias, ColumnRef, Expr, IntoIden, SimpleExpr};
use sea_orm::{DbBackend, Value};
use uuid::Uuid;

use crate::errors::SearchError;

pub use select::{JoinKind, SelectQuery};

/// Bound values keyed by placeholder name.
pub type Params = HashMap<String, Value>;

/// A buildable SQL fragment.
pub trait SqlExpr: fmt::Debug + Send + Sync {
    /// Render the fragment, merging every value it references into `params`.
    fn build(&self, params: &mut Params) -> String;
}

/// Verbatim SQL with its own bound values.
#[derive(Debug, Clone, Default)]
pub struct RawExpr {
    sql: String,
    params: Params,
}

impl RawExpr {
    pub fn new(sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            params: Params::new(),
        }
    }

    pub fn with_params(sql: impl Into<String>, params: Params) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    #[must_use]
    pub fn sql(&self) -> &str {
        &self.sql
    }

    #[must_use]
    pub fn params(&self) -> &Params {
        &self.params
    }
}

impl SqlExpr for RawExpr {
    fn build(&self, params: &mut Params) -> String {
        params.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));
        self.sql.clone()
    }
}

fn concat(parts: &[Arc<dyn SqlExpr>], params: &mut Params, sep: &str) -> String {
    let built: Vec<String> = parts
        .iter()
        .map(|part| part.build(params))
        .filter(|sql| !sql.is_empty())
        .collect();

    match built.len() {
        0 => String::new(),
        1 => built.into_iter().next().unwrap_or_default(),
        _ => built
            .iter()
            .map(|sql| format!("({sql})"))
            .collect::<Vec<_>>()
            .join(sep),
    }
}

/// `(a) AND (b) ...`; empty parts are skipped and a single part is left bare.
#[derive(Debug, Clone, Default)]
pub struct AndExpr(pub Vec<Arc<dyn SqlExpr>>);

impl SqlExpr for AndExpr {
    fn build(&self, params: &mut Params) -> String {
        concat(&self.0, params, " AND ")
    }
}

/// `(a) OR (b) ...`; empty parts are skipped and a single part is left bare.
#[derive(Debug, Clone, Default)]
pub struct OrExpr(pub Vec<Arc<dyn SqlExpr>>);

impl SqlExpr for OrExpr {
    fn build(&self, params: &mut Params) -> String {
        concat(&self.0, params, " OR ")
    }
}

/// Wraps a non-empty fragment in parentheses.
#[derive(Debug, Clone)]
pub struct EncloseExpr(pub Arc<dyn SqlExpr>);

impl SqlExpr for EncloseExpr {
    fn build(&self, params: &mut Params) -> String {
        let sql = self.0.build(params);
        if sql.is_empty() { sql } else { format!("({sql})") }
    }
}

/// `prefix` followed by up to 32 random lowercase hex characters.
#[must_use]
pub fn random_name(prefix: &str, len: usize) -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("{prefix}{}", &id[..len.min(id.len())])
}

/// A fresh placeholder name for a bound parameter.
#[must_use]
pub fn param_name() -> String {
    random_name("p", 10)
}

fn column_ref(column: &str) -> ColumnRef {
    let parts: Vec<&str> = column.splitn(3, '.').collect();
    let iden = |part: &str| Alias::new(part).into_iden();

    match parts[..] {
        ["*"] => ColumnRef::Asterisk,
        [table, "*"] => ColumnRef::TableAsterisk(iden(table)),
        [table, name] => ColumnRef::TableColumn(iden(table), iden(name)),
        [schema, table, name] => ColumnRef::SchemaTableColumn(iden(schema), iden(table), iden(name)),
        _ => ColumnRef::Column(iden(column)),
    }
}

/// Template text and positional arguments of a custom sea-query expression.
struct Template<'a> {
    sql: String,
    args: Vec<SimpleExpr>,
    mark: &'a str,
    numbered: bool,
}

impl Template<'_> {
    fn push_arg(&mut self, arg: SimpleExpr) {
        // keep the tokenizer from merging the placeholder into the previous token
        if self
            .sql
            .ends_with(|c: char| c.is_alphanumeric() || matches!(c, '_' | '$' | '?'))
        {
            self.sql.push(' ');
        }
        self.args.push(arg);
        self.sql.push_str(self.mark);
        if self.numbered {
            self.sql.push_str(&self.args.len().to_string());
        }
    }

    fn push_char(&mut self, c: char) {
        // a bare mark is doubled to stay literal, `$` inside a word is not a mark
        let in_word = c == '$' && self.sql.ends_with(|p: char| p.is_alphanumeric() || matches!(p, '_' | '$'));
        if self.mark.starts_with(c) && !in_word {
            self.sql.push(c);
        }
        self.sql.push(c);
    }
}

/// Convert a marker-annotated fragment into a sea-query expression.
///
/// Every column, table and bound value becomes an argument of a
/// [`SimpleExpr::CustomWithExpr`], so the query builder of `backend` quotes
/// the identifiers and numbers the placeholders. Markers inside single-quoted
/// string literals are left untouched.
///
/// # Errors
///
/// Returns [`SearchError::MissingParam`] when a `{:name}` placeholder has no
/// entry in `params`.
pub fn to_simple_expr(sql: &str, params: &Params, backend: DbBackend) -> Result<SimpleExpr, SearchError> {
    let builder = backend.get_query_builder();
    let (mark, numbered) = builder.placeholder();
    let mut template = Template {
        sql: String::with_capacity(sql.len() + 16),
        args: Vec::new(),
        mark,
        numbered,
    };
    let mut i = 0;

    while i < sql.len() {
        let rest = &sql[i..];

        if rest.starts_with('\'') {
            let end = string_literal_end(rest);
            let literal = &rest[..end];
            // sea-query reads a backslash inside quotes as an escape
            if literal.contains('\\') {
                template.push_arg(SimpleExpr::Custom(literal.to_string()));
            } else {
                template.sql.push_str(literal);
            }
            i += end;
        } else if let Some(inner) = marker(rest, "[[", "]]") {
            template.push_arg(SimpleExpr::Column(column_ref(inner.trim())));
            i += inner.len() + 4;
        } else if let Some(inner) = marker(rest, "{{", "}}") {
            template.push_arg(SimpleExpr::Column(ColumnRef::Column(Alias::new(inner.trim()).into_iden())));
            i += inner.len() + 4;
        } else if let Some(name) = marker(rest, "{:", "}") {
            let value = params
                .get(name)
                .ok_or_else(|| SearchError::MissingParam(name.to_string()))?;
            template.push_arg(SimpleExpr::Value(value.clone()));
            i += name.len() + 3;
        } else if let Some(c) = rest.chars().next() {
            template.push_char(c);
            i += c.len_utf8();
        }
    }

    Ok(Expr::cust_with_exprs(template.sql, template.args))
}

/// Byte length of the leading `'...'` literal (with `''` escapes), or the
/// whole remainder when unterminated.
fn string_literal_end(rest: &str) -> usize {
    let bytes = rest.as_bytes();
    let mut i = 1;
    while i < bytes.len() {
        if bytes[i] == b'\'' {
            if bytes.get(i + 1) == Some(&b'\'') {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn marker<'a>(rest: &'a str, open: &str, close: &str) -> Option<&'a str> {
    let body = rest.strip_prefix(open)?;
    let end = body.find(close)?;
    let inner = &body[..end];
    if inner.is_empty() || inner.contains(['\n', '\'']) {
        return None;
    }
    Some(inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::sea_query::Query;

    fn params(pairs: &[(&str, Value)]) -> Params {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    fn rendered(sql: &str, params: &Params, backend: DbBackend) -> (String, Vec<Value>) {
        let mut select = Query::select();
        select.expr(to_simple_expr(sql, params, backend).unwrap());
        let stmt = backend.build(&select);
        let sql = stmt.sql.strip_prefix("SELECT ").unwrap_or(&stmt.sql).to_string();
        (sql, stmt.values.map(|values| values.0).unwrap_or_default())
    }

    #[test]
    fn test_quotes_columns_and_tables() {
        let (sql, values) = rendered("[[t.*]], [[t.name]], [[*]], {{demo}}", &Params::new(), DbBackend::Sqlite);
        assert_eq!(sql, r#""t".*, "t"."name", *, "demo""#);
        assert!(values.is_empty());

        let (sql, _) = rendered("[[a.b]] + [[s.t.c]]", &Params::new(), DbBackend::MySql);
        assert_eq!(sql, "`a`.`b` + `s`.`t`.`c`");

        let (sql, _) = rendered(r#"[[we"ird]]"#, &Params::new(), DbBackend::Postgres);
        assert_eq!(sql, r#""we""ird""#);
    }

    #[test]
    fn test_placeholders_in_order() {
        let p = params(&[("x", Value::from(1i64)), ("y", Value::from("two"))]);

        let (sql, values) = rendered("[[a]] = {:y} OR [[b]] > {:x} OR [[c]] = {:y}", &p, DbBackend::Sqlite);
        assert_eq!(sql, r#""a" = ? OR "b" > ? OR "c" = ?"#);
        assert_eq!(values, vec![Value::from("two"), Value::from(1i64), Value::from("two")]);

        let (sql, values) = rendered("[[a]] = {:y} OR [[b]] > {:x}", &p, DbBackend::Postgres);
        assert_eq!(sql, r#""a" = $1 OR "b" > $2"#);
        assert_eq!(values, vec![Value::from("two"), Value::from(1i64)]);
    }

    #[test]
    fn test_string_literals_are_kept_verbatim() {
        let (sql, values) = rendered(
            r"JSON_EXTRACT([[data]], '$.a[0]') LIKE 'x{:y}''[[z]]' ESCAPE '\'",
            &Params::new(),
            DbBackend::Sqlite,
        );
        assert_eq!(sql, r#"JSON_EXTRACT("data", '$.a[0]') LIKE 'x{:y}''[[z]]' ESCAPE '\'"#);
        assert!(values.is_empty());

        let p = params(&[("v", Value::from("%a%"))]);
        let (sql, values) = rendered(r"[[t]] LIKE {:v} ESCAPE '\' AND [[u]] = 1", &p, DbBackend::Postgres);
        assert_eq!(sql, r#""t" LIKE $1 ESCAPE '\' AND "u" = 1"#);
        assert_eq!(values, vec![Value::from("%a%")]);
    }

    #[test]
    fn test_bare_placeholder_marks_stay_literal() {
        let (sql, values) = rendered("[[a]] = '?' OR ? IS NULL", &Params::new(), DbBackend::Sqlite);
        assert_eq!(sql, r#""a" = '?' OR ? IS NULL"#);
        assert!(values.is_empty());

        let p = params(&[("x", Value::from(1i64)), ("y", Value::from(2i64))]);
        let (sql, values) = rendered("COALESCE({:x}{:y})", &p, DbBackend::Postgres);
        assert_eq!(sql, "COALESCE($1 $2)");
        assert_eq!(values.len(), 2);
    }

    #[test]
    fn test_missing_param() {
        let err = to_simple_expr("[[a]] = {:nope}", &Params::new(), DbBackend::Sqlite).unwrap_err();
        assert!(matches!(err, SearchError::MissingParam(name) if name == "nope"));
    }

    #[test]
    fn test_and_or_enclose() {
        let a: Arc<dyn SqlExpr> = Arc::new(RawExpr::with_params("a = {:p1}", params(&[("p1", Value::from(1i64))])));
        let b: Arc<dyn SqlExpr> = Arc::new(RawExpr::new("b = 2"));
        let empty: Arc<dyn SqlExpr> = Arc::new(RawExpr::new(""));

        let mut p = Params::new();
        assert_eq!(AndExpr(vec![a.clone(), empty.clone(), b.clone()]).build(&mut p), "(a = {:p1}) AND (b = 2)");
        assert!(p.contains_key("p1"));

        let mut p = Params::new();
        assert_eq!(OrExpr(vec![a.clone()]).build(&mut p), "a = {:p1}");
        assert_eq!(OrExpr(vec![empty.clone()]).build(&mut p), "");
        assert_eq!(EncloseExpr(b).build(&mut p), "(b = 2)");
        assert_eq!(EncloseExpr(empty).build(&mut p), "");
    }

    #[test]
    fn test_random_names_are_distinct() {
        let a = param_name();
        let b = param_name();
        assert_eq!(a.len(), 11);
        assert!(a.starts_with('p'));
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
