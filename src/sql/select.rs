//! Cloneable `SELECT` builder assembled into a sea-query [`SelectStatement`].

use std::sync::Arc;

use sea_orm::sea_query::{Alias, Asterisk, Condition, Expr, Func, JoinType, Order, Query, SelectStatement};
use sea_orm::{DbBackend, Statement};

use super::{AndExpr, Params, SqlExpr, to_simple_expr};
use crate::errors::SearchError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinKind {
    Inner,
    Left,
}

impl From<JoinKind> for JoinType {
    fn from(kind: JoinKind) -> Self {
        match kind {
            JoinKind::Inner => JoinType::InnerJoin,
            JoinKind::Left => JoinType::LeftJoin,
        }
    }
}

#[derive(Debug, Clone)]
struct JoinClause {
    kind: JoinKind,
    table: String,
    alias: Option<String>,
    on: Option<Arc<dyn SqlExpr>>,
}

/// Base query for a search.
///
/// Setters take `&mut self` so a resolver can extend a query it was handed;
/// the provider always works on a clone, leaving the caller's base query
/// untouched.
///
/// ```rust
/// use std::sync::Arc;
/// use sea_orm::DbBackend;
/// use searchcrate::sql::{RawExpr, SelectQuery};
///
/// let mut query = SelectQuery::new("posts");
/// query.and_where(Arc::new(RawExpr::new("[[published]] = 1"))).order_by("[[created]] DESC").limit(10);
///
/// let stmt = query.build(DbBackend::Sqlite).unwrap();
/// assert_eq!(
///     stmt.sql,
///     r#"SELECT "posts".* FROM "posts" WHERE "published" = 1 ORDER BY "created" DESC LIMIT ?"#
/// );
/// assert_eq!(stmt.values.unwrap().0, vec![sea_orm::Value::BigUnsigned(Some(10))]);
/// ```
#[derive(Debug, Clone)]
pub struct SelectQuery {
    columns: Vec<String>,
    distinct: bool,
    table: String,
    alias: Option<String>,
    joins: Vec<JoinClause>,
    wheres: Vec<Arc<dyn SqlExpr>>,
    order_by: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl SelectQuery {
    /// `SELECT <table>.* FROM <table>`
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            columns: Vec::new(),
            distinct: false,
            table: table.into(),
            alias: None,
            joins: Vec::new(),
            wheres: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    /// Alias the FROM table; the default column list follows the alias.
    pub fn alias(&mut self, alias: impl Into<String>) -> &mut Self {
        self.alias = Some(alias.into());
        self
    }

    /// Replace the selected column expressions.
    pub fn columns<I, S>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = columns.into_iter().map(Into::into).collect();
        self
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.distinct = distinct;
        self
    }

    pub fn join(
        &mut self,
        kind: JoinKind,
        table: impl Into<String>,
        alias: Option<String>,
        on: Option<Arc<dyn SqlExpr>>,
    ) -> &mut Self {
        self.joins.push(JoinClause {
            kind,
            table: table.into(),
            alias,
            on,
        });
        self
    }

    pub fn left_join(&mut self, table: impl Into<String>, alias: impl Into<String>, on: Arc<dyn SqlExpr>) -> &mut Self {
        self.join(JoinKind::Left, table, Some(alias.into()), Some(on))
    }

    /// AND a condition into the WHERE list.
    pub fn and_where(&mut self, expr: Arc<dyn SqlExpr>) -> &mut Self {
        self.wheres.push(expr);
        self
    }

    /// Append an ORDER BY term.
    pub fn order_by(&mut self, term: impl Into<String>) -> &mut Self {
        self.order_by.push(term.into());
        self
    }

    pub fn limit(&mut self, limit: u64) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    pub fn offset(&mut self, offset: u64) -> &mut Self {
        self.offset = Some(offset);
        self
    }

    #[must_use]
    pub fn table(&self) -> &str {
        &self.table
    }

    /// The alias if set, otherwise the table name.
    #[must_use]
    pub fn table_alias(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    #[must_use]
    pub fn is_distinct(&self) -> bool {
        self.distinct
    }

    #[must_use]
    pub fn has_join(&self, alias: &str) -> bool {
        self.joins
            .iter()
            .any(|j| j.alias.as_deref().unwrap_or(&j.table) == alias)
    }

    #[must_use]
    pub fn order_terms(&self) -> &[String] {
        &self.order_by
    }

    /// FROM, JOIN and WHERE clauses shared by the data and count queries.
    fn apply_source(&self, select: &mut SelectStatement, backend: DbBackend) -> Result<(), SearchError> {
        match &self.alias {
            Some(alias) => select.from_as(Alias::new(&self.table), Alias::new(alias)),
            None => select.from(Alias::new(&self.table)),
        };

        for join in &self.joins {
            let mut params = Params::new();
            let on_sql = join.on.as_ref().map(|on| on.build(&mut params)).unwrap_or_default();
            let on = if on_sql.is_empty() {
                Condition::all()
            } else {
                Condition::all().add(to_simple_expr(&on_sql, &params, backend)?)
            };
            match &join.alias {
                Some(alias) => select.join_as(join.kind.into(), Alias::new(&join.table), Alias::new(alias), on),
                None => select.join(join.kind.into(), Alias::new(&join.table), on),
            };
        }

        let mut params = Params::new();
        let where_sql = AndExpr(self.wheres.clone()).build(&mut params);
        if !where_sql.is_empty() {
            select.and_where(to_simple_expr(&where_sql, &params, backend)?);
        }

        Ok(())
    }

    fn apply_columns(&self, select: &mut SelectStatement, backend: DbBackend) -> Result<(), SearchError> {
        if self.distinct {
            select.distinct();
        }
        if self.columns.is_empty() {
            select.column((Alias::new(self.table_alias()), Asterisk));
        }
        for column in &self.columns {
            select.expr(to_simple_expr(column, &Params::new(), backend)?);
        }
        Ok(())
    }

    /// The data query as a sea-query statement.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MissingParam`] for an unbound placeholder.
    pub fn to_statement(&self, backend: DbBackend) -> Result<SelectStatement, SearchError> {
        let mut select = Query::select();
        self.apply_columns(&mut select, backend)?;
        self.apply_source(&mut select, backend)?;

        for term in &self.order_by {
            let (expr, order) = split_order(term);
            select.order_by_expr(to_simple_expr(expr, &Params::new(), backend)?, order);
        }
        if let Some(limit) = self.limit {
            select.limit(limit);
        }
        if let Some(offset) = self.offset {
            select.offset(offset);
        }

        Ok(select)
    }

    /// Count query over the same FROM/JOIN/WHERE with ordering and paging
    /// stripped. `count_column` switches to `COUNT(DISTINCT col)`; a DISTINCT
    /// query without one is counted through a subselect.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MissingParam`] for an unbound placeholder.
    pub fn to_count_statement(
        &self,
        count_column: Option<&str>,
        backend: DbBackend,
    ) -> Result<SelectStatement, SearchError> {
        let mut select = Query::select();

        match count_column {
            Some(column) => {
                let column = to_simple_expr(&format!("[[{column}]]"), &Params::new(), backend)?;
                select.expr_as(Func::count_distinct(column), Alias::new("total"));
                self.apply_source(&mut select, backend)?;
            }
            None if self.distinct => {
                let mut inner = Query::select();
                self.apply_columns(&mut inner, backend)?;
                self.apply_source(&mut inner, backend)?;
                select
                    .expr_as(Func::count(Expr::col(Asterisk)), Alias::new("total"))
                    .from_subquery(inner, Alias::new("__count"));
            }
            None => {
                select.expr_as(Func::count(Expr::col(Asterisk)), Alias::new("total"));
                self.apply_source(&mut select, backend)?;
            }
        }

        Ok(select)
    }

    /// Render the data statement.
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MissingParam`] for an unbound placeholder.
    pub fn build(&self, backend: DbBackend) -> Result<Statement, SearchError> {
        Ok(backend.build(&self.to_statement(backend)?))
    }

    /// Render the count statement; see [`Self::to_count_statement`].
    ///
    /// # Errors
    ///
    /// Returns [`SearchError::MissingParam`] for an unbound placeholder.
    pub fn build_count(&self, count_column: Option<&str>, backend: DbBackend) -> Result<Statement, SearchError> {
        Ok(backend.build(&self.to_count_statement(count_column, backend)?))
    }
}

/// Split a trailing ` ASC`/` DESC` off an ORDER BY term.
fn split_order(term: &str) -> (&str, Order) {
    let term = term.trim();
    if let Some(expr) = term.strip_suffix(" DESC") {
        (expr, Order::Desc)
    } else if let Some(expr) = term.strip_suffix(" ASC") {
        (expr, Order::Asc)
    } else {
        (term, Order::Asc)
    }
}
