//! Comparisons against fields that can hold several values per row, such as
//! a relation resolved through a join table.
//!
//! A resolver marks such an operand with a [`MultiMatchSubquery`] that lists
//! every candidate value of the field for the current row. The compiler then
//! AND-s the plain comparison with a [`MultiMatchExpr`], which requires that at
//! least one of those values satisfies the same operator.

use std::sync::Arc;

use crate::sql::{Params, SqlExpr};

/// Condition that is false for every row.
const NEVER_MATCH: &str = "0=1";

/// A `LEFT JOIN` inside a multi-match subquery.
#[derive(Debug, Clone)]
pub struct Join {
    pub table_name: String,
    pub table_alias: String,
    pub on: Option<Arc<dyn SqlExpr>>,
}

impl Join {
    pub fn new(table_name: impl Into<String>, table_alias: impl Into<String>, on: Option<Arc<dyn SqlExpr>>) -> Self {
        Self {
            table_name: table_name.into(),
            table_alias: table_alias.into(),
            on,
        }
    }
}

/// `SELECT <value> AS [[multiMatchValue]] FROM ... WHERE [[from.id]] = [[target.id]]`
#[derive(Debug, Clone, Default)]
pub struct MultiMatchSubquery {
    /// Alias of the outer table the subquery correlates with.
    pub target_table_alias: String,
    pub from_table_name: String,
    pub from_table_alias: String,
    /// Expression selected as `multiMatchValue`, markers included.
    pub value_identifier: String,
    pub joins: Vec<Join>,
    pub params: Params,
}

impl SqlExpr for MultiMatchSubquery {
    fn build(&self, params: &mut Params) -> String {
        if self.target_table_alias.is_empty() || self.from_table_name.is_empty() || self.from_table_alias.is_empty() {
            return NEVER_MATCH.to_string();
        }

        params.extend(self.params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let mut joins = String::new();
        for join in &self.joins {
            joins.push_str(&format!(" LEFT JOIN {{{{{}}}}} {{{{{}}}}}", join.table_name, join.table_alias));
            if let Some(on) = &join.on {
                let on_sql = on.build(params);
                if !on_sql.is_empty() {
                    joins.push_str(" ON ");
                    joins.push_str(&on_sql);
                }
            }
        }

        format!(
            "SELECT {} AS [[multiMatchValue]] FROM {{{{{}}}}} {{{{{}}}}}{joins} WHERE [[{}.id]] = [[{}.id]]",
            self.value_identifier,
            self.from_table_name,
            self.from_table_alias,
            self.from_table_alias,
            self.target_table_alias,
        )
    }
}

/// `EXISTS (SELECT 1 FROM (sub) {{alias}}, ... WHERE <condition>)`
///
/// `condition` compares the `multiMatchValue` columns of the aliased
/// subqueries (or a plain operand for a side without one).
#[derive(Debug, Clone)]
pub struct MultiMatchExpr {
    pub sources: Vec<(Arc<dyn SqlExpr>, String)>,
    pub condition: Arc<dyn SqlExpr>,
}

impl SqlExpr for MultiMatchExpr {
    fn build(&self, params: &mut Params) -> String {
        if self.sources.is_empty() {
            return NEVER_MATCH.to_string();
        }

        let mut own = Params::new();
        let mut sources = Vec::with_capacity(self.sources.len());
        for (subquery, alias) in &self.sources {
            let sql = subquery.build(&mut own);
            // an incomplete subquery can never yield a value
            if sql == NEVER_MATCH {
                return NEVER_MATCH.to_string();
            }
            sources.push(format!("({sql}) {{{{{alias}}}}}"));
        }

        let condition = self.condition.build(&mut own);
        params.extend(own);
        format!("EXISTS (SELECT 1 FROM {} WHERE {condition})", sources.join(", "))
    }
}
