//! Dynamic query assembly
//!
//! Criteria fields are optional one by one, so predicates are accumulated
//! and joined with `where`/`and` at the end. Values are always bound; only
//! column names known to the caller go into the SQL text.

use super::fragments::{in_clause, Dialect};
use apim_core::errors::ApimError;
use apim_core::search::Order;
use rusqlite::types::Value;

/// A SQL condition with its bound values
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub sql: String,
    pub params: Vec<Value>,
}

impl Predicate {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }

    /// `column = ?`
    pub fn eq(column: &str, value: impl Into<Value>) -> Self {
        Self::new(format!("{} = ?", column), vec![value.into()])
    }

    /// `column in (?, …)`, `None` for an empty list
    pub fn in_list<V: Into<Value>>(
        column: &str,
        values: impl IntoIterator<Item = V>,
    ) -> Result<Option<Self>, ApimError> {
        let params: Vec<Value> = values.into_iter().map(Into::into).collect();
        if params.is_empty() {
            return Ok(None);
        }
        let marks = in_clause(params.len())?;
        Ok(Some(Self::new(format!("{} in ({})", column, marks), params)))
    }

    /// Conjunction of several predicates, wrapped in parentheses
    pub fn all(predicates: Vec<Predicate>) -> Self {
        Self::join(predicates, " and ")
    }

    /// Disjunction of several predicates, wrapped in parentheses
    pub fn any(predicates: Vec<Predicate>) -> Self {
        Self::join(predicates, " or ")
    }

    fn join(predicates: Vec<Predicate>, separator: &str) -> Self {
        let mut sql = Vec::with_capacity(predicates.len());
        let mut params = Vec::new();
        for p in predicates {
            sql.push(p.sql);
            params.extend(p.params);
        }
        Self::new(format!("({})", sql.join(separator)), params)
    }
}

/// Accumulates predicates, ordering and paging around a base `select`
#[derive(Debug, Clone)]
pub struct QueryBuilder {
    base: String,
    base_params: Vec<Value>,
    predicates: Vec<Predicate>,
    group_by: Option<String>,
    order_by: Vec<String>,
    paging: Option<String>,
    error: Option<ApimError>,
}

impl QueryBuilder {
    /// `base` is everything up to the `where`: projection, table and joins
    pub fn new(base: impl Into<String>) -> Self {
        Self::with_base_params(base, Vec::new())
    }

    /// Base text that carries placeholders of its own, bound before any predicate
    pub fn with_base_params(base: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            base: base.into(),
            base_params: params,
            predicates: Vec::new(),
            group_by: None,
            order_by: Vec::new(),
            paging: None,
            error: None,
        }
    }

    pub fn and(mut self, predicate: Predicate) -> Self {
        self.predicates.push(predicate);
        self
    }

    pub fn and_opt(self, predicate: Option<Predicate>) -> Self {
        match predicate {
            Some(p) => self.and(p),
            None => self,
        }
    }

    pub fn and_eq(self, column: &str, value: impl Into<Value>) -> Self {
        self.and(Predicate::eq(column, value))
    }

    /// Equality on an optional value; absent means no predicate
    pub fn and_eq_opt<V: Into<Value>>(self, column: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.and_eq(column, v),
            None => self,
        }
    }

    /// `column in (…)`; an empty list adds nothing
    pub fn and_in<V: Into<Value>>(mut self, column: &str, values: impl IntoIterator<Item = V>) -> Self {
        match Predicate::in_list(column, values) {
            Ok(None) => self,
            Ok(Some(p)) => self.and(p),
            Err(err) => {
                self.error.get_or_insert(err);
                self
            }
        }
    }

    /// `column <op> ?` for a comparison operator
    pub fn and_cmp(self, column: &str, op: CmpOp, value: impl Into<Value>) -> Self {
        self.and(Predicate::new(
            format!("{} {} ?", column, op.as_sql()),
            vec![value.into()],
        ))
    }

    /// Case-insensitive substring match
    pub fn and_contains_ci(self, column: &str, needle: &str) -> Self {
        self.and(Predicate::new(
            format!("lower({}) like ?", column),
            vec![Value::Text(format!("%{}%", needle.to_lowercase()))],
        ))
    }

    pub fn group_by(mut self, columns: impl Into<String>) -> Self {
        self.group_by = Some(columns.into());
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, order: Order) -> Self {
        self.order_by
            .push(format!("{} {}", column.into(), order.as_sql()));
        self
    }

    pub fn paging(mut self, dialect: Dialect, limit: usize, offset: usize) -> Self {
        self.paging = Some(dialect.paging_clause(limit, offset));
        self
    }

    /// Offset without a limit, for sub-selects that must be ordered
    pub fn offset(mut self, dialect: Dialect, offset: usize) -> Self {
        self.paging = Some(dialect.offset_clause(offset));
        self
    }

    pub fn has_predicates(&self) -> bool {
        !self.predicates.is_empty()
    }

    /// ` where a and b`, empty when there is no predicate
    pub fn where_clause(&self) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();
        for (i, p) in self.predicates.iter().enumerate() {
            sql.push_str(if i == 0 { " where " } else { " and " });
            sql.push_str(&p.sql);
            params.extend(p.params.iter().cloned());
        }
        (sql, params)
    }

    pub fn build(self) -> Result<(String, Vec<Value>), ApimError> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let (where_sql, where_params) = self.where_clause();
        let mut params = self.base_params;
        params.extend(where_params);
        let mut sql = self.base;
        sql.push_str(&where_sql);
        if let Some(group_by) = &self.group_by {
            sql.push_str(" group by ");
            sql.push_str(group_by);
        }
        if !self.order_by.is_empty() {
            sql.push_str(" order by ");
            sql.push_str(&self.order_by.join(", "));
        }
        if let Some(paging) = &self.paging {
            sql.push_str(paging);
        }
        Ok((sql, params))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CmpOp {
    pub fn as_sql(&self) -> &'static str {
        match self {
            CmpOp::Lt => "<",
            CmpOp::Le => "<=",
            CmpOp::Gt => ">",
            CmpOp::Ge => ">=",
        }
    }
}
