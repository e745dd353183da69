//! Typed read-only query description: filter predicates (equality, range),
//! ordering, and limit, rendered onto a sqlx `QueryBuilder`.
//!
//! Column names are `&'static str` supplied by the store methods, never
//! caller input, so nothing user-controlled reaches the SQL text.

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Postgres, QueryBuilder};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ScalarValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Date(NaiveDate),
    Timestamp(DateTime<Utc>),
    Uuid(Uuid),
}

macro_rules! scalar_from {
    ($($ty:ty => $variant:ident);+ $(;)?) => {
        $(impl From<$ty> for ScalarValue {
            fn from(v: $ty) -> Self {
                ScalarValue::$variant(v.into())
            }
        })+
    };
}

scalar_from! {
    &str => Text;
    String => Text;
    i64 => Int;
    i32 => Int;
    f64 => Float;
    bool => Bool;
    NaiveDate => Date;
    DateTime<Utc> => Timestamp;
    Uuid => Uuid;
}

impl ScalarValue {
    fn push_bind(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        match self {
            ScalarValue::Text(v) => qb.push_bind(v.clone()),
            ScalarValue::Int(v) => qb.push_bind(*v),
            ScalarValue::Float(v) => qb.push_bind(*v),
            ScalarValue::Bool(v) => qb.push_bind(*v),
            ScalarValue::Date(v) => qb.push_bind(*v),
            ScalarValue::Timestamp(v) => qb.push_bind(*v),
            ScalarValue::Uuid(v) => qb.push_bind(*v),
        };
    }
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(&'static str, ScalarValue),
    Gte(&'static str, ScalarValue),
    Lte(&'static str, ScalarValue),
}

#[derive(Debug, Clone, Copy)]
struct Order {
    column: &'static str,
    descending: bool,
}

/// A filtered, ordered, limited row selection against one table.
#[derive(Debug, Clone, Default)]
pub struct RowQuery {
    filters: Vec<Filter>,
    order: Option<Order>,
    limit: Option<i64>,
}

impl RowQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &'static str, value: impl Into<ScalarValue>) -> Self {
        self.filters.push(Filter::Eq(column, value.into()));
        self
    }

    pub fn gte(mut self, column: &'static str, value: impl Into<ScalarValue>) -> Self {
        self.filters.push(Filter::Gte(column, value.into()));
        self
    }

    pub fn lte(mut self, column: &'static str, value: impl Into<ScalarValue>) -> Self {
        self.filters.push(Filter::Lte(column, value.into()));
        self
    }

    pub fn order_asc(mut self, column: &'static str) -> Self {
        self.order = Some(Order { column, descending: false });
        self
    }

    pub fn order_desc(mut self, column: &'static str) -> Self {
        self.order = Some(Order { column, descending: true });
        self
    }

    pub fn limit(mut self, n: i64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Append WHERE / ORDER BY / LIMIT clauses to a `SELECT ... FROM t` head.
    pub fn apply(&self, qb: &mut QueryBuilder<'_, Postgres>) {
        for (i, filter) in self.filters.iter().enumerate() {
            qb.push(if i == 0 { " WHERE " } else { " AND " });
            let (column, op, value) = match filter {
                Filter::Eq(c, v) => (c, " = ", v),
                Filter::Gte(c, v) => (c, " >= ", v),
                Filter::Lte(c, v) => (c, " <= ", v),
            };
            qb.push(*column);
            qb.push(op);
            value.push_bind(qb);
        }

        if let Some(order) = self.order {
            qb.push(" ORDER BY ");
            qb.push(order.column);
            qb.push(if order.descending { " DESC" } else { " ASC" });
        }

        if let Some(limit) = self.limit {
            qb.push(" LIMIT ");
            qb.push_bind(limit);
        }
    }
}
