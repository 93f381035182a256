//! A builder whose statement kind is chosen at runtime.

use crate::builder::{Delete, Update};
use crate::clause::OrderDirection;
use crate::expr::{Expr, Logic, Op};
use crate::join::JoinType;
use crate::select::Select;
use sqlrecord_core::{Dialect, QueryError, Result, Value};

/// The kind of statement a [`Query`] builds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Select,
    Update,
    Delete,
}

impl QueryKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            QueryKind::Select => "select",
            QueryKind::Update => "update",
            QueryKind::Delete => "delete",
        }
    }
}

/// A SELECT, UPDATE or DELETE builder.
///
/// WHERE calls apply to every kind. The remaining calls only make sense for
/// a SELECT and fail with a builder error on the other kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum Query {
    Select(Select),
    Update(Update),
    Delete(Delete),
}

impl Query {
    /// A fresh builder of `kind`; UPDATE and DELETE target `table`.
    pub fn new(kind: QueryKind, table: &str) -> Self {
        match kind {
            QueryKind::Select => Query::Select(Select::new()),
            QueryKind::Update => Query::Update(Update::new(table)),
            QueryKind::Delete => Query::Delete(Delete::new(table)),
        }
    }

    pub fn kind(&self) -> QueryKind {
        match self {
            Query::Select(_) => QueryKind::Select,
            Query::Update(_) => QueryKind::Update,
            Query::Delete(_) => QueryKind::Delete,
        }
    }

    fn select_only(self, call: &str, f: impl FnOnce(Select) -> Option<Select>) -> Result<Self> {
        match self {
            Query::Select(select) => f(select).map(Query::Select).ok_or_else(|| {
                QueryError::builder(format!("{call} has nothing to apply to")).into()
            }),
            other => Err(QueryError::builder(format!(
                "{call} cannot be applied to a {} query",
                other.kind().as_str()
            ))
            .into()),
        }
    }

    pub fn filter(self, logic: Logic, column: impl Into<String>, op: Op, value: Value) -> Self {
        match self {
            Query::Select(q) => Query::Select(q.filter(logic, column, op, value)),
            Query::Update(q) => Query::Update(q.filter(logic, column, op, value)),
            Query::Delete(q) => Query::Delete(q.filter(logic, column, op, value)),
        }
    }

    pub fn filter_open(self, logic: Logic) -> Self {
        match self {
            Query::Select(q) => Query::Select(q.filter_open(logic)),
            Query::Update(q) => Query::Update(q.filter_open(logic)),
            Query::Delete(q) => Query::Delete(q.filter_open(logic)),
        }
    }

    pub fn filter_close(self) -> Self {
        match self {
            Query::Select(q) => Query::Select(q.filter_close()),
            Query::Update(q) => Query::Update(q.filter_close()),
            Query::Delete(q) => Query::Delete(q.filter_close()),
        }
    }

    pub fn distinct(self, distinct: bool) -> Result<Self> {
        self.select_only("distinct", |q| Some(q.distinct(distinct)))
    }

    pub fn column(self, column: Expr, alias: Option<String>) -> Result<Self> {
        self.select_only("select", |q| Some(q.column(column, alias)))
    }

    pub fn from(self, table: String, alias: Option<String>) -> Result<Self> {
        self.select_only("from", |q| Some(q.from(table, alias)))
    }

    pub fn join(self, table: String, alias: Option<String>, join_type: JoinType) -> Result<Self> {
        self.select_only("join", |q| Some(q.join_table(table, alias, join_type)))
    }

    pub fn on(self, left: String, op: Op, right: String) -> Result<Self> {
        self.select_only("on", |q| q.on(left, op, right))
    }

    pub fn group_by(self, columns: Vec<String>) -> Result<Self> {
        self.select_only("group_by", |q| Some(q.group_by(columns)))
    }

    pub fn having(self, logic: Logic, column: String, op: Op, value: Value) -> Result<Self> {
        self.select_only("having", |q| Some(q.having(logic, column, op, value)))
    }

    pub fn having_open(self, logic: Logic) -> Result<Self> {
        self.select_only("having_open", |q| Some(q.having_open(logic)))
    }

    pub fn having_close(self) -> Result<Self> {
        self.select_only("having_close", |q| Some(q.having_close()))
    }

    pub fn order_by(self, column: String, direction: Option<OrderDirection>) -> Result<Self> {
        self.select_only("order_by", |q| Some(q.order_by(column, direction)))
    }

    pub fn limit(self, n: u64) -> Result<Self> {
        self.select_only("limit", |q| Some(q.limit(n)))
    }

    pub fn offset(self, n: u64) -> Result<Self> {
        self.select_only("offset", |q| Some(q.offset(n)))
    }

    /// Build the SQL query and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        match self {
            Query::Select(q) => q.build(dialect),
            Query::Update(q) => q.build(dialect),
            Query::Delete(q) => q.build(dialect),
        }
    }

    /// The SELECT builder, if this is one.
    pub fn as_select(&self) -> Option<&Select> {
        match self {
            Query::Select(q) => Some(q),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn where_applies_to_every_kind() {
        for kind in [QueryKind::Select, QueryKind::Update, QueryKind::Delete] {
            let q = Query::new(kind, "roles").filter(Logic::And, "id", Op::Eq, Value::Int(1));
            assert_eq!(q.kind(), kind);
        }
        let (sql, _) = Query::new(QueryKind::Delete, "roles")
            .filter(Logic::And, "id", Op::Eq, Value::Int(1))
            .build(Dialect::Sqlite);
        assert_eq!(sql, "DELETE FROM \"roles\" WHERE \"id\" = ?1");
    }

    #[test]
    fn select_only_calls_fail_elsewhere() {
        let err = Query::new(QueryKind::Update, "roles")
            .join("users".to_string(), None, JoinType::Inner)
            .unwrap_err();
        assert!(err.to_string().contains("join"));
        assert!(Query::new(QueryKind::Delete, "roles").limit(1).is_err());
        assert!(Query::new(QueryKind::Select, "roles").limit(1).is_ok());
    }

    #[test]
    fn on_requires_a_join() {
        let q = Query::new(QueryKind::Select, "roles");
        assert!(q.clone().on("a.x".into(), Op::Eq, "b.y".into()).is_err());
        let q = q
            .join("roles_users".into(), None, JoinType::Inner)
            .and_then(|q| q.on("roles_users.role_id".into(), Op::Eq, "roles.id".into()))
            .unwrap();
        assert_eq!(q.as_select().map(|s| s.joins().len()), Some(1));
    }
}
