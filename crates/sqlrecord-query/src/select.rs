//! SELECT query builder.

use crate::clause::{Conditions, OrderBy, OrderDirection};
use crate::expr::{Expr, Logic, Op};
use crate::join::{Join, JoinType};
use sqlrecord_core::{Connection, Dialect, Result, Row, Value};

/// A SELECT query builder.
///
/// Conditions, joins and ordering are kept in the order they were added;
/// [`build`](Select::build) renders them with bound parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    distinct: bool,
    /// Columns to select (empty = all), with optional aliases
    columns: Vec<(Expr, Option<String>)>,
    from: Vec<(String, Option<String>)>,
    joins: Vec<Join>,
    where_clause: Conditions,
    group_by: Vec<String>,
    having: Conditions,
    order_by: Vec<OrderBy>,
    limit: Option<u64>,
    offset: Option<u64>,
}

impl Select {
    /// Create an empty SELECT.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the DISTINCT flag.
    pub fn distinct(mut self, distinct: bool) -> Self {
        self.distinct = distinct;
        self
    }

    /// Add a column to the select list.
    pub fn column(mut self, column: impl Into<Expr>, alias: Option<String>) -> Self {
        self.columns.push((column.into(), alias));
        self
    }

    /// Add several columns to the select list.
    pub fn columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<Expr>,
    {
        self.columns
            .extend(columns.into_iter().map(|c| (c.into(), None)));
        self
    }

    /// Add a table to the FROM clause.
    pub fn from(mut self, table: impl Into<String>, alias: Option<String>) -> Self {
        self.from.push((table.into(), alias));
        self
    }

    /// Add a JOIN clause.
    pub fn join(mut self, join: Join) -> Self {
        self.joins.push(join);
        self
    }

    /// Start a join whose ON predicates are added by [`on`](Select::on).
    pub fn join_table(
        self,
        table: impl Into<String>,
        alias: Option<String>,
        join_type: JoinType,
    ) -> Self {
        self.join(Join::new(join_type, table, alias))
    }

    /// Add an ON comparison to the most recent join.
    ///
    /// Returns `None` when there is no join to attach it to.
    pub fn on(mut self, left: impl Into<String>, op: Op, right: impl Into<String>) -> Option<Self> {
        let last = self.joins.pop()?;
        self.joins.push(last.on(left, op, right));
        Some(self)
    }

    /// Add a WHERE comparison.
    pub fn filter(mut self, logic: Logic, column: impl Into<String>, op: Op, value: Value) -> Self {
        self.where_clause.push(logic, column, op, value);
        self
    }

    /// Open a WHERE group.
    pub fn filter_open(mut self, logic: Logic) -> Self {
        self.where_clause.open(logic);
        self
    }

    /// Close a WHERE group.
    pub fn filter_close(mut self) -> Self {
        self.where_clause.close();
        self
    }

    /// Add GROUP BY columns.
    pub fn group_by<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.group_by.extend(columns.into_iter().map(Into::into));
        self
    }

    /// Add a HAVING comparison.
    pub fn having(mut self, logic: Logic, column: impl Into<String>, op: Op, value: Value) -> Self {
        self.having.push(logic, column, op, value);
        self
    }

    /// Open a HAVING group.
    pub fn having_open(mut self, logic: Logic) -> Self {
        self.having.open(logic);
        self
    }

    /// Close a HAVING group.
    pub fn having_close(mut self) -> Self {
        self.having.close();
        self
    }

    /// Add ORDER BY clause.
    pub fn order_by(
        mut self,
        column: impl Into<String>,
        direction: Option<OrderDirection>,
    ) -> Self {
        self.order_by.push(OrderBy::new(column, direction));
        self
    }

    /// Set LIMIT.
    pub fn limit(mut self, n: u64) -> Self {
        self.limit = Some(n);
        self
    }

    /// Set OFFSET.
    pub fn offset(mut self, n: u64) -> Self {
        self.offset = Some(n);
        self
    }

    pub fn joins(&self) -> &[Join] {
        &self.joins
    }

    pub fn where_clause(&self) -> &Conditions {
        &self.where_clause
    }

    /// Build the SQL query and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = String::new();
        let mut params = Vec::new();

        sql.push_str("SELECT ");
        if self.distinct {
            sql.push_str("DISTINCT ");
        }

        if self.columns.is_empty() {
            sql.push('*');
        } else {
            let cols: Vec<String> = self
                .columns
                .iter()
                .map(|(expr, alias)| match alias {
                    Some(alias) => format!(
                        "{} AS {}",
                        expr.to_sql(dialect),
                        dialect.quote_identifier(alias)
                    ),
                    None => expr.to_sql(dialect),
                })
                .collect();
            sql.push_str(&cols.join(", "));
        }

        if !self.from.is_empty() {
            let tables: Vec<String> = self
                .from
                .iter()
                .map(|(table, alias)| match alias {
                    Some(alias) => format!(
                        "{} AS {}",
                        dialect.quote_identifier(table),
                        dialect.quote_identifier(alias)
                    ),
                    None => dialect.quote_identifier(table),
                })
                .collect();
            sql.push_str(" FROM ");
            sql.push_str(&tables.join(", "));
        }

        for join in &self.joins {
            sql.push_str(&join.to_sql(dialect));
        }

        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clause.build(dialect, &mut params));
        }

        if !self.group_by.is_empty() {
            let cols: Vec<String> = self
                .group_by
                .iter()
                .map(|c| dialect.quote_column(c))
                .collect();
            sql.push_str(" GROUP BY ");
            sql.push_str(&cols.join(", "));
        }

        if !self.having.is_empty() {
            sql.push_str(" HAVING ");
            sql.push_str(&self.having.build(dialect, &mut params));
        }

        if !self.order_by.is_empty() {
            let order: Vec<String> = self.order_by.iter().map(|o| o.to_sql(dialect)).collect();
            sql.push_str(" ORDER BY ");
            sql.push_str(&order.join(", "));
        }

        if let Some(n) = self.limit {
            sql.push_str(&format!(" LIMIT {n}"));
        }

        if let Some(n) = self.offset {
            if self.limit.is_none() && dialect == Dialect::Sqlite {
                sql.push_str(" LIMIT -1");
            }
            sql.push_str(&format!(" OFFSET {n}"));
        }

        (sql, params)
    }

    /// Execute the SELECT and return all rows.
    #[tracing::instrument(level = "trace", skip(self, conn))]
    pub fn fetch(&self, conn: &dyn Connection) -> Result<Vec<Row>> {
        let (sql, params) = self.build(conn.dialect());
        conn.query(&sql, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_select_all_columns() {
        let (sql, params) = Select::new().from("heroes", None).build(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"heroes\"");
        assert!(params.is_empty());
    }

    #[test]
    fn test_select_distinct_with_aliases() {
        let (sql, _) = Select::new()
            .distinct(true)
            .column("team_id", None)
            .column("author:profile.id", Some("author:profile:id".to_string()))
            .from("heroes", None)
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "SELECT DISTINCT \"team_id\", \"author:profile\".\"id\" AS \"author:profile:id\" FROM \"heroes\""
        );
    }

    #[test]
    fn build_collects_params_across_where_having() {
        let (sql, params) = Select::new()
            .columns(["team_id"])
            .column(Expr::count_star(), Some("n".to_string()))
            .from("heroes", None)
            .join_table("teams", None, JoinType::Inner)
            .on("teams.id", Op::Eq, "heroes.team_id")
            .unwrap()
            .filter(Logic::And, "age", Op::Gt, Value::Int(18))
            .group_by(["team_id"])
            .having(Logic::And, "n", Op::Gt, Value::Int(1))
            .order_by("team_id", Some(OrderDirection::Desc))
            .limit(10)
            .offset(20)
            .build(Dialect::Postgres);

        assert_eq!(
            sql,
            "SELECT \"team_id\", COUNT(*) AS \"n\" FROM \"heroes\" INNER JOIN \"teams\" ON \"teams\".\"id\" = \"heroes\".\"team_id\" WHERE \"age\" > $1 GROUP BY \"team_id\" HAVING \"n\" > $2 ORDER BY \"team_id\" DESC LIMIT 10 OFFSET 20"
        );
        assert_eq!(params, vec![Value::Int(18), Value::Int(1)]);
    }

    #[test]
    fn on_without_join_is_rejected() {
        assert!(Select::new().on("a.id", Op::Eq, "b.id").is_none());
    }

    #[test]
    fn sqlite_offset_without_limit() {
        let (sql, _) = Select::new().from("t", None).offset(5).build(Dialect::Sqlite);
        assert_eq!(sql, "SELECT * FROM \"t\" LIMIT -1 OFFSET 5");
    }
}
