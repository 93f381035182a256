//! Query builders for INSERT, UPDATE, DELETE operations.

use crate::clause::Conditions;
use crate::expr::{Logic, Op, bind};
use sqlrecord_core::{Connection, Dialect, Result, Value};

/// INSERT query builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Insert {
    table: String,
    columns: Vec<String>,
    values: Vec<Value>,
}

impl Insert {
    /// Create a new INSERT into `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            columns: Vec::new(),
            values: Vec::new(),
        }
    }

    /// Add a column value.
    pub fn value(mut self, column: impl Into<String>, value: Value) -> Self {
        self.columns.push(column.into());
        self.values.push(value);
        self
    }

    /// Add several column values.
    pub fn values<I, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Value)>,
        C: Into<String>,
    {
        for (column, value) in pairs {
            self = self.value(column, value);
        }
        self
    }

    /// Build the INSERT SQL and parameters.
    ///
    /// With no columns, inserts a row of defaults.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let table = dialect.quote_identifier(&self.table);
        if self.columns.is_empty() {
            let sql = match dialect {
                Dialect::Mysql => format!("INSERT INTO {table} () VALUES ()"),
                Dialect::Postgres | Dialect::Sqlite => {
                    format!("INSERT INTO {table} DEFAULT VALUES")
                }
            };
            return (sql, Vec::new());
        }

        let mut params = Vec::new();
        let columns: Vec<String> = self
            .columns
            .iter()
            .map(|c| dialect.quote_identifier(c))
            .collect();
        let placeholders: Vec<String> = self
            .values
            .iter()
            .map(|v| bind(v.clone(), dialect, &mut params))
            .collect();

        let sql = format!(
            "INSERT INTO {table} ({}) VALUES ({})",
            columns.join(", "),
            placeholders.join(", ")
        );
        (sql, params)
    }

    /// Execute the INSERT and return the generated row id.
    pub fn execute(&self, conn: &dyn Connection) -> Result<i64> {
        let (sql, params) = self.build(conn.dialect());
        conn.insert(&sql, &params)
    }
}

/// UPDATE query builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    table: String,
    set: Vec<(String, Value)>,
    where_clause: Conditions,
}

impl Update {
    /// Create a new UPDATE of `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            set: Vec::new(),
            where_clause: Conditions::new(),
        }
    }

    /// Set a column.
    pub fn set(mut self, column: impl Into<String>, value: Value) -> Self {
        self.set.push((column.into(), value));
        self
    }

    /// Set several columns.
    pub fn set_all<I, C>(mut self, pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, Value)>,
        C: Into<String>,
    {
        self.set
            .extend(pairs.into_iter().map(|(c, v)| (c.into(), v)));
        self
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

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Build the UPDATE SQL and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut params = Vec::new();
        let assignments: Vec<String> = self
            .set
            .iter()
            .map(|(column, value)| {
                format!(
                    "{} = {}",
                    dialect.quote_identifier(column),
                    bind(value.clone(), dialect, &mut params)
                )
            })
            .collect();

        let mut sql = format!(
            "UPDATE {} SET {}",
            dialect.quote_identifier(&self.table),
            assignments.join(", ")
        );

        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clause.build(dialect, &mut params));
        }

        (sql, params)
    }

    /// Execute the UPDATE and return rows affected.
    pub fn execute(&self, conn: &dyn Connection) -> Result<u64> {
        let (sql, params) = self.build(conn.dialect());
        conn.execute(&sql, &params)
    }
}

/// DELETE query builder.
#[derive(Debug, Clone, PartialEq)]
pub struct Delete {
    table: String,
    where_clause: Conditions,
}

impl Delete {
    /// Create a new DELETE from `table`.
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            where_clause: Conditions::new(),
        }
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

    pub fn table(&self) -> &str {
        &self.table
    }

    /// Build the DELETE SQL and parameters.
    pub fn build(&self, dialect: Dialect) -> (String, Vec<Value>) {
        let mut sql = format!("DELETE FROM {}", dialect.quote_identifier(&self.table));
        let mut params = Vec::new();

        if !self.where_clause.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.where_clause.build(dialect, &mut params));
        }

        (sql, params)
    }

    /// Execute the DELETE and return rows affected.
    pub fn execute(&self, conn: &dyn Connection) -> Result<u64> {
        let (sql, params) = self.build(conn.dialect());
        conn.execute(&sql, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_binds_in_column_order() {
        let (sql, params) = Insert::new("roles")
            .value("name", Value::from("admin"))
            .value("description", Value::Null)
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "INSERT INTO \"roles\" (\"name\", \"description\") VALUES (?1, ?2)"
        );
        assert_eq!(params, vec![Value::from("admin"), Value::Null]);
    }

    #[test]
    fn insert_defaults() {
        assert_eq!(
            Insert::new("t").build(Dialect::Sqlite).0,
            "INSERT INTO \"t\" DEFAULT VALUES"
        );
        assert_eq!(Insert::new("t").build(Dialect::Mysql).0, "INSERT INTO `t` () VALUES ()");
    }

    #[test]
    fn update_numbers_set_before_where() {
        let (sql, params) = Update::new("roles")
            .set("name", Value::from("staff"))
            .filter(Logic::And, "id", Op::Eq, Value::Int(3))
            .build(Dialect::Postgres);
        assert_eq!(sql, "UPDATE \"roles\" SET \"name\" = $1 WHERE \"id\" = $2");
        assert_eq!(params, vec![Value::from("staff"), Value::Int(3)]);
    }

    #[test]
    fn delete_with_groups() {
        let (sql, params) = Delete::new("tokens")
            .filter(Logic::And, "user_id", Op::Eq, Value::Int(1))
            .filter_open(Logic::Or)
            .filter(Logic::And, "expires", Op::Lt, Value::Int(100))
            .filter_close()
            .build(Dialect::Sqlite);
        assert_eq!(
            sql,
            "DELETE FROM \"tokens\" WHERE \"user_id\" = ?1 OR (\"expires\" < ?2)"
        );
        assert_eq!(params.len(), 2);
    }
}
