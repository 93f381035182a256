//! The database collaborator consumed by records.

use crate::Result;
use crate::dialect::Dialect;
use crate::row::Row;
use crate::types::ColumnMeta;
use crate::value::Value;

/// A database connection capable of executing queries.
///
/// Calls are blocking and single-statement; there is no transaction or
/// pooling support at this layer. Implementations must be `Send + Sync` so a
/// connection can be shared behind an `Arc` by every record of a process.
///
/// # Example
///
/// ```rust,ignore
/// let rows = conn.query("SELECT * FROM roles WHERE id = ?1", &[Value::Int(1)])?;
/// let id = conn.insert("INSERT INTO roles (name) VALUES (?1)", &[Value::from("admin")])?;
/// ```
pub trait Connection: Send + Sync {
    /// The SQL dialect statements must be built for.
    fn dialect(&self) -> Dialect;

    /// Execute a query and return all rows.
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>>;

    /// Execute a query and return the first row, if any.
    fn query_one(&self, sql: &str, params: &[Value]) -> Result<Option<Row>> {
        Ok(self.query(sql, params)?.into_iter().next())
    }

    /// Execute a statement (UPDATE, DELETE, DDL) and return rows affected.
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64>;

    /// Execute an INSERT and return the generated row id.
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64>;

    /// List the columns of a table, in declaration order.
    fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>>;

    /// The SQL of the last statement executed on this connection.
    fn last_query(&self) -> Option<String>;

    /// Drop cached statement results, for one statement or all of them.
    ///
    /// Drivers without a statement cache do nothing.
    fn clear_cache(&self, _sql: Option<&str>) {}
}
