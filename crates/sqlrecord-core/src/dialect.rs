//! SQL dialect differences: placeholders and identifier quoting.

use serde::{Deserialize, Serialize};

/// SQL dialect for generating database-specific SQL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Dialect {
    /// PostgreSQL dialect (uses $1, $2 placeholders)
    Postgres,
    /// SQLite dialect (uses ?1, ?2 placeholders)
    #[default]
    Sqlite,
    /// MySQL dialect (uses ? placeholders)
    Mysql,
}

impl Dialect {
    /// Generate a placeholder for the given parameter index (1-based).
    pub fn placeholder(self, index: usize) -> String {
        match self {
            Dialect::Postgres => format!("${index}"),
            Dialect::Sqlite => format!("?{index}"),
            Dialect::Mysql => "?".to_string(),
        }
    }

    /// Quote an identifier for this dialect.
    ///
    /// Properly escapes embedded quote characters by doubling them:
    /// - For Postgres/SQLite: `"` becomes `""`
    /// - For MySQL: `` ` `` becomes ``` `` ```
    pub fn quote_identifier(self, name: &str) -> String {
        match self {
            Dialect::Postgres | Dialect::Sqlite => {
                let escaped = name.replace('"', "\"\"");
                format!("\"{}\"", escaped)
            }
            Dialect::Mysql => {
                let escaped = name.replace('`', "``");
                format!("`{}`", escaped)
            }
        }
    }

    /// Quote a possibly table-qualified column reference.
    ///
    /// `users.id` becomes `"users"."id"`, `users.*` becomes `"users".*`,
    /// and a bare `*` is left alone. A column whose name already contains
    /// parentheses (an SQL expression such as `COUNT(*)`) is emitted as-is.
    pub fn quote_column(self, column: &str) -> String {
        if column == "*" || column.contains('(') {
            return column.to_string();
        }
        match column.rsplit_once('.') {
            Some((table, "*")) => format!("{}.*", self.quote_identifier(table)),
            Some((table, name)) => format!(
                "{}.{}",
                self.quote_identifier(table),
                self.quote_identifier(name)
            ),
            None => self.quote_identifier(column),
        }
    }
}
