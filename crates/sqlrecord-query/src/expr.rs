//! Operators, logical connectives and select-list expressions.

use sqlrecord_core::{Dialect, Value};

/// Comparison operator of a condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Op {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Like,
    NotLike,
    In,
    NotIn,
    Is,
    IsNot,
}

impl Op {
    /// Get the SQL representation of this operator.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Op::Eq => "=",
            Op::Ne => "<>",
            Op::Lt => "<",
            Op::Le => "<=",
            Op::Gt => ">",
            Op::Ge => ">=",
            Op::Like => "LIKE",
            Op::NotLike => "NOT LIKE",
            Op::In => "IN",
            Op::NotIn => "NOT IN",
            Op::Is => "IS",
            Op::IsNot => "IS NOT",
        }
    }

    /// Parse an operator as written in SQL (`=`, `!=`, `like`, `not in`, ...).
    pub fn parse(op: &str) -> Option<Self> {
        Some(match op.trim().to_ascii_uppercase().as_str() {
            "=" | "==" => Op::Eq,
            "!=" | "<>" => Op::Ne,
            "<" => Op::Lt,
            "<=" => Op::Le,
            ">" => Op::Gt,
            ">=" => Op::Ge,
            "LIKE" => Op::Like,
            "NOT LIKE" => Op::NotLike,
            "IN" => Op::In,
            "NOT IN" => Op::NotIn,
            "IS" => Op::Is,
            "IS NOT" => Op::IsNot,
            _ => return None,
        })
    }

    /// Render `column op value`, binding the value.
    ///
    /// Comparing to NULL with `=`/`<>` becomes `IS NULL`/`IS NOT NULL`; array
    /// values are bound as a parenthesized list.
    pub(crate) fn render(
        self,
        column: &str,
        value: &Value,
        dialect: Dialect,
        params: &mut Vec<Value>,
    ) -> String {
        let op = match (self, value) {
            (Op::Eq, Value::Null) => Op::Is,
            (Op::Ne, Value::Null) => Op::IsNot,
            (op, _) => op,
        };
        let column = dialect.quote_column(column);
        let value_sql = match value {
            Value::Null => "NULL".to_string(),
            Value::Array(items) => {
                let placeholders: Vec<String> = items
                    .iter()
                    .map(|item| bind(item.clone(), dialect, params))
                    .collect();
                format!("({})", placeholders.join(", "))
            }
            other => bind(other.clone(), dialect, params),
        };
        format!("{column} {} {value_sql}", op.as_str())
    }
}

/// Push a parameter and return its placeholder.
pub(crate) fn bind(value: Value, dialect: Dialect, params: &mut Vec<Value>) -> String {
    params.push(value);
    dialect.placeholder(params.len())
}

/// How a condition or group is joined to the one before it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Logic {
    #[default]
    And,
    Or,
}

impl Logic {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Logic::And => "AND",
            Logic::Or => "OR",
        }
    }
}

/// An item of a select list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    /// A possibly qualified column (`name`, `users.name`, `users.*`)
    Column(String),
    /// SQL emitted verbatim (`COUNT(*)`)
    Raw(String),
}

impl Expr {
    pub fn col(name: impl Into<String>) -> Self {
        Expr::Column(name.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Expr::Raw(sql.into())
    }

    /// `COUNT(*)`
    pub fn count_star() -> Self {
        Expr::Raw("COUNT(*)".to_string())
    }

    pub fn to_sql(&self, dialect: Dialect) -> String {
        match self {
            Expr::Column(name) => dialect.quote_column(name),
            Expr::Raw(sql) => sql.clone(),
        }
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::Column(name.to_string())
    }
}

impl From<String> for Expr {
    fn from(name: String) -> Self {
        Expr::Column(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_comparisons_become_is() {
        let mut params = Vec::new();
        let sql = Op::Eq.render("deleted_at", &Value::Null, Dialect::Sqlite, &mut params);
        assert_eq!(sql, "\"deleted_at\" IS NULL");
        let sql = Op::Ne.render("deleted_at", &Value::Null, Dialect::Sqlite, &mut params);
        assert_eq!(sql, "\"deleted_at\" IS NOT NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn arrays_bind_each_item() {
        let mut params = vec![Value::Int(0)];
        let sql = Op::In.render(
            "roles.id",
            &Value::from(vec![1_i64, 2]),
            Dialect::Sqlite,
            &mut params,
        );
        assert_eq!(sql, "\"roles\".\"id\" IN (?2, ?3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn parses_operators() {
        assert_eq!(Op::parse("!="), Some(Op::Ne));
        assert_eq!(Op::parse("not in"), Some(Op::NotIn));
        assert_eq!(Op::parse("like"), Some(Op::Like));
        assert_eq!(Op::parse("~~"), None);
    }

    #[test]
    fn select_items() {
        assert_eq!(Expr::from("roles.*").to_sql(Dialect::Sqlite), "\"roles\".*");
        assert_eq!(Expr::count_star().to_sql(Dialect::Sqlite), "COUNT(*)");
    }
}
