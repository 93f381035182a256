//! JOIN clause types.

use sqlrecord_core::Dialect;

use crate::expr::Op;

/// A JOIN clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Join {
    /// Type of join
    pub join_type: JoinType,
    /// Table to join
    pub table: String,
    /// Optional table alias
    pub alias: Option<String>,
    /// ON column comparisons, joined with AND
    pub on: Vec<(String, Op, String)>,
}

/// Types of SQL joins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinType {
    #[default]
    Inner,
    Left,
    Right,
    Full,
}

impl JoinType {
    /// Get the SQL keyword for this join type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            JoinType::Inner => "INNER JOIN",
            JoinType::Left => "LEFT JOIN",
            JoinType::Right => "RIGHT JOIN",
            JoinType::Full => "FULL JOIN",
        }
    }
}

impl Join {
    pub fn new(join_type: JoinType, table: impl Into<String>, alias: Option<String>) -> Self {
        Self {
            join_type,
            table: table.into(),
            alias,
            on: Vec::new(),
        }
    }

    /// Create an INNER JOIN.
    pub fn inner(table: impl Into<String>) -> Self {
        Self::new(JoinType::Inner, table, None)
    }

    /// Create a LEFT JOIN.
    pub fn left(table: impl Into<String>) -> Self {
        Self::new(JoinType::Left, table, None)
    }

    /// Set the alias the joined table is referred to by.
    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    /// Add an ON comparison between two columns.
    pub fn on(mut self, left: impl Into<String>, op: Op, right: impl Into<String>) -> Self {
        self.on.push((left.into(), op, right.into()));
        self
    }

    /// The name other clauses use to refer to the joined table.
    pub fn reference(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.table)
    }

    /// Generate SQL for this JOIN, with a leading space.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = format!(
            " {} {}",
            self.join_type.as_str(),
            dialect.quote_identifier(&self.table)
        );
        if let Some(alias) = &self.alias {
            sql.push_str(" AS ");
            sql.push_str(&dialect.quote_identifier(alias));
        }
        if !self.on.is_empty() {
            let predicates: Vec<String> = self
                .on
                .iter()
                .map(|(left, op, right)| {
                    format!(
                        "{} {} {}",
                        dialect.quote_column(left),
                        op.as_str(),
                        dialect.quote_column(right)
                    )
                })
                .collect();
            sql.push_str(" ON ");
            sql.push_str(&predicates.join(" AND "));
        }
        sql
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_with_alias_and_on() {
        let join = Join::left("profiles")
            .alias("author:profile")
            .on("author:profile.user_id", Op::Eq, "author.id");
        assert_eq!(
            join.to_sql(Dialect::Sqlite),
            " LEFT JOIN \"profiles\" AS \"author:profile\" ON \"author:profile\".\"user_id\" = \"author\".\"id\""
        );
        assert_eq!(join.reference(), "author:profile");
    }

    #[test]
    fn join_multiple_predicates() {
        let join = Join::inner("roles_users")
            .on("roles_users.role_id", Op::Eq, "roles.id")
            .on("roles_users.kind", Op::Eq, "roles.kind");
        assert_eq!(
            join.to_sql(Dialect::Mysql),
            " INNER JOIN `roles_users` ON `roles_users`.`role_id` = `roles`.`id` AND `roles_users`.`kind` = `roles`.`kind`"
        );
    }
}
