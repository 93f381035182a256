//! SQL clause types (WHERE/HAVING condition lists, ORDER BY).

use crate::expr::{Logic, Op};
use sqlrecord_core::{Dialect, Value};

/// One entry of a condition list.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Open a parenthesized group
    Open(Logic),
    /// Close the innermost group
    Close,
    /// `column op value`
    Compare {
        logic: Logic,
        column: String,
        op: Op,
        value: Value,
    },
}

/// An ordered WHERE or HAVING condition list with nested groups.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conditions {
    items: Vec<Condition>,
}

impl Conditions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn items(&self) -> &[Condition] {
        &self.items
    }

    pub fn push(&mut self, logic: Logic, column: impl Into<String>, op: Op, value: Value) {
        self.items.push(Condition::Compare {
            logic,
            column: column.into(),
            op,
            value,
        });
    }

    pub fn open(&mut self, logic: Logic) {
        self.items.push(Condition::Open(logic));
    }

    pub fn close(&mut self) {
        self.items.push(Condition::Close);
    }

    /// Render the list, binding values into `params`.
    ///
    /// The connective of an entry is omitted at the start of the list and
    /// right after an opening parenthesis.
    pub fn build(&self, dialect: Dialect, params: &mut Vec<Value>) -> String {
        let mut sql = String::new();
        let mut after_open = true;

        for item in &self.items {
            match item {
                Condition::Open(logic) => {
                    if !after_open {
                        sql.push(' ');
                        sql.push_str(logic.as_str());
                        sql.push(' ');
                    }
                    sql.push('(');
                    after_open = true;
                }
                Condition::Close => {
                    sql.push(')');
                    after_open = false;
                }
                Condition::Compare {
                    logic,
                    column,
                    op,
                    value,
                } => {
                    if !after_open {
                        sql.push(' ');
                        sql.push_str(logic.as_str());
                        sql.push(' ');
                    }
                    sql.push_str(&op.render(column, value, dialect, params));
                    after_open = false;
                }
            }
        }

        sql
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderDirection {
    #[default]
    Asc,
    Desc,
}

impl OrderDirection {
    /// Parse `asc`/`desc`, case-insensitively.
    pub fn parse(direction: &str) -> Option<Self> {
        match direction.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(OrderDirection::Asc),
            "DESC" => Some(OrderDirection::Desc),
            _ => None,
        }
    }
}

/// ORDER BY clause.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub direction: Option<OrderDirection>,
}

impl OrderBy {
    pub fn new(column: impl Into<String>, direction: Option<OrderDirection>) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }

    pub fn asc(column: impl Into<String>) -> Self {
        Self::new(column, Some(OrderDirection::Asc))
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self::new(column, Some(OrderDirection::Desc))
    }

    /// Generate SQL for this ORDER BY item.
    pub fn to_sql(&self, dialect: Dialect) -> String {
        let mut sql = dialect.quote_column(&self.column);
        match self.direction {
            Some(OrderDirection::Asc) => sql.push_str(" ASC"),
            Some(OrderDirection::Desc) => sql.push_str(" DESC"),
            None => {}
        }
        sql
    }
}
