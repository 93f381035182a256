//! Builder calls recorded on a record before the statement kind is known.

use sqlrecord_core::{Result, Value};
use sqlrecord_query::{Expr, JoinType, Logic, Op, OrderDirection, Query};

/// One recorded builder call.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingCall {
    Where {
        logic: Logic,
        column: String,
        op: Op,
        value: Value,
    },
    WhereOpen(Logic),
    WhereClose,
    Distinct(bool),
    Select {
        column: Expr,
        alias: Option<String>,
    },
    From {
        table: String,
        alias: Option<String>,
    },
    Join {
        table: String,
        alias: Option<String>,
        join_type: JoinType,
    },
    On {
        left: String,
        op: Op,
        right: String,
    },
    GroupBy(Vec<String>),
    Having {
        logic: Logic,
        column: String,
        op: Op,
        value: Value,
    },
    HavingOpen(Logic),
    HavingClose,
    OrderBy {
        column: String,
        direction: Option<OrderDirection>,
    },
    Limit(u64),
    Offset(u64),
}

impl PendingCall {
    /// Name of the builder method this call replays as.
    pub const fn name(&self) -> &'static str {
        match self {
            PendingCall::Where { .. } => "where",
            PendingCall::WhereOpen(_) => "where_open",
            PendingCall::WhereClose => "where_close",
            PendingCall::Distinct(_) => "distinct",
            PendingCall::Select { .. } => "select",
            PendingCall::From { .. } => "from",
            PendingCall::Join { .. } => "join",
            PendingCall::On { .. } => "on",
            PendingCall::GroupBy(_) => "group_by",
            PendingCall::Having { .. } => "having",
            PendingCall::HavingOpen(_) => "having_open",
            PendingCall::HavingClose => "having_close",
            PendingCall::OrderBy { .. } => "order_by",
            PendingCall::Limit(_) => "limit",
            PendingCall::Offset(_) => "offset",
        }
    }

    /// Replay the call onto `query`.
    pub fn apply(self, query: Query) -> Result<Query> {
        match self {
            PendingCall::Where {
                logic,
                column,
                op,
                value,
            } => Ok(query.filter(logic, column, op, value)),
            PendingCall::WhereOpen(logic) => Ok(query.filter_open(logic)),
            PendingCall::WhereClose => Ok(query.filter_close()),
            PendingCall::Distinct(distinct) => query.distinct(distinct),
            PendingCall::Select { column, alias } => query.column(column, alias),
            PendingCall::From { table, alias } => query.from(table, alias),
            PendingCall::Join {
                table,
                alias,
                join_type,
            } => query.join(table, alias, join_type),
            PendingCall::On { left, op, right } => query.on(left, op, right),
            PendingCall::GroupBy(columns) => query.group_by(columns),
            PendingCall::Having {
                logic,
                column,
                op,
                value,
            } => query.having(logic, column, op, value),
            PendingCall::HavingOpen(logic) => query.having_open(logic),
            PendingCall::HavingClose => query.having_close(),
            PendingCall::OrderBy { column, direction } => query.order_by(column, direction),
            PendingCall::Limit(n) => query.limit(n),
            PendingCall::Offset(n) => query.offset(n),
        }
    }
}
