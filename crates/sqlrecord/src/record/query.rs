//! Builder call accumulation, eager joins and finders.

use super::Record;
use crate::attribute::Attribute;
use crate::pending::PendingCall;
use crate::relation::Relation;
use sqlrecord_core::{ColumnMeta, Result, Row, Value};
use sqlrecord_query::{Expr, JoinType, Logic, Op, OrderDirection, Query, QueryKind};
use std::sync::Arc;

impl Record {
    fn push(&mut self, call: PendingCall) -> &mut Self {
        self.pending.push(call);
        self
    }

    fn push_where(&mut self, logic: Logic, column: String, op: Op, value: Value) -> &mut Self {
        self.push(PendingCall::Where {
            logic,
            column,
            op,
            value,
        })
    }

    fn push_having(&mut self, logic: Logic, column: String, op: Op, value: Value) -> &mut Self {
        self.push(PendingCall::Having {
            logic,
            column,
            op,
            value,
        })
    }

    /// Alias of [`Record::and_where`].
    pub fn where_(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(Logic::And, column.into(), op, value.into())
    }

    pub fn and_where(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(Logic::And, column.into(), op, value.into())
    }

    pub fn or_where(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_where(Logic::Or, column.into(), op, value.into())
    }

    /// Alias of [`Record::and_where_open`].
    pub fn where_open(&mut self) -> &mut Self {
        self.push(PendingCall::WhereOpen(Logic::And))
    }

    pub fn and_where_open(&mut self) -> &mut Self {
        self.push(PendingCall::WhereOpen(Logic::And))
    }

    pub fn or_where_open(&mut self) -> &mut Self {
        self.push(PendingCall::WhereOpen(Logic::Or))
    }

    pub fn where_close(&mut self) -> &mut Self {
        self.push(PendingCall::WhereClose)
    }

    pub fn and_where_close(&mut self) -> &mut Self {
        self.push(PendingCall::WhereClose)
    }

    pub fn or_where_close(&mut self) -> &mut Self {
        self.push(PendingCall::WhereClose)
    }

    pub fn distinct(&mut self, distinct: bool) -> &mut Self {
        self.push(PendingCall::Distinct(distinct))
    }

    /// Add a select-list item, optionally aliased.
    pub fn select(&mut self, column: impl Into<Expr>, alias: Option<&str>) -> &mut Self {
        self.push(PendingCall::Select {
            column: column.into(),
            alias: alias.map(str::to_string),
        })
    }

    pub fn from(&mut self, table: impl Into<String>, alias: Option<&str>) -> &mut Self {
        self.push(PendingCall::From {
            table: table.into(),
            alias: alias.map(str::to_string),
        })
    }

    pub fn join(
        &mut self,
        table: impl Into<String>,
        alias: Option<&str>,
        join_type: JoinType,
    ) -> &mut Self {
        self.push(PendingCall::Join {
            table: table.into(),
            alias: alias.map(str::to_string),
            join_type,
        })
    }

    /// Add an ON comparison to the last join.
    pub fn on(&mut self, left: impl Into<String>, op: Op, right: impl Into<String>) -> &mut Self {
        self.push(PendingCall::On {
            left: left.into(),
            op,
            right: right.into(),
        })
    }

    pub fn group_by<I, C>(&mut self, columns: I) -> &mut Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.push(PendingCall::GroupBy(
            columns.into_iter().map(Into::into).collect(),
        ))
    }

    /// Alias of [`Record::and_having`].
    pub fn having(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_having(Logic::And, column.into(), op, value.into())
    }

    pub fn and_having(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_having(Logic::And, column.into(), op, value.into())
    }

    pub fn or_having(
        &mut self,
        column: impl Into<String>,
        op: Op,
        value: impl Into<Value>,
    ) -> &mut Self {
        self.push_having(Logic::Or, column.into(), op, value.into())
    }

    pub fn having_open(&mut self) -> &mut Self {
        self.push(PendingCall::HavingOpen(Logic::And))
    }

    pub fn and_having_open(&mut self) -> &mut Self {
        self.push(PendingCall::HavingOpen(Logic::And))
    }

    pub fn or_having_open(&mut self) -> &mut Self {
        self.push(PendingCall::HavingOpen(Logic::Or))
    }

    pub fn having_close(&mut self) -> &mut Self {
        self.push(PendingCall::HavingClose)
    }

    pub fn and_having_close(&mut self) -> &mut Self {
        self.push(PendingCall::HavingClose)
    }

    pub fn or_having_close(&mut self) -> &mut Self {
        self.push(PendingCall::HavingClose)
    }

    pub fn order_by(
        &mut self,
        column: impl Into<String>,
        direction: Option<OrderDirection>,
    ) -> &mut Self {
        self.push(PendingCall::OrderBy {
            column: column.into(),
            direction,
        })
    }

    pub fn limit(&mut self, n: u64) -> &mut Self {
        self.push(PendingCall::Limit(n))
    }

    pub fn offset(&mut self, n: u64) -> &mut Self {
        self.push(PendingCall::Offset(n))
    }

    /// Builder calls recorded since the last reset.
    pub fn pending(&self) -> &[PendingCall] {
        &self.pending
    }

    /// Replay the recorded calls onto a new builder of `kind`.
    ///
    /// UPDATE and DELETE builders target this record's table. Replaying a
    /// SELECT-only call onto them fails with a builder error.
    pub fn build(&mut self, kind: QueryKind) -> Result<Query> {
        tracing::trace!(
            model = %self.meta.name(),
            kind = kind.as_str(),
            calls = self.pending.len(),
            "Replaying builder calls"
        );
        let mut query = Query::new(kind, self.meta.table_name());
        for call in &self.pending {
            self.applied.insert(call.name());
            query = call.clone().apply(query)?;
        }
        Ok(query)
    }

    /// Forget the recorded calls.
    ///
    /// `reset(false)` keeps them for one more terminal operation: the next
    /// reset only clears when both it and the one before asked to.
    pub fn reset(&mut self, next: bool) -> &mut Self {
        if next && self.reset_next {
            self.pending.clear();
            self.applied.clear();
            self.with_applied.clear();
        }
        self.reset_next = next;
        self
    }

    /// Join a one-to-one relationship path (`"author"`, `"author:profile"`)
    /// into the next finder.
    ///
    /// Each joined column is selected as `path:column`, and the finder loads
    /// those values into the related records. Parent paths are joined first.
    /// Paths already joined, and paths that do not name one-to-one
    /// relationships, are ignored.
    pub fn with(&mut self, path: &str) -> Result<&mut Self> {
        if self.with_applied.contains(path) {
            return Ok(self);
        }

        let mut target = Arc::clone(&self.meta);
        let mut step = None;
        for alias in path.split(':') {
            let Some(relation) = target
                .relation(alias)
                .filter(|r| r.kind().is_one_to_one())
                .cloned()
            else {
                return Ok(self);
            };
            let parent_pk = target.primary_key().to_string();
            target = self.orm.model(relation.model())?;
            step = Some((relation, parent_pk));
        }
        let Some((relation, parent_pk)) = step else {
            return Ok(self);
        };

        let parent_path = match path.rsplit_once(':') {
            Some((parent, _)) => {
                if !self.with_applied.contains(parent) {
                    self.with(parent)?;
                }
                parent.to_string()
            }
            None => self.meta.table_name().to_string(),
        };
        self.with_applied.insert(path.to_string());

        let schema = self.orm.schema(&target)?;
        for column in schema.columns().names() {
            if schema.resolve(column) == Some(Attribute::Column) {
                self.select(format!("{path}.{column}"), Some(&format!("{path}:{column}")));
            }
        }

        self.join(target.table_name(), Some(path), JoinType::Left);
        match relation {
            Relation::BelongsTo { foreign_key, .. } => self.on(
                format!("{path}.{}", target.primary_key()),
                Op::Eq,
                format!("{parent_path}.{foreign_key}"),
            ),
            Relation::HasOne { foreign_key, .. } | Relation::HasMany { foreign_key, .. } => self.on(
                format!("{parent_path}.{parent_pk}"),
                Op::Eq,
                format!("{path}.{foreign_key}"),
            ),
        };
        Ok(self)
    }

    fn apply_load_with(&mut self) -> Result<()> {
        let paths = self.meta.load_with().to_vec();
        for path in &paths {
            self.with(path)?;
        }
        Ok(())
    }

    /// Complete a replayed SELECT and run it, then reset the accumulator.
    fn load_result(&mut self, query: Query, multiple: bool) -> Result<Vec<Row>> {
        let table = self.meta.table_name().to_string();
        let mut query = query.from(table.clone(), None)?;
        if !multiple {
            query = query.limit(1)?;
        }
        query = query.column(Expr::col(format!("{table}.*")), None)?;

        if !self.applied.contains("order_by") {
            for (column, direction) in self.meta.sorting() {
                let column = if column.contains('.') {
                    column.clone()
                } else {
                    format!("{table}.{column}")
                };
                query = query.order_by(column, Some(*direction))?;
            }
        }

        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = query.build(conn.dialect());
        tracing::debug!(model = %self.meta.name(), sql = %sql, params = ?params, "Loading records");
        let rows = conn.query(&sql, &params);
        self.reset(true);
        rows
    }

    /// Load the first row matching the recorded conditions.
    ///
    /// When nothing matches the record is cleared; not finding a row is not
    /// an error.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.meta.name()))]
    pub fn find(&mut self) -> Result<&mut Self> {
        self.apply_load_with()?;
        let query = self.build(QueryKind::Select)?;
        let rows = self.load_result(query, false)?;
        match rows.into_iter().next() {
            Some(row) => self.load_values(row.into_pairs())?,
            None => self.clear_values(),
        }
        Ok(self)
    }

    /// Load the row whose primary key is `id`.
    pub fn find_by_pk(&mut self, id: impl Into<Value>) -> Result<&mut Self> {
        let column = format!("{}.{}", self.meta.table_name(), self.meta.primary_key());
        self.where_(column, Op::Eq, id);
        self.find()
    }

    /// Load every row matching the recorded conditions.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.meta.name()))]
    pub fn find_all(&mut self) -> Result<Vec<Record>> {
        self.apply_load_with()?;
        let query = self.build(QueryKind::Select)?;
        let rows = self.load_result(query, true)?;
        rows.into_iter()
            .map(|row| {
                let mut record = Record::blank(
                    self.orm.clone(),
                    Arc::clone(&self.meta),
                    Arc::clone(&self.schema),
                );
                record.load_values(row.into_pairs())?;
                Ok(record)
            })
            .collect()
    }

    /// Load the row again, discarding local changes.
    pub fn reload(&mut self) -> Result<&mut Self> {
        if !self.loaded {
            return Ok(self.clear());
        }
        let pk = self.pk();
        self.clear();
        self.find_by_pk(pk)
    }

    /// Refresh the column metadata, from the database when `force` is set.
    pub fn reload_columns(&mut self, force: bool) -> Result<&mut Self> {
        if force {
            self.orm.column_cache().invalidate(self.meta.name());
        }
        let schema = self.orm.schema(&self.meta)?;
        for column in schema.columns().names() {
            self.object
                .entry(column.to_string())
                .or_insert(Value::Null);
        }
        self.schema = schema;
        Ok(self)
    }

    /// Columns of this record's table, straight from the database.
    pub fn list_columns(&self) -> Result<Vec<ColumnMeta>> {
        self.orm.connection().list_columns(self.meta.table_name())
    }

    /// Drop the connection's statement cache and every cached column list.
    pub fn clear_cache(&mut self, sql: Option<&str>) -> &mut Self {
        self.orm.connection().clear_cache(sql);
        self.orm.column_cache().invalidate_all();
        self
    }

    /// SQL of the last statement run on the connection.
    pub fn last_query(&self) -> Option<String> {
        self.orm.connection().last_query()
    }
}
