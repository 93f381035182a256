//! Saving, deleting, counting and validating records.

use super::Record;
use crate::attribute::Attribute;
use crate::coerce::coerce;
use crate::pending::PendingCall;
use sqlrecord_core::{
    Error, ModelErrorKind, QueryError, Result, ValidationError, Value,
};
use sqlrecord_query::{Delete, Expr, Insert, Logic, Op, Query, QueryKind, Update};
use std::sync::Arc;

impl Record {
    /// Values of the changed columns, in column order.
    fn changed_values(&self) -> Vec<(String, Value)> {
        self.schema
            .columns()
            .names()
            .filter(|name| self.changed.contains(*name))
            .filter(|name| self.schema.resolve(name) == Some(Attribute::Column))
            .map(|name| {
                let value = self.object.get(name).cloned().unwrap_or(Value::Null);
                (name.to_string(), value)
            })
            .collect()
    }

    fn stamp(&mut self, column: &str, value: Value) {
        let value = coerce(value, self.schema.columns().get(column));
        self.object.insert(column.to_string(), value);
        self.changed.insert(column.to_string());
    }

    /// Insert this record as a new row.
    ///
    /// Every declared column is written, except a primary key that is still
    /// empty; the generated key is stored afterwards.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.meta.name()))]
    pub fn create(&mut self) -> Result<&mut Self> {
        if !self.empty_pk() && !self.changed.contains(self.meta.primary_key()) {
            return Err(self.model_error(
                ModelErrorKind::AlreadyLoaded,
                "cannot create a record that is already saved",
            ));
        }

        let behaviors = self.meta.behaviors().to_vec();
        for behavior in &behaviors {
            behavior.on_create(self)?;
        }
        if let Some(auto) = self.meta.created_column().cloned() {
            let now = auto.stamp.now()?;
            self.stamp(&auto.column, now);
        }

        let pk = self.meta.primary_key().to_string();
        let empty_pk = self.empty_pk();
        let values: Vec<(String, Value)> = self
            .schema
            .columns()
            .names()
            .filter(|name| self.schema.resolve(name) == Some(Attribute::Column))
            .filter(|name| !(empty_pk && *name == pk))
            .map(|name| {
                let value = self.object.get(name).cloned().unwrap_or(Value::Null);
                (name.to_string(), value)
            })
            .collect();

        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = Insert::new(self.meta.table_name())
            .values(values)
            .build(conn.dialect());
        tracing::debug!(model = %self.meta.name(), sql = %sql, params = ?params, "Creating record");
        let id = conn.insert(&sql, &params)?;

        if empty_pk {
            let id = coerce(Value::Int(id), self.schema.columns().get(&pk));
            self.object.insert(pk, id);
        }
        self.changed.clear();
        self.loaded = true;
        self.saved = true;
        Ok(self)
    }

    /// Write the changed columns of a saved record.
    ///
    /// Nothing is sent to the database when no column changed.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.meta.name()))]
    pub fn update(&mut self) -> Result<&mut Self> {
        if self.empty_pk() {
            return Err(self.model_error(
                ModelErrorKind::NotLoaded,
                "cannot update a record that has not been saved",
            ));
        }

        let behaviors = self.meta.behaviors().to_vec();
        for behavior in &behaviors {
            behavior.on_update(self)?;
        }
        if self.changed.is_empty() {
            return Ok(self);
        }
        if let Some(auto) = self.meta.updated_column().cloned() {
            let now = auto.stamp.now()?;
            self.stamp(&auto.column, now);
        }

        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = Update::new(self.meta.table_name())
            .set_all(self.changed_values())
            .filter(Logic::And, self.meta.primary_key(), Op::Eq, self.pk())
            .build(conn.dialect());
        tracing::debug!(model = %self.meta.name(), sql = %sql, params = ?params, "Updating record");
        conn.execute(&sql, &params)?;

        // A keyed record stays unloaded until a read fetches its row
        self.changed.clear();
        self.saved = true;
        Ok(self)
    }

    /// Write the changed columns, plus the updated-column stamp, to every
    /// row matching the recorded conditions. This record's own state is left
    /// as it is.
    pub fn update_all(&mut self) -> Result<u64> {
        let query = self.build(QueryKind::Update);
        let mut values = self.changed_values();
        self.reset(true);
        let query = query?;
        if values.is_empty() {
            return Ok(0);
        }
        if let Some(auto) = self.meta.updated_column() {
            let now = coerce(auto.stamp.now()?, self.schema.columns().get(&auto.column));
            values.retain(|(name, _)| *name != auto.column);
            values.push((auto.column.clone(), now));
        }

        let Query::Update(update) = query else {
            return Err(QueryError::builder("expected an UPDATE builder").into());
        };
        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = update.set_all(values).build(conn.dialect());
        tracing::debug!(
            model = %self.meta.name(),
            sql = %sql,
            params = ?params,
            "Updating records"
        );
        conn.execute(&sql, &params)
    }

    /// Create or update, depending on whether the record has a primary key
    /// of its own. Does nothing when no column changed.
    pub fn save(&mut self) -> Result<&mut Self> {
        if self.changed.is_empty() {
            return Ok(self);
        }
        if !self.empty_pk() && !self.changed.contains(self.meta.primary_key()) {
            self.update()
        } else {
            self.create()
        }
    }

    /// Delete this record's row and clear the record.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.meta.name()))]
    pub fn delete(&mut self) -> Result<&mut Self> {
        if !self.empty_pk() {
            let conn = Arc::clone(self.orm.connection());
            let (sql, params) = Delete::new(self.meta.table_name())
                .filter(Logic::And, self.meta.primary_key(), Op::Eq, self.pk())
                .build(conn.dialect());
            tracing::debug!(
                model = %self.meta.name(),
                sql = %sql,
                params = ?params,
                "Deleting record"
            );
            conn.execute(&sql, &params)?;
        }
        Ok(self.clear())
    }

    /// Delete every row matching the recorded conditions, then clear.
    pub fn delete_all(&mut self) -> Result<u64> {
        let query = self.build(QueryKind::Delete)?;
        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = query.build(conn.dialect());
        tracing::debug!(
            model = %self.meta.name(),
            sql = %sql,
            params = ?params,
            "Deleting records"
        );
        let deleted = conn.execute(&sql, &params);
        self.clear();
        deleted
    }

    /// Count the rows matching the recorded conditions.
    ///
    /// Recorded select-list items are left out of the count and survive it,
    /// so they still apply after `reset(false)`.
    #[tracing::instrument(level = "debug", skip(self), fields(model = %self.meta.name()))]
    pub fn count_all(&mut self) -> Result<u64> {
        let (selects, rest): (Vec<PendingCall>, Vec<PendingCall>) = self
            .pending
            .drain(..)
            .partition(|call| matches!(call, PendingCall::Select { .. }));
        self.pending = rest;

        let query = self.build(QueryKind::Select).and_then(|query| {
            query
                .from(self.meta.table_name().to_string(), None)?
                .column(Expr::count_star(), Some("records_found".to_string()))
        });
        self.pending.extend(selects);
        let query = match query {
            Ok(query) => query,
            Err(e) => {
                self.reset(true);
                return Err(e);
            }
        };

        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = query.build(conn.dialect());
        tracing::debug!(
            model = %self.meta.name(),
            sql = %sql,
            params = ?params,
            "Counting records"
        );
        let row = conn.query_one(&sql, &params);
        self.reset(true);

        let found = row?
            .and_then(|row| row.get_by_name("records_found").and_then(Value::as_i64))
            .unwrap_or(0);
        Ok(u64::try_from(found).unwrap_or(0))
    }

    /// Validate the column values with the model's rules.
    ///
    /// On success, values rewritten by filters are stored back without
    /// marking their columns changed.
    pub fn check(&mut self) -> bool {
        let mut validation = self.meta.validation(
            self.object.clone(),
            self.schema.columns(),
            Arc::clone(self.orm.messages()),
        );
        let valid = validation.check();
        if valid {
            for (name, value) in validation.data() {
                self.object.insert(name.clone(), value.clone());
            }
        }
        self.validation = Some(validation);
        valid
    }

    /// Like [`Record::check`], returning the failures as an error.
    pub fn validate(&mut self) -> Result<()> {
        if self.check() {
            return Ok(());
        }
        let validation = self.validation.clone().unwrap_or_default();
        Err(Error::Validation(ValidationError::new(
            self.meta.name(),
            validation,
        )))
    }
}
