//! Records that keep a history of their saved states.
//!
//! A versioned model has an integer `version` column, and a history table
//! named `<table>_versions` holding the same columns (except the primary key)
//! plus a foreign key back to the row, e.g. `post_id` for posts.

use crate::attribute::Attribute;
use crate::record::Record;
use sqlrecord_core::{Result, Row, Value};
use sqlrecord_query::{Delete, Insert, Logic, Op, Select};
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

const VERSION_COLUMN: &str = "version";

/// A [`Record`] whose saves are also written to its history table.
///
/// ```rust,ignore
/// let mut post = Versioned::new(orm.factory_with("post", 1)?);
/// post.set("body", "second draft")?;
/// post.save()?;
/// post.restore(1)?;
/// ```
#[derive(Debug, Clone)]
pub struct Versioned {
    record: Record,
    last_version: Option<i64>,
}

impl Versioned {
    pub fn new(record: Record) -> Self {
        Self {
            record,
            last_version: None,
        }
    }

    pub fn into_inner(self) -> Record {
        self.record
    }

    /// The last version written by this handle.
    pub fn last_version(&self) -> Option<i64> {
        self.last_version
    }

    fn history_table(&self) -> String {
        format!("{}_versions", self.record.table_name())
    }

    fn history_key(&self) -> String {
        self.record.meta().foreign_key()
    }

    fn current_version(&self) -> i64 {
        self.record
            .object()
            .get(VERSION_COLUMN)
            .and_then(Value::as_i64)
            .unwrap_or(0)
    }

    /// Save the record with the next version number and append the saved
    /// state to the history table.
    pub fn save(&mut self) -> Result<&mut Self> {
        if !self.record.loaded() {
            // Reading a column loads a keyed record
            self.record.column(VERSION_COLUMN)?;
        }
        let version = 1 + self.last_version.unwrap_or_else(|| self.current_version());
        self.record.set(VERSION_COLUMN, version)?;
        self.record.save()?;
        self.last_version = Some(version);

        if self.record.saved() {
            let pk = self.record.primary_key().to_string();
            let mut data: Vec<(String, Value)> = self
                .record
                .table_columns()
                .names()
                .filter(|name| *name != pk)
                .map(|name| {
                    let value = self.record.object().get(name).cloned().unwrap_or(Value::Null);
                    (name.to_string(), value)
                })
                .collect();
            data.push((self.history_key(), self.record.pk()));

            let conn = Arc::clone(self.record.orm().connection());
            let (sql, params) = Insert::new(self.history_table())
                .values(data)
                .build(conn.dialect());
            tracing::debug!(
                model = %self.record.object_name(),
                version,
                sql = %sql,
                "Saving version"
            );
            conn.insert(&sql, &params)?;
        }
        Ok(self)
    }

    /// The history row of `version`, if any.
    fn snapshot(&self, version: i64) -> Result<Option<Row>> {
        let conn = Arc::clone(self.record.orm().connection());
        let (sql, params) = Select::new()
            .from(self.history_table(), None)
            .filter(Logic::And, self.history_key(), Op::Eq, self.record.pk())
            .filter(Logic::And, VERSION_COLUMN, Op::Eq, Value::Int(version))
            .limit(1)
            .build(conn.dialect());
        conn.query_one(&sql, &params)
    }

    /// Load the version before the one currently shown, without saving it.
    pub fn previous(&mut self) -> Result<&mut Self> {
        if !self.record.loaded() {
            return Ok(self);
        }
        let shown = self.current_version();
        if self.last_version.is_none() {
            self.last_version = Some(shown);
        }

        if let Some(row) = self.snapshot(shown - 1)? {
            let pk = self.record.primary_key().to_string();
            let key = self.history_key();
            let values = row
                .into_pairs()
                .into_iter()
                .filter(|(name, _)| *name != pk && *name != key)
                .collect();
            self.record.load_values(values)?;
        }
        Ok(self)
    }

    /// Copy the state saved as `version` into the record and save it as a
    /// new version.
    pub fn restore(&mut self, version: i64) -> Result<&mut Self> {
        if !self.record.loaded() {
            return Ok(self);
        }
        let Some(row) = self.snapshot(version)? else {
            return Ok(self);
        };

        let pk = self.record.primary_key().to_string();
        let key = self.history_key();
        let current = self.current_version();
        for (name, value) in row.into_pairs() {
            if name == pk || name == key {
                continue;
            }
            if self.record.attribute(&name) != Some(Attribute::Column) {
                continue;
            }
            let value = if name == VERSION_COLUMN {
                Value::Int(current)
            } else {
                value
            };
            self.record.set(&name, value)?;
        }
        self.save()
    }

    /// Delete the row and its whole history.
    pub fn delete(&mut self) -> Result<&mut Self> {
        let pk = self.record.pk();
        self.record.delete()?;
        if !pk.is_empty_key() {
            let conn = Arc::clone(self.record.orm().connection());
            let (sql, params) = Delete::new(self.history_table())
                .filter(Logic::And, self.history_key(), Op::Eq, pk)
                .build(conn.dialect());
            tracing::debug!(model = %self.record.object_name(), sql = %sql, "Deleting history");
            conn.execute(&sql, &params)?;
        }
        self.last_version = None;
        Ok(self)
    }
}

impl Deref for Versioned {
    type Target = Record;

    fn deref(&self) -> &Record {
        &self.record
    }
}

impl DerefMut for Versioned {
    fn deref_mut(&mut self) -> &mut Record {
        &mut self.record
    }
}
