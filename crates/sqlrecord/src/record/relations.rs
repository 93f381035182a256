//! Relationship traversal and pivot rows.

use super::Record;
use crate::relation::Relation;
use sqlrecord_core::{ModelErrorKind, Result, Value};
use sqlrecord_query::{Delete, Expr, Insert, JoinType, Logic, Op, Select};
use std::sync::Arc;

impl Record {
    /// The related record of a belongs-to or has-one alias.
    ///
    /// The first access runs one query, or none when the values were
    /// assigned with [`Record::values`] or joined with [`Record::with`]. The
    /// record is cached afterwards, found or not.
    pub fn related(&mut self, alias: &str) -> Result<&mut Record> {
        let record = match self.related.remove(alias) {
            Some(record) => record,
            None => self.resolve_related(alias)?,
        };
        Ok(self.related.entry(alias.to_string()).or_insert(record))
    }

    fn one_to_one(&self, alias: &str) -> Result<Relation> {
        match self.meta.relation(alias) {
            Some(relation) if relation.kind().is_one_to_one() => Ok(relation.clone()),
            Some(relation) => Err(self.model_error(
                ModelErrorKind::InvalidRelation,
                format!("{alias} is a {} relationship", relation.kind().as_str()),
            )),
            None => Err(self.unknown_property(alias)),
        }
    }

    fn resolve_related(&mut self, alias: &str) -> Result<Record> {
        let relation = self.one_to_one(alias)?;
        let mut target = self.orm.factory(relation.model())?;

        if let Some(values) = self.deferred.remove(alias) {
            target.values(
                values
                    .into_iter()
                    .map(|(name, value)| (name, Value::from_json(value))),
            )?;
            return Ok(target);
        }

        match &relation {
            Relation::BelongsTo { foreign_key, .. } => {
                let column = format!("{}.{}", target.table_name(), target.primary_key());
                let key = self.object.get(foreign_key).cloned().unwrap_or(Value::Null);
                target.where_(column, Op::Eq, key);
            }
            Relation::HasOne { foreign_key, .. } | Relation::HasMany { foreign_key, .. } => {
                let column = format!("{}.{foreign_key}", target.table_name());
                target.where_(column, Op::Eq, self.pk());
            }
        }
        target.find()?;
        Ok(target)
    }

    /// The cached related record of `alias`, or a new empty one, without
    /// querying.
    pub(crate) fn related_slot(&mut self, alias: &str) -> Result<&mut Record> {
        let record = match self.related.remove(alias) {
            Some(record) => record,
            None => {
                let relation = self.one_to_one(alias)?;
                self.orm.factory(relation.model())?
            }
        };
        Ok(self.related.entry(alias.to_string()).or_insert(record))
    }

    /// An unexecuted query over the records of a has-many alias, scoped to
    /// this record.
    pub fn has_many(&self, alias: &str) -> Result<Record> {
        let Some(relation) = self.meta.relation(alias) else {
            return Err(self.unknown_property(alias));
        };
        let Relation::HasMany { model, foreign_key, .. } = relation else {
            return Err(self.model_error(
                ModelErrorKind::InvalidRelation,
                format!("{alias} is not a has_many relationship"),
            ));
        };

        let mut target = self.orm.factory(model)?;
        match relation.pivot() {
            Some((through, far_key)) => {
                let target_key = format!("{}.{}", target.table_name(), target.primary_key());
                target
                    .join(through, None, JoinType::Inner)
                    .on(format!("{through}.{far_key}"), Op::Eq, target_key)
                    .where_(format!("{through}.{foreign_key}"), Op::Eq, self.pk());
            }
            None => {
                let column = format!("{}.{foreign_key}", target.table_name());
                target.where_(column, Op::Eq, self.pk());
            }
        }
        Ok(target)
    }

    /// Pivot table, foreign key and far key of a has-many-through alias.
    fn pivot(&self, alias: &str) -> Result<(String, String, String)> {
        let Some(relation) = self.meta.relation(alias) else {
            return Err(self.unknown_property(alias));
        };
        match (relation.foreign_key(), relation.pivot()) {
            (foreign_key, Some((through, far_key))) => Ok((
                through.to_string(),
                foreign_key.to_string(),
                far_key.to_string(),
            )),
            (_, None) => Err(self.model_error(
                ModelErrorKind::InvalidRelation,
                format!("{alias} is not a has_many relationship with a pivot table"),
            )),
        }
    }

    /// Whether the pivot table of `alias` links this record to `model`.
    pub fn has(&self, alias: &str, model: &Record) -> Result<bool> {
        let (through, foreign_key, far_key) = self.pivot(alias)?;
        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = Select::new()
            .column(Expr::count_star(), Some("records_found".to_string()))
            .from(through, None)
            .filter(Logic::And, foreign_key, Op::Eq, self.pk())
            .filter(Logic::And, far_key, Op::Eq, model.pk())
            .build(conn.dialect());
        tracing::debug!(model = %self.meta.name(), alias = alias, sql = %sql, "Checking pivot row");

        let found = conn
            .query_one(&sql, &params)?
            .and_then(|row| row.get_by_name("records_found").and_then(Value::as_i64))
            .unwrap_or(0);
        Ok(found > 0)
    }

    /// Link this record to `model` through the pivot table of `alias`,
    /// storing `extra` pivot columns alongside the keys.
    pub fn add(
        &mut self,
        alias: &str,
        model: &Record,
        extra: &[(&str, Value)],
    ) -> Result<&mut Self> {
        let (through, foreign_key, far_key) = self.pivot(alias)?;
        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = Insert::new(through)
            .value(foreign_key, self.pk())
            .value(far_key, model.pk())
            .values(extra.iter().map(|(column, value)| (*column, value.clone())))
            .build(conn.dialect());
        tracing::debug!(model = %self.meta.name(), alias = alias, sql = %sql, "Adding pivot row");
        conn.insert(&sql, &params)?;
        Ok(self)
    }

    /// Unlink this record from `model` in the pivot table of `alias`.
    pub fn remove(&mut self, alias: &str, model: &Record) -> Result<&mut Self> {
        let (through, foreign_key, far_key) = self.pivot(alias)?;
        let conn = Arc::clone(self.orm.connection());
        let (sql, params) = Delete::new(through)
            .filter(Logic::And, foreign_key, Op::Eq, self.pk())
            .filter(Logic::And, far_key, Op::Eq, model.pk())
            .build(conn.dialect());
        tracing::debug!(model = %self.meta.name(), alias = alias, sql = %sql, "Removing pivot row");
        conn.execute(&sql, &params)?;
        Ok(self)
    }
}
