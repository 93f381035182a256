//! The Active Record.
//!
//! A [`Record`] is one row of a model's table. It holds every declared column
//! (unset columns are null), remembers which columns were assigned since the
//! last load or save, and caches the related records it has traversed.
//!
//! The API is split over several files:
//!
//! - this module: construction and the attribute store (`get`, `set`,
//!   `values`, `as_array`)
//! - `query`: the builder call accumulator, eager joins and finders
//! - `persist`: create, update, delete, counting and validation
//! - `relations`: relationship traversal and pivot rows

mod persist;
mod query;
mod relations;

use crate::attribute::{Attribute, Schema};
use crate::coerce::coerce;
use crate::columns::TableColumns;
use crate::model::ModelMeta;
use crate::orm::{Lookup, Orm};
use crate::pending::PendingCall;
use crate::relation::{Relation, RelationKind};
use sqlrecord_core::{
    Error, ModelError, ModelErrorKind, Result, UnknownPropertyError, Validation, Value,
};
use sqlrecord_query::Op;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// The result of reading an attribute.
#[derive(Debug)]
pub enum Property<'a> {
    /// A column value
    Value(Value),
    /// The related record of a belongs-to or has-one alias
    Record(&'a mut Record),
    /// An unexecuted, scoped query over the records of a has-many alias
    Query(Record),
}

impl<'a> Property<'a> {
    pub fn into_value(self) -> Option<Value> {
        match self {
            Property::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn into_record(self) -> Option<&'a mut Record> {
        match self {
            Property::Record(record) => Some(record),
            _ => None,
        }
    }

    pub fn into_query(self) -> Option<Record> {
        match self {
            Property::Query(query) => Some(query),
            _ => None,
        }
    }
}

/// One row of a model's table.
#[derive(Clone)]
pub struct Record {
    orm: Orm,
    meta: Arc<ModelMeta>,
    schema: Arc<Schema>,
    object: BTreeMap<String, Value>,
    changed: BTreeSet<String>,
    related: BTreeMap<String, Record>,
    deferred: BTreeMap<String, serde_json::Map<String, serde_json::Value>>,
    loaded: bool,
    saved: bool,
    pending: Vec<PendingCall>,
    applied: BTreeSet<&'static str>,
    with_applied: BTreeSet<String>,
    reset_next: bool,
    validation: Option<Validation>,
}

impl Record {
    /// Construct a record, running the model's behaviors and then `lookup`.
    ///
    /// Behaviors run in declaration order; construction stops early when one
    /// of them returns `false` or leaves the record loaded.
    pub(crate) fn new(orm: Orm, meta: Arc<ModelMeta>, lookup: Option<Lookup>) -> Result<Self> {
        let schema = orm.schema(&meta)?;
        let mut record = Self::blank(orm, meta, schema);

        let behaviors = record.meta.behaviors().to_vec();
        for behavior in &behaviors {
            if !behavior.on_construct(&mut record, lookup.as_ref())? || record.loaded {
                return Ok(record);
            }
        }

        if let Some(lookup) = &lookup {
            record.load_lookup(lookup)?;
        }
        Ok(record)
    }

    /// A record with every column null, without running behaviors.
    pub(crate) fn blank(orm: Orm, meta: Arc<ModelMeta>, schema: Arc<Schema>) -> Self {
        let object = schema
            .columns()
            .names()
            .map(|name| (name.to_string(), Value::Null))
            .collect();
        Self {
            orm,
            meta,
            schema,
            object,
            changed: BTreeSet::new(),
            related: BTreeMap::new(),
            deferred: BTreeMap::new(),
            loaded: false,
            saved: false,
            pending: Vec::new(),
            applied: BTreeSet::new(),
            with_applied: BTreeSet::new(),
            reset_next: true,
            validation: None,
        }
    }

    /// Select this record's row by `lookup`.
    ///
    /// A key only sets the primary key; the row is loaded the first time an
    /// attribute is read. Filters load the row immediately.
    pub fn load_lookup(&mut self, lookup: &Lookup) -> Result<&mut Self> {
        match lookup {
            Lookup::Key(key) => {
                let pk = self.meta.primary_key().to_string();
                let key = coerce(key.clone(), self.schema.columns().get(&pk));
                self.object.insert(pk, key);
                self.saved = true;
                Ok(self)
            }
            Lookup::Where(filters) => {
                for (column, value) in filters {
                    self.where_(column.clone(), Op::Eq, value.clone());
                }
                self.find()
            }
        }
    }

    /// Load the row of a keyed record that has not been loaded yet.
    fn load_if_keyed(&mut self) -> Result<()> {
        if self.loaded || self.empty_pk() || self.changed.contains(self.meta.primary_key()) {
            return Ok(());
        }
        let pk = self.pk();
        self.find_by_pk(pk)?;
        Ok(())
    }

    fn unknown_property(&self, name: &str) -> Error {
        Error::UnknownProperty(UnknownPropertyError {
            property: name.to_string(),
            model: self.meta.name().to_string(),
        })
    }

    fn model_error(&self, kind: ModelErrorKind, message: impl Into<String>) -> Error {
        Error::Model(ModelError::new(kind, self.meta.name(), message))
    }

    /// Read an attribute: a column, a related record or a has-many query.
    ///
    /// Reading a column of a keyed record that was not loaded yet loads it
    /// first. A belongs-to or has-one alias is resolved by at most one query;
    /// the result is cached even when no row was found.
    pub fn get(&mut self, name: &str) -> Result<Property<'_>> {
        match self.schema.resolve(name) {
            Some(Attribute::Column) => {
                self.load_if_keyed()?;
                Ok(Property::Value(
                    self.object.get(name).cloned().unwrap_or(Value::Null),
                ))
            }
            Some(Attribute::Relation(RelationKind::HasMany)) => {
                self.load_if_keyed()?;
                Ok(Property::Query(self.has_many(name)?))
            }
            Some(Attribute::Relation(_)) => {
                self.load_if_keyed()?;
                Ok(Property::Record(self.related(name)?))
            }
            Some(Attribute::Ignored) | None => match self.object.get(name) {
                Some(value) => Ok(Property::Value(value.clone())),
                None => Err(self.unknown_property(name)),
            },
        }
    }

    /// Read a column or ignored-column value.
    pub fn column(&mut self, name: &str) -> Result<Value> {
        match self.schema.resolve(name) {
            Some(Attribute::Relation(_)) => Err(self.unknown_property(name)),
            _ => {
                let value = self.get(name)?.into_value();
                value.ok_or_else(|| self.unknown_property(name))
            }
        }
    }

    /// Assign an attribute.
    ///
    /// Columns are coerced to their type class and marked changed. Ignored
    /// columns are stored verbatim and never marked. Records are assigned to
    /// belongs-to aliases with [`Record::set_related`].
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> Result<&mut Self> {
        let value = value.into();
        match self.schema.resolve(name) {
            Some(Attribute::Ignored) => {
                self.object.insert(name.to_string(), value);
            }
            Some(Attribute::Column) => {
                let value = coerce(value, self.schema.columns().get(name));
                self.object.insert(name.to_string(), value);
                self.changed.insert(name.to_string());
                self.saved = false;
                self.validation = None;

                // A new foreign key invalidates the cached parent
                let stale: Vec<String> = self
                    .meta
                    .relations()
                    .iter()
                    .filter(|(_, r)| r.kind() == RelationKind::BelongsTo && r.foreign_key() == name)
                    .map(|(alias, _)| alias.clone())
                    .collect();
                for alias in stale {
                    self.related.remove(&alias);
                    self.deferred.remove(&alias);
                }
            }
            Some(Attribute::Relation(RelationKind::BelongsTo)) => {
                return Err(self.model_error(
                    ModelErrorKind::ExpectedRecord,
                    format!("{name} must be assigned a record"),
                ));
            }
            Some(Attribute::Relation(_)) | None => return Err(self.unknown_property(name)),
        }
        Ok(self)
    }

    /// Assign `record` as the parent of a belongs-to alias.
    ///
    /// The parent's primary key is copied into the foreign key column, which
    /// is the only column marked changed.
    pub fn set_related(&mut self, alias: &str, record: Record) -> Result<&mut Self> {
        let foreign_key = match self.meta.relation(alias) {
            Some(Relation::BelongsTo { foreign_key, .. }) => foreign_key.clone(),
            Some(_) => {
                return Err(self.model_error(
                    ModelErrorKind::InvalidRelation,
                    format!("{alias} is not a belongs_to relationship"),
                ));
            }
            None => return Err(self.unknown_property(alias)),
        };

        let key = coerce(record.pk(), self.schema.columns().get(&foreign_key));
        self.object.insert(foreign_key.clone(), key);
        self.changed.insert(foreign_key);
        self.saved = false;
        self.validation = None;
        self.deferred.remove(alias);
        self.related.insert(alias.to_string(), record);
        Ok(self)
    }

    /// Assign many attributes at once.
    ///
    /// Column and ignored-column keys are assigned with [`Record::set`]. A
    /// JSON object under a belongs-to or has-one alias is kept and turned
    /// into the related record when the alias is first read, without a
    /// query. Any other key is skipped.
    pub fn values<I, K>(&mut self, values: I) -> Result<&mut Self>
    where
        I: IntoIterator<Item = (K, Value)>,
        K: AsRef<str>,
    {
        for (key, value) in values {
            let key = key.as_ref();
            match (self.schema.resolve(key), value) {
                (Some(Attribute::Column | Attribute::Ignored), value) => {
                    self.set(key, value)?;
                }
                (
                    Some(Attribute::Relation(kind)),
                    Value::Json(serde_json::Value::Object(values)),
                ) if kind.is_one_to_one() => {
                    self.related.remove(key);
                    self.deferred.insert(key.to_string(), values);
                }
                _ => {}
            }
        }
        Ok(self)
    }

    /// Store values read from the database.
    ///
    /// `alias:column` keys belong to related records joined with
    /// [`Record::with`] and are handed down one path segment at a time.
    /// Columns changed locally keep their local value.
    pub(crate) fn load_values(&mut self, values: Vec<(String, Value)>) -> Result<()> {
        let pk = self.meta.primary_key();
        if let Some((_, key)) = values.iter().find(|(name, _)| name == pk) {
            self.loaded = !key.is_null();
            self.saved = self.loaded && self.changed.is_empty();
        }

        let mut nested: BTreeMap<String, Vec<(String, Value)>> = BTreeMap::new();
        for (name, value) in values {
            match name.split_once(':') {
                Some((alias, rest)) => nested
                    .entry(alias.to_string())
                    .or_default()
                    .push((rest.to_string(), value)),
                None => {
                    if !self.changed.contains(&name) {
                        let value = coerce(value, self.schema.columns().get(&name));
                        self.object.insert(name, value);
                    }
                }
            }
        }

        for (alias, values) in nested {
            self.related_slot(&alias)?.load_values(values)?;
        }
        Ok(())
    }

    /// Every column value and every resolved related record, recursively.
    pub fn as_array(&mut self) -> Result<serde_json::Map<String, serde_json::Value>> {
        self.load_if_keyed()?;
        let deferred: Vec<String> = self.deferred.keys().cloned().collect();
        for alias in deferred {
            self.related(&alias)?;
        }

        let mut object: serde_json::Map<String, serde_json::Value> = self
            .object
            .iter()
            .map(|(name, value)| (name.clone(), value.to_json()))
            .collect();
        for (alias, record) in &mut self.related {
            object.insert(alias.clone(), serde_json::Value::Object(record.as_array()?));
        }
        Ok(object)
    }

    /// Reset every column to null and forget changes and related records.
    pub(crate) fn clear_values(&mut self) {
        self.object = self
            .schema
            .columns()
            .names()
            .map(|name| (name.to_string(), Value::Null))
            .collect();
        self.changed.clear();
        self.related.clear();
        self.deferred.clear();
        self.validation = None;
        self.loaded = false;
        self.saved = false;
    }

    /// Turn this record back into an empty, unsaved one.
    pub fn clear(&mut self) -> &mut Self {
        self.clear_values();
        self.reset(true);
        self
    }

    /// The primary key value.
    pub fn pk(&self) -> Value {
        self.object
            .get(self.meta.primary_key())
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Whether the primary key is unset (null, zero or empty).
    pub fn empty_pk(&self) -> bool {
        self.pk().is_empty_key()
    }

    pub fn object_name(&self) -> &str {
        self.meta.name()
    }

    pub fn object_plural(&self) -> &str {
        self.meta.plural()
    }

    pub fn table_name(&self) -> &str {
        self.meta.table_name()
    }

    pub fn primary_key(&self) -> &str {
        self.meta.primary_key()
    }

    pub fn primary_val(&self) -> &str {
        self.meta.primary_val()
    }

    pub fn table_columns(&self) -> &Arc<TableColumns> {
        self.schema.columns()
    }

    /// What `name` refers to on this record's model.
    pub fn attribute(&self, name: &str) -> Option<Attribute> {
        self.schema.resolve(name)
    }

    /// The stored values, keyed by column name. Never triggers a query.
    pub fn object(&self) -> &BTreeMap<String, Value> {
        &self.object
    }

    pub fn meta(&self) -> &Arc<ModelMeta> {
        &self.meta
    }

    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    /// Whether a row was loaded into this record. Never triggers a query.
    pub fn loaded(&self) -> bool {
        self.loaded
    }

    pub fn saved(&self) -> bool {
        self.saved
    }

    /// Names of the columns assigned since the last load or save.
    pub fn changed(&self) -> &BTreeSet<String> {
        &self.changed
    }

    pub fn relations(&self) -> &BTreeMap<String, Relation> {
        self.meta.relations()
    }

    pub fn load_with(&self) -> &[String] {
        self.meta.load_with()
    }

    /// The validation of the last [`Record::check`], if any.
    pub fn validation(&self) -> Option<&Validation> {
        self.validation.as_ref()
    }
}

impl fmt::Debug for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Record")
            .field("model", &self.meta.name())
            .field("object", &self.object)
            .field("changed", &self.changed)
            .field("related", &self.related.keys().collect::<Vec<_>>())
            .field("loaded", &self.loaded)
            .field("saved", &self.saved)
            .field("pending", &self.pending.len())
            .finish_non_exhaustive()
    }
}
