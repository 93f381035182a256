//! Model declarations.
//!
//! A [`ModelDef`] is the builder an application uses to describe a model:
//! table naming, keys, relationships, validation and behaviors. Registering
//! it with an [`Orm`](crate::Orm) resolves every default once, producing the
//! immutable [`ModelMeta`] shared by all records of the model.

use crate::behavior::Behavior;
use crate::columns::TableColumns;
use crate::inflector::Inflector;
use crate::relation::{Relation, RelationKind, RelationOptions, resolve_defaults};
use chrono::{Local, Utc};
use sqlrecord_core::{
    Callback, ColumnMeta, ConfigError, Error, Filter, MessageCatalog, Result, Rule, Validation,
    Value,
};
use sqlrecord_query::OrderDirection;
use std::collections::BTreeMap;
use std::fmt::{self, Write};
use std::sync::Arc;

/// How an automatically stamped column is filled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stamp {
    /// Seconds since the Unix epoch, as an integer
    Timestamp,
    /// Local time rendered with a `chrono` format pattern
    Format(String),
}

impl Stamp {
    /// The stamp value for the current time.
    pub fn now(&self) -> Result<Value> {
        match self {
            Stamp::Timestamp => Ok(Value::Int(Utc::now().timestamp())),
            Stamp::Format(pattern) => {
                let mut out = String::new();
                write!(out, "{}", Local::now().format(pattern)).map_err(|_| {
                    Error::Config(ConfigError {
                        message: format!("invalid timestamp format: {pattern}"),
                        source: None,
                    })
                })?;
                Ok(Value::Text(out))
            }
        }
    }
}

/// A column filled in on create or update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AutoColumn {
    pub column: String,
    pub stamp: Stamp,
}

/// Declaration of a model.
///
/// # Example
///
/// ```rust,ignore
/// let user = ModelDef::new("user")
///     .has_many("roles", RelationOptions::new().through("roles_users"))
///     .has_many("user_tokens", RelationOptions::new().model("user_token"))
///     .created_column("created", Stamp::Timestamp)
///     .rule("username", Rule::NotEmpty)
///     .rule("username", Rule::MaxLength(32));
/// orm.register(user);
/// ```
pub struct ModelDef {
    name: String,
    table_name: Option<String>,
    table_names_plural: bool,
    primary_key: String,
    primary_val: String,
    foreign_key_suffix: String,
    sorting: Option<Vec<(String, OrderDirection)>>,
    ignored_columns: Vec<String>,
    table_columns: Option<Vec<ColumnMeta>>,
    created_column: Option<AutoColumn>,
    updated_column: Option<AutoColumn>,
    load_with: Vec<String>,
    relations: Vec<(String, RelationKind, RelationOptions)>,
    rules: Vec<(String, Rule)>,
    filters: Vec<(Option<String>, Filter)>,
    labels: Vec<(String, String)>,
    callbacks: Vec<(String, Callback)>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

impl ModelDef {
    /// Start a declaration for the model `name`.
    ///
    /// Model names are case-insensitive and stored lowercase.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
            table_name: None,
            table_names_plural: true,
            primary_key: "id".to_string(),
            primary_val: "name".to_string(),
            foreign_key_suffix: "_id".to_string(),
            sorting: None,
            ignored_columns: Vec::new(),
            table_columns: None,
            created_column: None,
            updated_column: None,
            load_with: Vec::new(),
            relations: Vec::new(),
            rules: Vec::new(),
            filters: Vec::new(),
            labels: Vec::new(),
            callbacks: Vec::new(),
            behaviors: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Use an explicit table name instead of deriving it from the model name.
    pub fn table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Whether derived table names are plural (the default).
    pub fn table_names_plural(mut self, plural: bool) -> Self {
        self.table_names_plural = plural;
        self
    }

    pub fn primary_key(mut self, column: impl Into<String>) -> Self {
        self.primary_key = column.into();
        self
    }

    /// The column holding a human readable name of the record.
    pub fn primary_val(mut self, column: impl Into<String>) -> Self {
        self.primary_val = column.into();
        self
    }

    pub fn foreign_key_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.foreign_key_suffix = suffix.into();
        self
    }

    /// Default ordering of finders that set no ordering of their own.
    pub fn sorting<I, C>(mut self, sorting: I) -> Self
    where
        I: IntoIterator<Item = (C, OrderDirection)>,
        C: Into<String>,
    {
        self.sorting = Some(sorting.into_iter().map(|(c, d)| (c.into(), d)).collect());
        self
    }

    /// Columns stored verbatim on the record and never persisted.
    pub fn ignored_columns<I, C>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<String>,
    {
        self.ignored_columns
            .extend(columns.into_iter().map(Into::into));
        self
    }

    /// Declare the table columns instead of reading them from the database.
    pub fn table_columns(mut self, columns: Vec<ColumnMeta>) -> Self {
        self.table_columns = Some(columns);
        self
    }

    /// Stamp `column` when a record is created.
    pub fn created_column(mut self, column: impl Into<String>, stamp: Stamp) -> Self {
        self.created_column = Some(AutoColumn {
            column: column.into(),
            stamp,
        });
        self
    }

    /// Stamp `column` whenever a record is updated.
    pub fn updated_column(mut self, column: impl Into<String>, stamp: Stamp) -> Self {
        self.updated_column = Some(AutoColumn {
            column: column.into(),
            stamp,
        });
        self
    }

    /// One-to-one paths joined by every finder.
    pub fn load_with<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<String>,
    {
        self.load_with.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn belongs_to(self, alias: impl Into<String>, options: RelationOptions) -> Self {
        self.relation(alias, RelationKind::BelongsTo, options)
    }

    pub fn has_one(self, alias: impl Into<String>, options: RelationOptions) -> Self {
        self.relation(alias, RelationKind::HasOne, options)
    }

    pub fn has_many(self, alias: impl Into<String>, options: RelationOptions) -> Self {
        self.relation(alias, RelationKind::HasMany, options)
    }

    fn relation(
        mut self,
        alias: impl Into<String>,
        kind: RelationKind,
        options: RelationOptions,
    ) -> Self {
        self.relations.push((alias.into(), kind, options));
        self
    }

    pub fn rule(mut self, field: impl Into<String>, rule: Rule) -> Self {
        self.rules.push((field.into(), rule));
        self
    }

    pub fn rules<I>(mut self, field: &str, rules: I) -> Self
    where
        I: IntoIterator<Item = Rule>,
    {
        self.rules
            .extend(rules.into_iter().map(|r| (field.to_string(), r)));
        self
    }

    pub fn filter<F>(mut self, field: impl Into<String>, filter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.filters.push((Some(field.into()), Arc::new(filter)));
        self
    }

    /// Filter applied to every field.
    pub fn filter_all<F>(mut self, filter: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.filters.push((None, Arc::new(filter)));
        self
    }

    pub fn label(mut self, field: impl Into<String>, label: impl Into<String>) -> Self {
        self.labels.push((field.into(), label.into()));
        self
    }

    pub fn callback<F>(mut self, field: impl Into<String>, callback: F) -> Self
    where
        F: Fn(&mut Validation, &str) + Send + Sync + 'static,
    {
        self.callbacks.push((field.into(), Arc::new(callback)));
        self
    }

    /// Attach a behavior. Behaviors run in the order they were attached.
    pub fn behavior(mut self, behavior: impl Behavior + 'static) -> Self {
        self.behaviors.push(Arc::new(behavior));
        self
    }

    /// Resolve names and relationship defaults.
    pub fn resolve(self, inflector: &Inflector) -> ModelMeta {
        let plural = inflector.plural(&self.name);
        let table_name = self.table_name.unwrap_or_else(|| {
            if self.table_names_plural {
                plural.clone()
            } else {
                self.name.clone()
            }
        });
        let sorting = self
            .sorting
            .unwrap_or_else(|| vec![(self.primary_key.clone(), OrderDirection::Asc)]);
        let relations = self
            .relations
            .iter()
            .map(|(alias, kind, options)| {
                let relation = resolve_defaults(
                    *kind,
                    alias,
                    options,
                    &self.name,
                    &self.foreign_key_suffix,
                    inflector,
                );
                (alias.clone(), relation)
            })
            .collect();

        ModelMeta {
            name: self.name,
            plural,
            table_name,
            primary_key: self.primary_key,
            primary_val: self.primary_val,
            foreign_key_suffix: self.foreign_key_suffix,
            sorting,
            ignored_columns: self.ignored_columns,
            table_columns: self.table_columns,
            created_column: self.created_column,
            updated_column: self.updated_column,
            load_with: self.load_with,
            relations,
            rules: self.rules,
            filters: self.filters,
            labels: self.labels,
            callbacks: self.callbacks,
            behaviors: self.behaviors,
        }
    }
}

/// A registered model with every default resolved.
pub struct ModelMeta {
    name: String,
    plural: String,
    table_name: String,
    primary_key: String,
    primary_val: String,
    foreign_key_suffix: String,
    sorting: Vec<(String, OrderDirection)>,
    ignored_columns: Vec<String>,
    table_columns: Option<Vec<ColumnMeta>>,
    created_column: Option<AutoColumn>,
    updated_column: Option<AutoColumn>,
    load_with: Vec<String>,
    relations: BTreeMap<String, Relation>,
    rules: Vec<(String, Rule)>,
    filters: Vec<(Option<String>, Filter)>,
    labels: Vec<(String, String)>,
    callbacks: Vec<(String, Callback)>,
    behaviors: Vec<Arc<dyn Behavior>>,
}

impl ModelMeta {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn plural(&self) -> &str {
        &self.plural
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn primary_val(&self) -> &str {
        &self.primary_val
    }

    pub fn foreign_key_suffix(&self) -> &str {
        &self.foreign_key_suffix
    }

    /// The foreign key other tables use to reference this model.
    pub fn foreign_key(&self) -> String {
        format!("{}{}", self.name, self.foreign_key_suffix)
    }

    pub fn sorting(&self) -> &[(String, OrderDirection)] {
        &self.sorting
    }

    pub fn ignored_columns(&self) -> &[String] {
        &self.ignored_columns
    }

    /// Columns declared on the model, if it does not use introspection.
    pub fn declared_columns(&self) -> Option<&[ColumnMeta]> {
        self.table_columns.as_deref()
    }

    pub fn created_column(&self) -> Option<&AutoColumn> {
        self.created_column.as_ref()
    }

    pub fn updated_column(&self) -> Option<&AutoColumn> {
        self.updated_column.as_ref()
    }

    pub fn load_with(&self) -> &[String] {
        &self.load_with
    }

    pub fn relations(&self) -> &BTreeMap<String, Relation> {
        &self.relations
    }

    pub fn relation(&self, alias: &str) -> Option<&Relation> {
        self.relations.get(alias)
    }

    pub fn behaviors(&self) -> &[Arc<dyn Behavior>] {
        &self.behaviors
    }

    /// A validation over `data` carrying the declared rules, filters,
    /// labels and callbacks. Labels default to the column names.
    pub fn validation(
        &self,
        data: impl IntoIterator<Item = (String, Value)>,
        columns: &TableColumns,
        catalog: Arc<MessageCatalog>,
    ) -> Validation {
        let mut validation = Validation::new(data).with_catalog(catalog);
        for (field, rule) in &self.rules {
            validation.rule(field.as_str(), rule.clone());
        }
        for (field, filter) in &self.filters {
            match field {
                Some(field) => validation.filter(field.as_str(), Arc::clone(filter)),
                None => validation.filter_all(Arc::clone(filter)),
            };
        }
        for column in columns.names() {
            validation.label(column, column);
        }
        for (field, label) in &self.labels {
            validation.label(field.as_str(), label.as_str());
        }
        for (field, callback) in &self.callbacks {
            validation.callback(field.as_str(), Arc::clone(callback));
        }
        validation
    }
}

impl fmt::Debug for ModelMeta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelMeta")
            .field("name", &self.name)
            .field("table_name", &self.table_name)
            .field("primary_key", &self.primary_key)
            .field("relations", &self.relations)
            .field("behaviors", &self.behaviors.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_name_defaults() {
        let inflector = Inflector::new();
        assert_eq!(ModelDef::new("Role").resolve(&inflector).table_name(), "roles");
        assert_eq!(
            ModelDef::new("role")
                .table_names_plural(false)
                .resolve(&inflector)
                .table_name(),
            "role"
        );
        assert_eq!(
            ModelDef::new("role")
                .table_name("acl_roles")
                .resolve(&inflector)
                .table_name(),
            "acl_roles"
        );
    }

    #[test]
    fn resolved_defaults() {
        let meta = ModelDef::new("user")
            .has_many("roles", RelationOptions::new().through("roles_users"))
            .has_one("profile", RelationOptions::new())
            .resolve(&Inflector::new());

        assert_eq!(meta.plural(), "users");
        assert_eq!(meta.primary_key(), "id");
        assert_eq!(meta.foreign_key(), "user_id");
        assert_eq!(meta.sorting(), [("id".to_string(), OrderDirection::Asc)]);
        assert_eq!(
            meta.relation("roles").and_then(Relation::pivot),
            Some(("roles_users", "role_id"))
        );
        assert_eq!(
            meta.relation("profile").map(Relation::foreign_key),
            Some("user_id")
        );
    }

    #[test]
    fn validation_uses_column_labels() {
        let meta = ModelDef::new("role")
            .rule("name", Rule::MinLength(4))
            .label("description", "Description")
            .filter("name", |v| match v {
                Value::Text(s) => Value::Text(s.trim().to_string()),
                other => other,
            })
            .resolve(&Inflector::new());
        let columns = TableColumns::new(vec![
            ColumnMeta::new("name", "VARCHAR(32)", false),
            ColumnMeta::new("description", "TEXT", true),
        ]);

        let mut validation = meta.validation(
            [("name".to_string(), Value::from("  ab  "))],
            &columns,
            Arc::new(MessageCatalog::new()),
        );
        assert!(!validation.check());
        assert_eq!(validation.data().get("name"), Some(&Value::from("ab")));
        assert_eq!(
            validation.errors(Some("models"), true).get("name").map(String::as_str),
            Some("name must be at least 4 characters long")
        );
    }

    #[test]
    fn stamps() {
        assert!(matches!(Stamp::Timestamp.now(), Ok(Value::Int(t)) if t > 1_600_000_000));
        let formatted = Stamp::Format("%Y".to_string()).now().unwrap();
        assert_eq!(formatted.as_str().map(str::len), Some(4));
    }
}
