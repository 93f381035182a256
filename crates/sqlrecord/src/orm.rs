//! The shared context records are created from.

use crate::attribute::Schema;
use crate::columns::ColumnCache;
use crate::inflector::Inflector;
use crate::model::{ModelDef, ModelMeta};
use crate::record::Record;
use sqlrecord_core::{Connection, Error, MessageCatalog, ModelError, ModelErrorKind, Result, Value};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};

/// How a newly constructed record selects its row.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    /// Primary key value. The row is loaded on first attribute access.
    Key(Value),
    /// Column equality filters, loaded immediately.
    Where(Vec<(String, Value)>),
}

impl Lookup {
    pub fn key(value: impl Into<Value>) -> Self {
        Lookup::Key(value.into())
    }

    pub fn filter<I, C, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (C, V)>,
        C: Into<String>,
        V: Into<Value>,
    {
        Lookup::Where(
            pairs
                .into_iter()
                .map(|(c, v)| (c.into(), v.into()))
                .collect(),
        )
    }
}

impl From<Value> for Lookup {
    fn from(value: Value) -> Self {
        Lookup::Key(value)
    }
}

impl From<i64> for Lookup {
    fn from(value: i64) -> Self {
        Lookup::Key(Value::Int(value))
    }
}

impl From<i32> for Lookup {
    fn from(value: i32) -> Self {
        Lookup::Key(Value::Int(i64::from(value)))
    }
}

impl From<&str> for Lookup {
    fn from(value: &str) -> Self {
        Lookup::Key(Value::from(value))
    }
}

impl From<String> for Lookup {
    fn from(value: String) -> Self {
        Lookup::Key(Value::Text(value))
    }
}

/// Registry of models over one connection.
///
/// Cloning an `Orm` yields another handle to the same registry, column cache
/// and connection.
///
/// # Example
///
/// ```rust,ignore
/// let conn = Arc::new(SqliteConnection::open_memory()?);
/// let orm = Orm::builder(conn).build();
/// orm.register(ModelDef::new("role"));
///
/// let mut role = orm.factory("role")?;
/// role.set("name", "admin")?;
/// role.save()?;
/// ```
#[derive(Clone)]
pub struct Orm {
    inner: Arc<OrmInner>,
}

struct OrmInner {
    conn: Arc<dyn Connection>,
    columns: ColumnCache,
    inflector: Inflector,
    messages: Arc<MessageCatalog>,
    models: RwLock<HashMap<String, Arc<ModelMeta>>>,
    schemas: RwLock<HashMap<String, Arc<Schema>>>,
}

impl Orm {
    pub fn builder(conn: Arc<dyn Connection>) -> OrmBuilder {
        OrmBuilder {
            conn,
            columns: None,
            inflector: None,
            messages: None,
        }
    }

    /// Register a model, replacing any previous model of the same name.
    pub fn register(&self, def: ModelDef) -> Arc<ModelMeta> {
        let meta = Arc::new(def.resolve(&self.inner.inflector));
        let name = meta.name().to_string();
        tracing::debug!(model = %name, table = %meta.table_name(), "registering model");

        let mut models = self.inner.models.write().unwrap_or_else(|e| e.into_inner());
        models.insert(name.clone(), Arc::clone(&meta));
        drop(models);

        let mut schemas = self.inner.schemas.write().unwrap_or_else(|e| e.into_inner());
        schemas.remove(&name);
        meta
    }

    /// A registered model by name.
    pub fn model(&self, name: &str) -> Result<Arc<ModelMeta>> {
        let name = name.to_lowercase();
        let models = self.inner.models.read().unwrap_or_else(|e| e.into_inner());
        models.get(&name).cloned().ok_or_else(|| {
            Error::Model(ModelError::new(
                ModelErrorKind::NotRegistered,
                name.clone(),
                "model is not registered",
            ))
        })
    }

    /// The attribute schema of `meta`, loading its columns on first use.
    pub fn schema(&self, meta: &ModelMeta) -> Result<Arc<Schema>> {
        let columns = self.inner.columns.get_or_load(meta.name(), || {
            match meta.declared_columns() {
                Some(columns) => Ok(columns.to_vec()),
                None => self.inner.conn.list_columns(meta.table_name()),
            }
        })?;

        {
            let schemas = self.inner.schemas.read().unwrap_or_else(|e| e.into_inner());
            if let Some(schema) = schemas.get(meta.name()) {
                if Arc::ptr_eq(schema.columns(), &columns) {
                    return Ok(Arc::clone(schema));
                }
            }
        }

        let schema = Arc::new(Schema::new(meta, columns));
        let mut schemas = self.inner.schemas.write().unwrap_or_else(|e| e.into_inner());
        schemas.insert(meta.name().to_string(), Arc::clone(&schema));
        Ok(schema)
    }

    /// A new, empty record of the model `name`.
    pub fn factory(&self, name: &str) -> Result<Record> {
        let meta = self.model(name)?;
        Record::new(self.clone(), meta, None)
    }

    /// A new record of the model `name`, selecting a row by `lookup`.
    ///
    /// ```rust,ignore
    /// let user = orm.factory_with("user", 5)?;
    /// let admin = orm.factory_with("role", Lookup::filter([("name", "admin")]))?;
    /// ```
    pub fn factory_with(&self, name: &str, lookup: impl Into<Lookup>) -> Result<Record> {
        let meta = self.model(name)?;
        Record::new(self.clone(), meta, Some(lookup.into()))
    }

    pub fn connection(&self) -> &Arc<dyn Connection> {
        &self.inner.conn
    }

    pub fn column_cache(&self) -> &ColumnCache {
        &self.inner.columns
    }

    pub fn inflector(&self) -> &Inflector {
        &self.inner.inflector
    }

    pub fn messages(&self) -> &Arc<MessageCatalog> {
        &self.inner.messages
    }
}

impl fmt::Debug for Orm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let models = self.inner.models.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<&String> = models.keys().collect();
        names.sort();
        f.debug_struct("Orm")
            .field("dialect", &self.inner.conn.dialect())
            .field("models", &names)
            .field("columns", &self.inner.columns)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Orm`].
pub struct OrmBuilder {
    conn: Arc<dyn Connection>,
    columns: Option<ColumnCache>,
    inflector: Option<Inflector>,
    messages: Option<Arc<MessageCatalog>>,
}

impl OrmBuilder {
    /// Share a column cache with other `Orm` instances.
    pub fn column_cache(mut self, cache: ColumnCache) -> Self {
        self.columns = Some(cache);
        self
    }

    pub fn inflector(mut self, inflector: Inflector) -> Self {
        self.inflector = Some(inflector);
        self
    }

    /// Messages used to render validation errors.
    pub fn messages(mut self, messages: MessageCatalog) -> Self {
        self.messages = Some(Arc::new(messages));
        self
    }

    pub fn build(self) -> Orm {
        Orm {
            inner: Arc::new(OrmInner {
                conn: self.conn,
                columns: self.columns.unwrap_or_default(),
                inflector: self.inflector.unwrap_or_default(),
                messages: self.messages.unwrap_or_default(),
                models: RwLock::new(HashMap::new()),
                schemas: RwLock::new(HashMap::new()),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlrecord_core::{ColumnMeta, Dialect, Row};
    use std::sync::Mutex;

    /// Connection that only answers `list_columns`.
    #[derive(Default)]
    struct Introspect {
        calls: Mutex<Vec<String>>,
    }

    impl Connection for Introspect {
        fn dialect(&self) -> Dialect {
            Dialect::Sqlite
        }

        fn query(&self, _sql: &str, _params: &[Value]) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }

        fn execute(&self, _sql: &str, _params: &[Value]) -> Result<u64> {
            Ok(0)
        }

        fn insert(&self, _sql: &str, _params: &[Value]) -> Result<i64> {
            Ok(1)
        }

        fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
            self.calls.lock().unwrap().push(table.to_string());
            Ok(vec![
                ColumnMeta::new("id", "INTEGER", false).primary_key(true),
                ColumnMeta::new("name", "VARCHAR(32)", false),
            ])
        }

        fn last_query(&self) -> Option<String> {
            None
        }
    }

    #[test]
    fn unknown_models_are_errors() {
        let orm = Orm::builder(Arc::new(Introspect::default())).build();
        let err = orm.factory("ghost").unwrap_err();
        assert_eq!(err.model_kind(), Some(ModelErrorKind::NotRegistered));
    }

    #[test]
    fn schema_is_loaded_once() {
        let conn = Arc::new(Introspect::default());
        let orm = Orm::builder(conn.clone()).build();
        let meta = orm.register(ModelDef::new("Role"));

        let first = orm.schema(&meta).unwrap();
        let second = orm.schema(&meta).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(*conn.calls.lock().unwrap(), ["roles"]);

        orm.column_cache().invalidate("role");
        let third = orm.schema(&meta).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(conn.calls.lock().unwrap().len(), 2);
    }

    #[test]
    fn declared_columns_skip_introspection() {
        let conn = Arc::new(Introspect::default());
        let orm = Orm::builder(conn.clone()).build();
        let meta = orm.register(
            ModelDef::new("tag").table_columns(vec![ColumnMeta::new("id", "INTEGER", false)]),
        );
        let schema = orm.schema(&meta).unwrap();
        assert_eq!(schema.columns().len(), 1);
        assert!(conn.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn lookups() {
        assert_eq!(Lookup::from(5), Lookup::Key(Value::Int(5)));
        assert_eq!(
            Lookup::filter([("name", "admin")]),
            Lookup::Where(vec![("name".to_string(), Value::from("admin"))])
        );
    }
}
