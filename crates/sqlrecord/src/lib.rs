//! sqlrecord - Active Record models over SQL databases.
//!
//! Each [`Record`] is one row of a model's table. Records expose their columns
//! as dynamically typed attributes, track which ones were assigned, persist
//! themselves and traverse declared relationships:
//!
//! - belongs-to and has-one relationships resolve to a single related record,
//!   lazily or eagerly with [`Record::with`]
//! - has-many relationships resolve to a scoped, unexecuted query, optionally
//!   through a pivot table managed with [`Record::add`] and [`Record::remove`]
//! - builder calls (`where_`, `order_by`, `limit`, ...) are recorded on the
//!   record and replayed once a finder or batch operation knows the statement
//!   kind
//! - values are coerced to the type class of their column
//! - [`Versioned`] keeps a history table of saved states
//! - [`Behavior`]s hook into construction, creation and updates
//!
//! # Quick Start
//!
//! ```ignore
//! use sqlrecord::prelude::*;
//! use sqlrecord_sqlite::SqliteConnection;
//! use std::sync::Arc;
//!
//! let conn = Arc::new(SqliteConnection::open_memory()?);
//! let orm = Orm::builder(conn).build();
//! orm.register(
//!     ModelDef::new("user")
//!         .has_many("roles", RelationOptions::new().through("roles_users"))
//!         .rule("username", Rule::NotEmpty),
//! );
//! orm.register(ModelDef::new("role"));
//!
//! let mut user = orm.factory("user")?;
//! user.set("username", "alice")?;
//! user.save()?;
//!
//! let login = orm.factory_with("role", Lookup::filter([("name", "login")]))?;
//! user.add("roles", &login, &[])?;
//!
//! let roles = user.get("roles")?.into_query().map(|mut q| q.find_all());
//! ```

pub mod attribute;
pub mod behavior;
pub mod coerce;
pub mod columns;
pub mod inflector;
pub mod model;
pub mod orm;
pub mod pending;
pub mod record;
pub mod relation;
pub mod versioned;

pub use attribute::{Attribute, Schema};
pub use behavior::{Behavior, Event, GuidBehavior, LocalBehavior, TokenBehavior};
pub use columns::{ColumnCache, TableColumns};
pub use inflector::Inflector;
pub use model::{AutoColumn, ModelDef, ModelMeta, Stamp};
pub use orm::{Lookup, Orm, OrmBuilder};
pub use pending::PendingCall;
pub use record::{Property, Record};
pub use relation::{Relation, RelationKind, RelationOptions};
pub use versioned::Versioned;

pub use sqlrecord_core::{
    ColumnMeta, Connection, Dialect, Error, ErrorMessage, HasMany, MessageCatalog,
    ModelErrorKind, Result, Row, Rule, TypeClass, Validation, ValidationError, Value,
};
pub use sqlrecord_query::{Expr, JoinType, Op, OrderDirection, QueryKind};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        Behavior, Connection, Error, Expr, JoinType, Lookup, ModelDef, Op, Orm, OrderDirection,
        Property, Record, RelationOptions, Result, Rule, Stamp, Value, Versioned,
    };
}
