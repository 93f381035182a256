//! Core types and traits for sqlrecord.
//!
//! This crate provides the foundational pieces shared by the query builder,
//! the drivers and the record engine:
//!
//! - `Value` for dynamically typed column values and parameters
//! - `Row` for associative result rows
//! - `ColumnMeta` / `TypeClass` for column metadata reported by a driver
//! - `Dialect` for placeholder and identifier quoting differences
//! - `Connection` trait for the database collaborator
//! - `Validation` for rule-based attribute validation
//! - `Error` including the aggregated `ValidationError`

pub mod connection;
pub mod dialect;
pub mod error;
pub mod row;
pub mod types;
pub mod validate;
pub mod value;

pub use connection::Connection;
pub use dialect::Dialect;
pub use error::{
    ConfigError, ConnectionError, ConnectionErrorKind, Error, ErrorMessage, ErrorNode, HasMany,
    ModelError, ModelErrorKind, QueryError, QueryErrorKind, Result, TypeError,
    UnknownPropertyError, ValidationError,
};
pub use row::{ColumnInfo, Row};
pub use types::{ColumnMeta, TypeClass};
pub use validate::{Callback, FieldError, Filter, MessageCatalog, Rule, Validation};
pub use value::Value;
