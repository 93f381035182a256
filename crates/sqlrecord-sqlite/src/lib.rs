//! SQLite driver for sqlrecord.
//!
//! Binds the bundled libsqlite3 and implements the blocking `Connection`
//! trait from sqlrecord-core, so records can load, save and introspect
//! tables through it.
//!
//! # Example
//!
//! ```rust,ignore
//! use sqlrecord_sqlite::SqliteConnection;
//! use sqlrecord_core::{Connection, Value};
//!
//! let conn = SqliteConnection::open_memory()?;
//! conn.execute_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)")?;
//! let id = conn.insert("INSERT INTO users (name) VALUES (?1)", &[Value::from("Alice")])?;
//! let columns = conn.list_columns("users")?;
//! ```
//!
//! # Type Mapping
//!
//! | Value | SQLite Type |
//! |-------|-------------|
//! | `Bool` | INTEGER (0/1) |
//! | `Int` | INTEGER |
//! | `Float` | REAL |
//! | `Text` | TEXT |
//! | `Bytes` | BLOB |
//! | `Null` | NULL |
//! | `Json`, `Array` | TEXT (JSON) |
//!
//! # Thread Safety
//!
//! `SqliteConnection` is both `Send` and `Sync`, using internal mutex
//! synchronization to protect the underlying SQLite handle.

#![allow(unsafe_code)]

pub mod connection;
pub mod ffi;
pub mod types;

pub use connection::{OpenMode, SqliteConfig, SqliteConnection};

/// Re-export the SQLite library version.
pub fn sqlite_version() -> &'static str {
    ffi::version()
}

/// Re-export the SQLite library version number.
pub fn sqlite_version_number() -> i32 {
    ffi::version_number()
}
