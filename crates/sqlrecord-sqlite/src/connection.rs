//! The blocking SQLite connection records run their statements on.

#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::borrow_as_ptr)]

use crate::ffi;
use crate::types;
use sqlrecord_core::{
    ColumnInfo, ColumnMeta, Connection, ConnectionError, ConnectionErrorKind, Dialect, Error,
    QueryError, QueryErrorKind, Result, Row, Value,
};
use std::ffi::{CStr, CString, c_int};
use std::ptr;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

const MEMORY: &str = ":memory:";

/// How the database file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OpenMode {
    ReadOnly,
    /// The file must already exist.
    ReadWrite,
    #[default]
    ReadWriteCreate,
}

impl OpenMode {
    fn flags(self) -> c_int {
        let mode = match self {
            OpenMode::ReadOnly => ffi::SQLITE_OPEN_READONLY,
            OpenMode::ReadWrite => ffi::SQLITE_OPEN_READWRITE,
            OpenMode::ReadWriteCreate => ffi::SQLITE_OPEN_READWRITE | ffi::SQLITE_OPEN_CREATE,
        };
        // The handle is serialized by our own mutex.
        mode | ffi::SQLITE_OPEN_NOMUTEX
    }
}

/// Where and how to open a database.
#[derive(Debug, Clone)]
pub struct SqliteConfig {
    pub path: String,
    pub mode: OpenMode,
    /// How long a locked database is retried before `SQLITE_BUSY`. Zero disables retries.
    pub busy_timeout: Duration,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            path: MEMORY.to_string(),
            mode: OpenMode::default(),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteConfig {
    pub fn file(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    pub fn memory() -> Self {
        Self::default()
    }

    pub fn mode(mut self, mode: OpenMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }
}

struct Handle {
    db: *mut ffi::sqlite3,
    last_query: Option<String>,
}

// SAFETY: the raw handle is only used while the connection mutex is held.
unsafe impl Send for Handle {}

/// One SQLite database shared by every record of an [`Orm`](https://docs.rs/sqlrecord).
///
/// Each call prepares, binds, steps and finalizes its statement while holding
/// the connection lock, so the type is `Send + Sync` and is usually kept in an
/// `Arc`.
pub struct SqliteConnection {
    handle: Mutex<Handle>,
    path: String,
}

impl std::fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteConnection {
    #[tracing::instrument(
        level = "debug",
        skip(config),
        fields(path = %config.path, mode = ?config.mode)
    )]
    pub fn open(config: &SqliteConfig) -> Result<Self> {
        let path = CString::new(config.path.as_str())
            .map_err(|_| open_error(format!("path {:?} contains a NUL byte", config.path)))?;

        let mut db: *mut ffi::sqlite3 = ptr::null_mut();
        // SAFETY: path is NUL-terminated and db is a valid out pointer
        let rc = unsafe {
            ffi::sqlite3_open_v2(path.as_ptr(), &mut db, config.mode.flags(), ptr::null())
        };
        if rc != ffi::SQLITE_OK {
            let reason = if db.is_null() {
                ffi::error_string(rc).to_string()
            } else {
                // SAFETY: open_v2 hands back a handle even on failure; it must still be closed
                unsafe {
                    let reason = last_error_message(db);
                    ffi::sqlite3_close_v2(db);
                    reason
                }
            };
            return Err(open_error(format!("cannot open {}: {reason}", config.path)));
        }

        let millis = c_int::try_from(config.busy_timeout.as_millis()).unwrap_or(c_int::MAX);
        if millis > 0 {
            // SAFETY: db was opened above
            unsafe { ffi::sqlite3_busy_timeout(db, millis) };
        }

        tracing::debug!(version = ffi::version(), "sqlite database open");
        Ok(Self {
            handle: Mutex::new(Handle {
                db,
                last_query: None,
            }),
            path: config.path.clone(),
        })
    }

    pub fn open_memory() -> Result<Self> {
        Self::open(&SqliteConfig::memory())
    }

    pub fn open_file(path: impl Into<String>) -> Result<Self> {
        Self::open(&SqliteConfig::file(path))
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn lock(&self) -> MutexGuard<'_, Handle> {
        self.handle.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run one or more `;`-separated statements without parameters.
    ///
    /// Used for schema setup; nothing is returned.
    pub fn execute_raw(&self, sql: &str) -> Result<()> {
        let mut handle = self.lock();
        handle.last_query = Some(sql.to_string());
        let c_sql = CString::new(sql).map_err(|_| nul_error(sql))?;

        let mut message: *mut std::ffi::c_char = ptr::null_mut();
        // SAFETY: the handle is open and c_sql outlives the call
        let rc = unsafe {
            ffi::sqlite3_exec(handle.db, c_sql.as_ptr(), None, ptr::null_mut(), &mut message)
        };
        if rc == ffi::SQLITE_OK {
            return Ok(());
        }

        let text = if message.is_null() {
            ffi::error_string(rc).to_string()
        } else {
            // SAFETY: exec allocated message with sqlite3_malloc; we free it once
            unsafe {
                let text = CStr::from_ptr(message).to_string_lossy().into_owned();
                ffi::sqlite3_free(message.cast());
                text
            }
        };
        Err(query_error(classify(rc, &text), sql, text))
    }

    fn run<T>(
        &self,
        sql: &str,
        params: &[Value],
        f: impl FnOnce(&mut Statement<'_>) -> Result<T>,
    ) -> Result<T> {
        let mut handle = self.lock();
        handle.last_query = Some(sql.to_string());
        let mut stmt = Statement::prepare(handle.db, sql)?;
        stmt.bind(params)?;
        f(&mut stmt)
    }

    fn write(&self, sql: &str, params: &[Value]) -> Result<(u64, i64)> {
        self.run(sql, params, |stmt| {
            while stmt.step()? {}
            // SAFETY: the handle stays locked for the lifetime of stmt
            let (changes, rowid) = unsafe {
                (
                    ffi::sqlite3_changes(stmt.db),
                    ffi::sqlite3_last_insert_rowid(stmt.db),
                )
            };
            tracing::trace!(changes, rowid, "statement done");
            Ok((u64::try_from(changes).unwrap_or(0), rowid))
        })
    }
}

impl Drop for SqliteConnection {
    fn drop(&mut self) {
        let handle = self.handle.get_mut().unwrap_or_else(PoisonError::into_inner);
        if !handle.db.is_null() {
            // SAFETY: every Statement has been finalized by its own Drop
            unsafe { ffi::sqlite3_close_v2(handle.db) };
            handle.db = ptr::null_mut();
        }
    }
}

impl Connection for SqliteConnection {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    #[tracing::instrument(level = "debug", skip(self, params), fields(params = params.len()))]
    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.run(sql, params, |stmt| {
            let columns = Arc::new(ColumnInfo::new(stmt.column_names()));
            let mut rows = Vec::new();
            while stmt.step()? {
                rows.push(Row::with_columns(Arc::clone(&columns), stmt.values()));
            }
            tracing::trace!(rows = rows.len(), "query done");
            Ok(rows)
        })
    }

    #[tracing::instrument(level = "debug", skip(self, params), fields(params = params.len()))]
    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.write(sql, params).map(|(changes, _)| changes)
    }

    #[tracing::instrument(level = "debug", skip(self, params), fields(params = params.len()))]
    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.write(sql, params).map(|(_, rowid)| rowid)
    }

    fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        let sql = format!("PRAGMA table_info({})", Dialect::Sqlite.quote_identifier(table));
        let rows = self.query(&sql, &[])?;
        if rows.is_empty() {
            return Err(query_error(
                QueryErrorKind::NotFound,
                &sql,
                format!("no such table: {table}"),
            ));
        }

        let flag = |row: &Row, name: &str| {
            row.get_by_name(name).and_then(Value::as_i64).unwrap_or(0) != 0
        };
        let text = |row: &Row, name: &str| {
            row.get_by_name(name)
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string()
        };
        Ok(rows
            .iter()
            .map(|row| {
                let default = row
                    .get_by_name("dflt_value")
                    .filter(|v| !v.is_null())
                    .map(ToString::to_string);
                ColumnMeta::new(text(row, "name"), text(row, "type"), !flag(row, "notnull"))
                    .primary_key(flag(row, "pk"))
                    .default_value(default)
            })
            .collect())
    }

    fn last_query(&self) -> Option<String> {
        self.lock().last_query.clone()
    }
}

/// A prepared statement, finalized on drop.
struct Statement<'a> {
    db: *mut ffi::sqlite3,
    raw: *mut ffi::sqlite3_stmt,
    sql: &'a str,
}

impl<'a> Statement<'a> {
    fn prepare(db: *mut ffi::sqlite3, sql: &'a str) -> Result<Self> {
        let c_sql = CString::new(sql).map_err(|_| nul_error(sql))?;
        let len = c_int::try_from(c_sql.as_bytes().len()).map_err(|_| {
            query_error(QueryErrorKind::Syntax, sql, "statement too long".to_string())
        })?;

        let mut raw: *mut ffi::sqlite3_stmt = ptr::null_mut();
        // SAFETY: db is open and c_sql is NUL-terminated with the given length
        let rc = unsafe {
            ffi::sqlite3_prepare_v2(db, c_sql.as_ptr(), len, &mut raw, ptr::null_mut())
        };
        let stmt = Self { db, raw, sql };
        if rc != ffi::SQLITE_OK {
            return Err(stmt.error());
        }
        Ok(stmt)
    }

    fn bind(&mut self, params: &[Value]) -> Result<()> {
        for (slot, value) in (1..).zip(params) {
            // SAFETY: raw is a live statement and slots are 1-based
            let rc = unsafe { types::bind_value(self.raw, slot, value) };
            if rc != ffi::SQLITE_OK {
                let (code, message) = self.failure();
                return Err(query_error(
                    classify(code, &message),
                    self.sql,
                    format!("parameter ?{slot}: {message}"),
                ));
            }
        }
        Ok(())
    }

    /// Advance one row. `false` once the statement is done.
    fn step(&mut self) -> Result<bool> {
        // SAFETY: raw is a live statement
        match unsafe { ffi::sqlite3_step(self.raw) } {
            ffi::SQLITE_ROW => Ok(true),
            ffi::SQLITE_DONE => Ok(false),
            _ => Err(self.error()),
        }
    }

    fn column_count(&self) -> c_int {
        // SAFETY: raw is a live statement
        unsafe { ffi::sqlite3_column_count(self.raw) }
    }

    fn column_names(&self) -> Vec<String> {
        (0..self.column_count())
            .map(|i| {
                // SAFETY: i is below the column count
                unsafe { types::column_name(self.raw, i) }.unwrap_or_else(|| format!("col{i}"))
            })
            .collect()
    }

    /// Values of the current row; only valid right after `step` returned `true`.
    fn values(&self) -> Vec<Value> {
        (0..self.column_count())
            // SAFETY: the statement is positioned on a row and i is in range
            .map(|i| unsafe { types::read_column(self.raw, i) })
            .collect()
    }

    fn failure(&self) -> (c_int, String) {
        // SAFETY: db is open; errcode and errmsg describe the most recent failure
        unsafe { (ffi::sqlite3_errcode(self.db), last_error_message(self.db)) }
    }

    fn error(&self) -> Error {
        let (code, message) = self.failure();
        query_error(classify(code, &message), self.sql, message)
    }
}

impl Drop for Statement<'_> {
    fn drop(&mut self) {
        // SAFETY: finalize accepts a null statement from a failed prepare
        unsafe { ffi::sqlite3_finalize(self.raw) };
    }
}

/// # Safety
/// `db` must be an open connection handle.
unsafe fn last_error_message(db: *mut ffi::sqlite3) -> String {
    // SAFETY: errmsg never returns null for an open handle
    unsafe { CStr::from_ptr(ffi::sqlite3_errmsg(db)).to_string_lossy().into_owned() }
}

/// Map a result code, primary or extended, to an error kind.
fn classify(code: c_int, message: &str) -> QueryErrorKind {
    match code & 0xff {
        ffi::SQLITE_CONSTRAINT => QueryErrorKind::Constraint,
        ffi::SQLITE_BUSY | ffi::SQLITE_LOCKED => QueryErrorKind::Busy,
        ffi::SQLITE_NOTFOUND => QueryErrorKind::NotFound,
        // Syntax errors and unknown tables share SQLITE_ERROR
        ffi::SQLITE_ERROR if message.contains("syntax error") => QueryErrorKind::Syntax,
        _ => QueryErrorKind::Database,
    }
}

fn query_error(kind: QueryErrorKind, sql: &str, message: String) -> Error {
    Error::Query(QueryError {
        kind,
        sql: Some(sql.to_string()),
        message,
        source: None,
    })
}

fn nul_error(sql: &str) -> Error {
    query_error(QueryErrorKind::Syntax, sql, "statement contains a NUL byte".to_string())
}

fn open_error(message: String) -> Error {
    Error::Connection(ConnectionError {
        kind: ConnectionErrorKind::Connect,
        message,
        source: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> SqliteConnection {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE roles (id INTEGER PRIMARY KEY, name VARCHAR(32) NOT NULL UNIQUE, \
             description TEXT, score REAL DEFAULT 0)",
        )
        .unwrap();
        conn
    }

    #[test]
    fn opens_in_memory() {
        let conn = SqliteConnection::open_memory().unwrap();
        assert_eq!(conn.path(), MEMORY);
        assert_eq!(conn.dialect(), Dialect::Sqlite);
        assert_eq!(conn.last_query(), None);
    }

    #[test]
    fn read_only_files_must_exist() {
        let config = SqliteConfig::file("/nonexistent/dir/roles.db").mode(OpenMode::ReadOnly);
        let err = SqliteConnection::open(&config).unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
        assert!(err.to_string().contains("roles.db"));
    }

    #[test]
    fn raw_batches_run_every_statement() {
        let conn = roles();
        conn.execute_raw(
            "INSERT INTO roles (name) VALUES ('login'); INSERT INTO roles (name) VALUES ('admin')",
        )
        .unwrap();
        let rows = conn.query("SELECT name FROM roles ORDER BY id", &[]).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1].get_named::<String>("name").unwrap(), "admin");
    }

    #[test]
    fn insert_returns_the_rowid_and_execute_the_change_count() {
        let conn = roles();
        let login = conn
            .insert("INSERT INTO roles (name) VALUES (?1)", &[Value::from("login")])
            .unwrap();
        let admin = conn
            .insert("INSERT INTO roles (name) VALUES (?1)", &[Value::from("admin")])
            .unwrap();
        assert_eq!((login, admin), (1, 2));

        let changed = conn
            .execute(
                "UPDATE roles SET score = ?1 WHERE id >= ?2",
                &[Value::Float(2.5), Value::Int(1)],
            )
            .unwrap();
        assert_eq!(changed, 2);
        assert_eq!(
            conn.last_query().as_deref(),
            Some("UPDATE roles SET score = ?1 WHERE id >= ?2")
        );
    }

    #[test]
    fn values_survive_the_round_trip() {
        let conn = SqliteConnection::open_memory().unwrap();
        conn.execute_raw(
            "CREATE TABLE cells (b INTEGER, i INTEGER, f REAL, t TEXT, x BLOB, j TEXT, n TEXT)",
        )
        .unwrap();
        conn.execute(
            "INSERT INTO cells VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            &[
                Value::Bool(true),
                Value::Int(-7),
                Value::Float(1.5),
                Value::from("hello"),
                Value::Bytes(vec![0, 255]),
                Value::Json(serde_json::json!({"a": 1})),
                Value::Null,
            ],
        )
        .unwrap();

        let rows = conn.query("SELECT * FROM cells", &[]).unwrap();
        let values: Vec<Value> = rows[0].iter().map(|(_, v)| v.clone()).collect();
        assert_eq!(
            values,
            [
                Value::Int(1),
                Value::Int(-7),
                Value::Float(1.5),
                Value::from("hello"),
                Value::Bytes(vec![0, 255]),
                Value::from("{\"a\":1}"),
                Value::Null,
            ]
        );
    }

    #[test]
    fn list_columns_reads_table_info() {
        let conn = roles();
        let columns = conn.list_columns("roles").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["id", "name", "description", "score"]);
        assert!(columns[0].primary_key);
        assert!(!columns[1].nullable);
        assert!(columns[2].nullable);
        assert_eq!(columns[1].data_type, "VARCHAR(32)");
        assert_eq!(columns[3].default.as_deref(), Some("0"));

        let err = conn.list_columns("missing").unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn failures_are_classified() {
        let conn = roles();
        conn.execute("INSERT INTO roles (name) VALUES (?1)", &[Value::from("login")])
            .unwrap();

        match conn.execute("INSERT INTO roles (name) VALUES (?1)", &[Value::from("login")]) {
            Err(Error::Query(q)) => assert!(q.is_constraint_violation()),
            other => panic!("expected a constraint violation, got {other:?}"),
        }
        match conn.query("SELEC nonsense", &[]) {
            Err(Error::Query(q)) => {
                assert_eq!(q.kind, QueryErrorKind::Syntax);
                assert_eq!(q.sql.as_deref(), Some("SELEC nonsense"));
            }
            other => panic!("expected a syntax error, got {other:?}"),
        }
        match conn.query("SELECT * FROM nowhere", &[]) {
            Err(Error::Query(q)) => assert_eq!(q.kind, QueryErrorKind::Database),
            other => panic!("expected a database error, got {other:?}"),
        }
    }

    #[test]
    fn open_modes_map_to_flags() {
        let flags = OpenMode::ReadOnly.flags();
        assert_ne!(flags & ffi::SQLITE_OPEN_READONLY, 0);
        assert_eq!(flags & ffi::SQLITE_OPEN_CREATE, 0);
        let flags = OpenMode::default().flags();
        assert_ne!(flags & ffi::SQLITE_OPEN_CREATE, 0);
    }
}
