//! Shared fixtures for the SQLite integration tests.

#![allow(dead_code)]

use sqlrecord::prelude::*;
use sqlrecord::{ColumnMeta, Dialect, Row, TokenBehavior};
use sqlrecord_sqlite::SqliteConnection;
use std::sync::{Arc, Mutex};

const SCHEMA: &str = "
    CREATE TABLE users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        username VARCHAR(32),
        email VARCHAR(127),
        logins INTEGER,
        active BOOLEAN,
        score REAL,
        created INTEGER,
        updated INTEGER
    );
    CREATE TABLE roles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name VARCHAR(32),
        description TEXT
    );
    CREATE TABLE roles_users (
        user_id INTEGER NOT NULL,
        role_id INTEGER NOT NULL,
        granted_by VARCHAR(32)
    );
    CREATE TABLE profiles (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        bio TEXT
    );
    CREATE TABLE posts (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        author_id INTEGER,
        title VARCHAR(100),
        body TEXT,
        version INTEGER
    );
    CREATE TABLE posts_versions (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        post_id INTEGER NOT NULL,
        author_id INTEGER,
        title VARCHAR(100),
        body TEXT,
        version INTEGER
    );
    CREATE TABLE user_tokens (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        user_id INTEGER,
        token VARCHAR(40),
        expires INTEGER,
        created INTEGER
    );
    CREATE TABLE documents (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        guid VARCHAR(36),
        title VARCHAR(100)
    );
";

/// A SQLite connection that remembers every statement sent through it.
///
/// Column introspection is not recorded.
pub struct Recording {
    inner: SqliteConnection,
    statements: Mutex<Vec<String>>,
}

impl Recording {
    pub fn open() -> Self {
        let inner = SqliteConnection::open_memory().expect("open sqlite memory db");
        inner.execute_raw(SCHEMA).expect("create schema");
        Self {
            inner,
            statements: Mutex::new(Vec::new()),
        }
    }

    pub fn statements(&self) -> Vec<String> {
        self.statements.lock().expect("statement log").clone()
    }

    pub fn count(&self) -> usize {
        self.statements.lock().expect("statement log").len()
    }

    pub fn last(&self) -> Option<String> {
        self.statements.lock().expect("statement log").last().cloned()
    }

    pub fn clear(&self) {
        self.statements.lock().expect("statement log").clear();
    }

    /// Run raw SQL without recording it.
    pub fn raw(&self, sql: &str) {
        self.inner.execute_raw(sql).expect("raw sql");
    }

    /// Query without recording it.
    pub fn rows(&self, sql: &str, params: &[Value]) -> Vec<Row> {
        self.inner.query(sql, params).expect("query rows")
    }

    /// `SELECT COUNT(*)` over `table`, without recording it.
    pub fn count_rows(&self, table: &str) -> i64 {
        let sql = format!("SELECT COUNT(*) AS n FROM {table}");
        self.rows(&sql, &[])[0]
            .get_by_name("n")
            .and_then(Value::as_i64)
            .expect("count")
    }

    fn record(&self, sql: &str) {
        self.statements
            .lock()
            .expect("statement log")
            .push(sql.to_string());
    }
}

impl Connection for Recording {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    fn query(&self, sql: &str, params: &[Value]) -> Result<Vec<Row>> {
        self.record(sql);
        self.inner.query(sql, params)
    }

    fn execute(&self, sql: &str, params: &[Value]) -> Result<u64> {
        self.record(sql);
        self.inner.execute(sql, params)
    }

    fn insert(&self, sql: &str, params: &[Value]) -> Result<i64> {
        self.record(sql);
        self.inner.insert(sql, params)
    }

    fn list_columns(&self, table: &str) -> Result<Vec<ColumnMeta>> {
        self.inner.list_columns(table)
    }

    fn last_query(&self) -> Option<String> {
        self.inner.last_query()
    }
}

/// An ORM over a fresh database with the test models registered.
pub fn setup() -> (Arc<Recording>, Orm) {
    let conn = Arc::new(Recording::open());
    let orm = Orm::builder(conn.clone()).build();

    orm.register(
        ModelDef::new("user")
            .primary_val("username")
            .has_many("roles", RelationOptions::new().through("roles_users"))
            .has_one("profile", RelationOptions::new())
            .has_many("user_tokens", RelationOptions::new().model("user_token"))
            .has_many("posts", RelationOptions::new().foreign_key("author_id"))
            .created_column("created", Stamp::Timestamp)
            .updated_column("updated", Stamp::Timestamp)
            .rules("username", [Rule::NotEmpty, Rule::MaxLength(32)])
            .rule("email", Rule::Email)
            .filter("username", |value| match value {
                Value::Text(s) => Value::Text(s.trim().to_string()),
                other => other,
            })
            .ignored_columns(["password_confirm"]),
    );
    orm.register(
        ModelDef::new("role")
            .has_many("users", RelationOptions::new().through("roles_users")),
    );
    orm.register(ModelDef::new("profile").belongs_to("user", RelationOptions::new()));
    orm.register(
        ModelDef::new("post").belongs_to("author", RelationOptions::new().model("user")),
    );
    orm.register(
        ModelDef::new("user_token")
            .belongs_to("user", RelationOptions::new())
            .created_column("created", Stamp::Timestamp)
            .behavior(TokenBehavior::new().gc_probability(0)),
    );
    orm.register(ModelDef::new("document").behavior(sqlrecord::GuidBehavior::new()));

    (conn, orm)
}

/// Insert a user directly and return its id.
pub fn seed_user(conn: &Recording, username: &str) -> i64 {
    conn.inner
        .insert(
            "INSERT INTO users (username, logins, active) VALUES (?1, 0, 1)",
            &[Value::from(username)],
        )
        .expect("seed user")
}

pub fn seed_role(conn: &Recording, name: &str) -> i64 {
    conn.inner
        .insert("INSERT INTO roles (name) VALUES (?1)", &[Value::from(name)])
        .expect("seed role")
}
