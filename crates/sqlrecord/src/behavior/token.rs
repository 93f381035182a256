use super::Behavior;
use crate::orm::Lookup;
use crate::record::Record;
use chrono::Utc;
use rand::distributions::Alphanumeric;
use rand::{Rng, thread_rng};
use sha1::{Digest, Sha1};
use sqlrecord_core::{Result, Value};
use sqlrecord_query::{Delete, Expr, Logic, Op, Select};
use std::sync::Arc;
use uuid::Uuid;

/// Expiring, unique random tokens, such as "remember me" tokens.
///
/// - on create, a unique SHA-1 token is written to the token column
/// - on construct, expired rows of the table are deleted now and then
/// - a record constructed with a lookup that turns out to be expired is
///   deleted right away
///
/// Expiry times are Unix timestamps.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenBehavior {
    token_column: String,
    expires_column: String,
    gc_probability: u32,
}

impl Default for TokenBehavior {
    fn default() -> Self {
        Self {
            token_column: "token".to_string(),
            expires_column: "expires".to_string(),
            gc_probability: 50,
        }
    }
}

impl TokenBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token_column(mut self, column: impl Into<String>) -> Self {
        self.token_column = column.into();
        self
    }

    pub fn expires_column(mut self, column: impl Into<String>) -> Self {
        self.expires_column = column.into();
        self
    }

    /// Collect expired rows on one construct in `n`. Zero never collects.
    pub fn gc_probability(mut self, n: u32) -> Self {
        self.gc_probability = n;
        self
    }

    /// Delete every row of the record's table whose expiry has passed.
    pub fn delete_expired(&self, record: &Record) -> Result<u64> {
        let conn = Arc::clone(record.orm().connection());
        let (sql, params) = Delete::new(record.table_name())
            .filter(
                Logic::And,
                self.expires_column.as_str(),
                Op::Lt,
                Value::Int(Utc::now().timestamp()),
            )
            .build(conn.dialect());
        let deleted = conn.execute(&sql, &params)?;
        tracing::debug!(table = record.table_name(), deleted, "Deleted expired tokens");
        Ok(deleted)
    }

    fn create_token(&self, record: &Record) -> Result<String> {
        let conn = Arc::clone(record.orm().connection());
        loop {
            let random: String = thread_rng()
                .sample_iter(&Alphanumeric)
                .take(32)
                .map(char::from)
                .collect();
            let mut hasher = Sha1::new();
            hasher.update(Uuid::new_v4().as_bytes());
            hasher.update(random.as_bytes());
            hasher.update(Utc::now().timestamp_micros().to_be_bytes());
            let token: String = hasher
                .finalize()
                .iter()
                .map(|b| format!("{b:02x}"))
                .collect();

            let (sql, params) = Select::new()
                .column(Expr::count_star(), Some("records_found".to_string()))
                .from(record.table_name(), None)
                .filter(Logic::And, self.token_column.as_str(), Op::Eq, Value::from(&token))
                .build(conn.dialect());
            let taken = conn
                .query_one(&sql, &params)?
                .and_then(|row| row.get_by_name("records_found").and_then(Value::as_i64))
                .unwrap_or(0);
            if taken == 0 {
                return Ok(token);
            }
            tracing::warn!(table = record.table_name(), "Duplicate token created");
        }
    }
}

impl Behavior for TokenBehavior {
    fn on_construct(&self, record: &mut Record, lookup: Option<&Lookup>) -> Result<bool> {
        if self.gc_probability > 0 && thread_rng().gen_range(1..=self.gc_probability) == 1 {
            self.delete_expired(record)?;
        }

        let Some(lookup) = lookup else {
            return Ok(true);
        };
        record.load_lookup(lookup)?;
        let expires = record.column(&self.expires_column)?;
        if record.loaded() && expires.as_i64().is_some_and(|t| t < Utc::now().timestamp()) {
            tracing::debug!(table = record.table_name(), "Deleting expired token");
            record.delete()?;
        }
        Ok(false)
    }

    fn on_create(&self, record: &mut Record) -> Result<()> {
        let token = self.create_token(record)?;
        record.set(&self.token_column, token)?;
        Ok(())
    }
}
