use super::Behavior;
use crate::orm::Lookup;
use crate::record::Record;
use sqlrecord_core::{Result, Value};
use sqlrecord_query::{Logic, Op, Select};
use std::sync::Arc;
use uuid::Uuid;

/// Keeps a random (version 4) GUID in a column and looks records up by it.
///
/// On construct, a key that parses as a GUID loads the record by the GUID
/// column. Other keys fall back to the primary key unless `guid_only` is
/// set. Constructing without a lookup stops later behaviors.
///
/// On create and update an empty GUID column is filled with a new GUID that
/// no other row uses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuidBehavior {
    column: String,
    guid_only: bool,
}

impl Default for GuidBehavior {
    fn default() -> Self {
        Self {
            column: "guid".to_string(),
            guid_only: false,
        }
    }
}

impl GuidBehavior {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn column(mut self, column: impl Into<String>) -> Self {
        self.column = column.into();
        self
    }

    /// Refuse keys that are not GUIDs instead of looking them up by primary key.
    pub fn guid_only(mut self, guid_only: bool) -> Self {
        self.guid_only = guid_only;
        self
    }

    fn create_guid(&self, record: &mut Record) -> Result<()> {
        if !record.column(&self.column)?.is_empty_key() {
            return Ok(());
        }

        let conn = Arc::clone(record.orm().connection());
        loop {
            let guid = Uuid::new_v4().to_string();
            let (sql, params) = Select::new()
                .column(record.primary_key(), None)
                .from(record.table_name(), None)
                .filter(Logic::And, self.column.as_str(), Op::Eq, Value::from(&guid))
                .limit(1)
                .build(conn.dialect());

            if conn.query_one(&sql, &params)?.is_none() {
                record.set(&self.column, guid)?;
                return Ok(());
            }
            tracing::warn!(table = record.table_name(), guid = %guid, "Duplicate GUID created");
        }
    }
}

impl Behavior for GuidBehavior {
    fn on_construct(&self, record: &mut Record, lookup: Option<&Lookup>) -> Result<bool> {
        match lookup {
            None => Ok(false),
            Some(Lookup::Key(key)) => match key.as_str().map(Uuid::parse_str) {
                Some(Ok(_)) => {
                    let column = format!("{}.{}", record.table_name(), self.column);
                    record.where_(column, Op::Eq, key.clone()).find()?;
                    Ok(false)
                }
                _ => Ok(!self.guid_only),
            },
            Some(Lookup::Where(_)) => Ok(true),
        }
    }

    fn on_create(&self, record: &mut Record) -> Result<()> {
        self.create_guid(record)
    }

    fn on_update(&self, record: &mut Record) -> Result<()> {
        self.create_guid(record)
    }
}
