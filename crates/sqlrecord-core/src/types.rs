//! Column type classes and column metadata.

use serde::{Deserialize, Serialize};

/// Coarse type class of a column, used to coerce values loaded into a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum TypeClass {
    /// Integer columns (`INT`, `INTEGER`, `BIGINT`, `SMALLINT`, ...)
    Integer,
    /// Floating point and fixed precision columns (`REAL`, `DOUBLE`, `DECIMAL`, ...)
    Float,
    /// Boolean columns (`BOOL`, `BOOLEAN`, `BIT`)
    Bool,
    /// Character columns (`CHAR`, `VARCHAR`, `TEXT`, dates stored as text)
    String,
    /// Anything else; values pass through unchanged
    #[default]
    Other,
}

impl TypeClass {
    /// Classify a declared SQL type name.
    ///
    /// Follows SQLite's affinity rules for names it has not seen before:
    /// anything containing `INT` is an integer, `CHAR`/`CLOB`/`TEXT` are
    /// strings, `REAL`/`FLOA`/`DOUB` are floats.
    pub fn from_sql_type(declared: &str) -> Self {
        let upper = declared.trim().to_ascii_uppercase();
        let base = upper.split('(').next().unwrap_or("").trim();

        match base {
            "BOOL" | "BOOLEAN" | "BIT" => return TypeClass::Bool,
            "DECIMAL" | "NUMERIC" | "NUMBER" => return TypeClass::Float,
            "DATE" | "TIME" | "DATETIME" | "TIMESTAMP" | "YEAR" | "ENUM" | "SET" | "UUID" => {
                return TypeClass::String;
            }
            "" | "BLOB" | "JSON" | "JSONB" => return TypeClass::Other,
            _ => {}
        }

        if base.contains("INT") {
            TypeClass::Integer
        } else if base.contains("CHAR") || base.contains("CLOB") || base.contains("TEXT") {
            TypeClass::String
        } else if base.contains("REAL") || base.contains("FLOA") || base.contains("DOUB") {
            TypeClass::Float
        } else {
            TypeClass::Other
        }
    }

    /// Get a lowercase name for this class.
    pub const fn as_str(self) -> &'static str {
        match self {
            TypeClass::Integer => "int",
            TypeClass::Float => "float",
            TypeClass::Bool => "bool",
            TypeClass::String => "string",
            TypeClass::Other => "other",
        }
    }
}

/// Metadata for a single table column, as reported by the database.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnMeta {
    /// Column name
    pub name: String,
    /// Declared SQL type, as written in the schema
    pub data_type: String,
    /// Coercion class derived from the declared type
    pub class: TypeClass,
    /// Whether the column accepts NULL
    pub nullable: bool,
    /// Whether the column is part of the primary key
    pub primary_key: bool,
    /// Default value expression, if any
    pub default: Option<String>,
}

impl ColumnMeta {
    /// Create column metadata, classifying the declared type.
    pub fn new(name: impl Into<String>, data_type: impl Into<String>, nullable: bool) -> Self {
        let data_type = data_type.into();
        Self {
            name: name.into(),
            class: TypeClass::from_sql_type(&data_type),
            data_type,
            nullable,
            primary_key: false,
            default: None,
        }
    }

    /// Mark this column as (part of) the primary key.
    pub fn primary_key(mut self, primary_key: bool) -> Self {
        self.primary_key = primary_key;
        self
    }

    /// Set the default value expression.
    pub fn default_value(mut self, default: Option<String>) -> Self {
        self.default = default;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_common_types() {
        assert_eq!(TypeClass::from_sql_type("INTEGER"), TypeClass::Integer);
        assert_eq!(TypeClass::from_sql_type("bigint(20)"), TypeClass::Integer);
        assert_eq!(TypeClass::from_sql_type("VARCHAR(32)"), TypeClass::String);
        assert_eq!(TypeClass::from_sql_type("text"), TypeClass::String);
        assert_eq!(TypeClass::from_sql_type("REAL"), TypeClass::Float);
        assert_eq!(TypeClass::from_sql_type("decimal(10,2)"), TypeClass::Float);
        assert_eq!(TypeClass::from_sql_type("BOOLEAN"), TypeClass::Bool);
        assert_eq!(TypeClass::from_sql_type("DATETIME"), TypeClass::String);
        assert_eq!(TypeClass::from_sql_type("BLOB"), TypeClass::Other);
        assert_eq!(TypeClass::from_sql_type(""), TypeClass::Other);
    }

    #[test]
    fn column_meta_classifies_on_construction() {
        let col = ColumnMeta::new("age", "INT", true).primary_key(false);
        assert_eq!(col.class, TypeClass::Integer);
        assert!(col.nullable);
        assert_eq!(col.default, None);
    }
}
