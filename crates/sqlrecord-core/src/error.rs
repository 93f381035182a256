//! Error types for record operations.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::validate::Validation;

/// The primary error type for all record operations.
#[derive(Debug)]
pub enum Error {
    /// Connection-related errors (open, close, busy)
    Connection(ConnectionError),
    /// Query building and execution errors
    Query(QueryError),
    /// A value could not be read as the requested type.
    Type(TypeError),
    Config(ConfigError),
    /// Attribute access on a name that is neither a column nor a relation alias
    UnknownProperty(UnknownPropertyError),
    /// Misuse of a model (wrong lifecycle state, unknown model, bad relation)
    Model(ModelError),
    /// Failed validation, with errors of nested relations aggregated
    Validation(ValidationError),
    Custom(String),
}

#[derive(Debug)]
pub struct ConnectionError {
    pub kind: ConnectionErrorKind,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionErrorKind {
    /// Failed to open the database
    Connect,
    /// Connection was already closed
    Disconnected,
}

#[derive(Debug)]
pub struct QueryError {
    pub kind: QueryErrorKind,
    pub sql: Option<String>,
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryErrorKind {
    /// Syntax error in SQL
    Syntax,
    /// UNIQUE, NOT NULL, FOREIGN KEY or CHECK.
    Constraint,
    NotFound,
    /// Database is busy or locked
    Busy,
    /// A builder call that does not apply to the statement kind
    Builder,
    /// Other database error
    Database,
}

#[derive(Debug)]
pub struct TypeError {
    pub expected: &'static str,
    pub actual: String,
    pub column: Option<String>,
    pub rust_type: Option<&'static str>,
}

#[derive(Debug)]
pub struct ConfigError {
    pub message: String,
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPropertyError {
    /// The requested attribute name
    pub property: String,
    /// Object name of the record it was requested on
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelError {
    pub kind: ModelErrorKind,
    pub model: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelErrorKind {
    /// No model with this name was registered
    NotRegistered,
    /// Cannot create a record that is already persisted
    AlreadyLoaded,
    /// Cannot update a record that has not been persisted
    NotLoaded,
    /// Relation alias is missing or of the wrong kind for the operation
    InvalidRelation,
    /// A relation alias was assigned something other than a record
    ExpectedRecord,
}

impl ModelError {
    pub fn new(kind: ModelErrorKind, model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            model: model.into(),
            message: message.into(),
        }
    }
}

impl QueryError {
    /// A builder misuse error, carrying no SQL.
    pub fn builder(message: impl Into<String>) -> Self {
        Self {
            kind: QueryErrorKind::Builder,
            sql: None,
            message: message.into(),
            source: None,
        }
    }

    /// Is this a constraint violation?
    pub fn is_constraint_violation(&self) -> bool {
        self.kind == QueryErrorKind::Constraint
    }
}

/// How a nested error set is attached under an alias.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HasMany {
    /// One-to-one: the alias holds exactly one error set
    No,
    /// Append under the next numeric key of the alias
    Append,
    /// Store under an explicit key of the alias
    Key(String),
}

/// One level of the aggregated error tree.
#[derive(Debug, Clone, Default)]
pub struct ErrorNode {
    object: Option<Validation>,
    children: Vec<(String, ErrorNode)>,
}

impl ErrorNode {
    fn with_object(object: Validation) -> Self {
        Self {
            object: Some(object),
            children: Vec::new(),
        }
    }

    /// The validation object at this level, if any.
    pub fn object(&self) -> Option<&Validation> {
        self.object.as_ref()
    }

    /// Nested nodes in insertion order.
    pub fn children(&self) -> &[(String, ErrorNode)] {
        &self.children
    }

    fn child_mut(&mut self, key: &str) -> &mut ErrorNode {
        let pos = match self.children.iter().position(|(k, _)| k == key) {
            Some(pos) => pos,
            None => {
                self.children.push((key.to_string(), ErrorNode::default()));
                self.children.len() - 1
            }
        };
        &mut self.children[pos].1
    }

    fn set_child(&mut self, key: &str, node: ErrorNode) {
        *self.child_mut(key) = node;
    }

    fn next_index(&self) -> String {
        let next = self
            .children
            .iter()
            .filter_map(|(k, _)| k.parse::<usize>().ok())
            .map(|n| n + 1)
            .max()
            .unwrap_or(0);
        next.to_string()
    }

    fn attach(&mut self, alias: &str, node: ErrorNode, has_many: HasMany) {
        match has_many {
            HasMany::No => self.set_child(alias, node),
            HasMany::Append => {
                let slot = self.child_mut(alias);
                let key = slot.next_index();
                slot.set_child(&key, node);
            }
            HasMany::Key(key) => self.child_mut(alias).set_child(&key, node),
        }
    }

    fn generate(&self, directory: Option<&str>, translate: bool) -> BTreeMap<String, ErrorMessage> {
        let mut errors = BTreeMap::new();
        if let Some(object) = &self.object {
            for (field, message) in object.errors(directory, translate) {
                errors.entry(field).or_insert(ErrorMessage::Message(message));
            }
        }
        for (alias, child) in &self.children {
            let file = directory.map(|dir| format!("{dir}/{alias}").trim_matches('/').to_string());
            errors.insert(
                alias.clone(),
                ErrorMessage::Nested(child.generate(file.as_deref(), translate)),
            );
        }
        errors
    }
}

/// A rendered validation message, or the messages of a nested relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ErrorMessage {
    Message(String),
    Nested(BTreeMap<String, ErrorMessage>),
}

impl ErrorMessage {
    /// The message text, if this is a leaf.
    pub fn as_message(&self) -> Option<&str> {
        match self {
            ErrorMessage::Message(m) => Some(m),
            ErrorMessage::Nested(_) => None,
        }
    }

    /// The nested messages, if this is a relation.
    pub fn as_nested(&self) -> Option<&BTreeMap<String, ErrorMessage>> {
        match self {
            ErrorMessage::Nested(n) => Some(n),
            ErrorMessage::Message(_) => None,
        }
    }
}

/// Validation failure of a record, aggregating the failures of related records.
///
/// The record's own [`Validation`] sits at the root. Related records' validations
/// are attached under their relation alias, either directly or, for relations
/// that can occur several times, under a numeric or explicit key:
///
/// ```ignore
/// let mut err = ValidationError::new("user", user_validation);
/// err.add_object("profile", profile_validation, HasMany::No);
/// // {"username": "...", "profile": {"first_name": "..."}}
/// let messages = err.errors(Some("models"), true);
/// ```
#[derive(Debug, Clone)]
pub struct ValidationError {
    object_name: String,
    message: String,
    root: ErrorNode,
}

impl ValidationError {
    /// Create the error for a record's failed validation.
    pub fn new(object_name: impl Into<String>, object: Validation) -> Self {
        Self {
            object_name: object_name.into(),
            message: "Failed to validate array".to_string(),
            root: ErrorNode::with_object(object),
        }
    }

    /// Replace the summary message.
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Object name of the record this error was raised for.
    pub fn object_name(&self) -> &str {
        &self.object_name
    }

    /// The root of the error tree.
    pub fn objects(&self) -> &ErrorNode {
        &self.root
    }

    /// Attach a related record's validation under `alias`.
    pub fn add_object(&mut self, alias: &str, object: Validation, has_many: HasMany) -> &mut Self {
        self.root
            .attach(alias, ErrorNode::with_object(object), has_many);
        self
    }

    /// Attach another validation error's whole tree under `alias`.
    pub fn merge(&mut self, alias: &str, other: ValidationError, has_many: HasMany) -> &mut Self {
        self.root.attach(alias, other.root, has_many);
        self
    }

    /// Render every error in the tree.
    ///
    /// Without a directory the raw rule names are returned per field. With a
    /// directory, messages are looked up starting at `directory/object_name`,
    /// each relation alias adding a path segment.
    pub fn errors(
        &self,
        directory: Option<&str>,
        translate: bool,
    ) -> BTreeMap<String, ErrorMessage> {
        let directory = directory.map(|dir| format!("{dir}/{}", self.object_name));
        self.root.generate(directory.as_deref(), translate)
    }
}

impl Error {
    /// Statement text of a failed query.
    pub fn sql(&self) -> Option<&str> {
        match self {
            Error::Query(q) => q.sql.as_deref(),
            _ => None,
        }
    }

    /// Is this an unknown-property error?
    pub fn is_unknown_property(&self) -> bool {
        matches!(self, Error::UnknownProperty(_))
    }

    /// The model error kind, if this is a model error.
    pub fn model_kind(&self) -> Option<ModelErrorKind> {
        match self {
            Error::Model(e) => Some(e.kind),
            _ => None,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Connection(e) => write!(f, "connection failed: {}", e.message),
            Error::Query(e) => write!(f, "Query error: {}", e.message),
            Error::Type(e) => {
                if let Some(col) = &e.column {
                    write!(
                        f,
                        "column '{}' holds {2}, not {1}",
                        col, e.expected, e.actual
                    )
                } else {
                    write!(f, "found {}, not {}", e.actual, e.expected)
                }
            }
            Error::Config(e) => write!(f, "bad configuration: {}", e.message),
            Error::UnknownProperty(e) => write!(f, "{e}"),
            Error::Model(e) => write!(f, "Model error: {e}"),
            Error::Validation(e) => write!(f, "Validation error: {e}"),
            Error::Custom(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Connection(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Query(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            Error::Config(e) => e
                .source
                .as_deref()
                .map(|err| err as &(dyn std::error::Error + 'static)),
            _ => None,
        }
    }
}

impl fmt::Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for TypeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(col) = &self.column {
            write!(
                f,
                "expected {} for column '{}', found {}",
                self.expected, col, self.actual
            )
        } else {
            write!(f, "expected {}, found {}", self.expected, self.actual)
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl fmt::Display for UnknownPropertyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "The {} property does not exist in the {} class",
            self.property, self.model
        )
    }
}

impl fmt::Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message, self.model)
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fields: Vec<String> = self.errors(None, false).into_keys().collect();
        if fields.is_empty() {
            write!(f, "{} for {}", self.message, self.object_name)
        } else {
            write!(
                f,
                "{} for {}: {}",
                self.message,
                self.object_name,
                fields.join(", ")
            )
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<ConnectionError> for Error {
    fn from(err: ConnectionError) -> Self {
        Error::Connection(err)
    }
}

impl From<QueryError> for Error {
    fn from(err: QueryError) -> Self {
        Error::Query(err)
    }
}

impl From<TypeError> for Error {
    fn from(err: TypeError) -> Self {
        Error::Type(err)
    }
}

impl From<ConfigError> for Error {
    fn from(err: ConfigError) -> Self {
        Error::Config(err)
    }
}

impl From<UnknownPropertyError> for Error {
    fn from(err: UnknownPropertyError) -> Self {
        Error::UnknownProperty(err)
    }
}

impl From<ModelError> for Error {
    fn from(err: ModelError) -> Self {
        Error::Model(err)
    }
}

impl From<ValidationError> for Error {
    fn from(err: ValidationError) -> Self {
        Error::Validation(err)
    }
}

/// Result type alias for record operations.
pub type Result<T> = std::result::Result<T, Error>;
