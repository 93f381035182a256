//! Rule-based validation of record attributes.
//!
//! A [`Validation`] holds a copy of the values under test together with the
//! rules, filters, labels and callbacks declared for them. [`Validation::check`]
//! runs filters first, then rules (stopping at the first failing rule of a
//! field), then callbacks. Failures are reported by rule name, or rendered to
//! messages through a [`MessageCatalog`].

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::{Arc, OnceLock, RwLock};

use regex::Regex;

use crate::Value;

/// Thread-safe regex cache for compiled patterns.
struct RegexCache {
    cache: RwLock<HashMap<String, Regex>>,
}

impl RegexCache {
    fn new() -> Self {
        Self {
            cache: RwLock::new(HashMap::new()),
        }
    }

    fn get_or_compile(&self, pattern: &str) -> Result<Regex, regex::Error> {
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(regex) = cache.get(pattern) {
                return Ok(regex.clone());
            }
        }

        let regex = Regex::new(pattern)?;
        {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            cache.insert(pattern.to_string(), regex.clone());
        }
        Ok(regex)
    }
}

fn regex_cache() -> &'static RegexCache {
    static CACHE: OnceLock<RegexCache> = OnceLock::new();
    CACHE.get_or_init(RegexCache::new)
}

/// Check if a string matches a regex pattern.
///
/// An invalid pattern is logged and treated as a non-match.
pub fn matches_pattern(value: &str, pattern: &str) -> bool {
    match regex_cache().get_or_compile(pattern) {
        Ok(regex) => regex.is_match(value),
        Err(e) => {
            tracing::warn!(
                pattern = pattern,
                error = %e,
                "Invalid regex pattern in validation, treating as non-match"
            );
            false
        }
    }
}

const EMAIL_PATTERN: &str = concat!(
    r"^[-_a-zA-Z0-9'+*$^&%=~!?{}]+(?:\.[-_a-zA-Z0-9'+*$^&%=~!?{}]+)*",
    r"@[a-zA-Z0-9](?:[-a-zA-Z0-9.]*[a-zA-Z0-9])?\.[a-zA-Z]{2,}$",
);

/// Predicate used by [`Rule::Custom`].
pub type RulePredicate = Arc<dyn Fn(&Value) -> bool + Send + Sync>;

/// Transformation applied to a value before rules run.
pub type Filter = Arc<dyn Fn(Value) -> Value + Send + Sync>;

/// Callback run after the rules of a field passed; may add errors.
pub type Callback = Arc<dyn Fn(&mut Validation, &str) + Send + Sync>;

/// A validation rule for one field.
#[derive(Clone)]
pub enum Rule {
    /// Value must not be null, false, the empty string or an empty array
    NotEmpty,
    /// At least this many characters
    MinLength(usize),
    /// At most this many characters
    MaxLength(usize),
    /// Exactly this many characters
    ExactLength(usize),
    /// Must match the pattern
    Regex(String),
    /// Must look like an email address
    Email,
    /// Only ASCII digits
    Digit,
    /// Parses as a number
    Numeric,
    /// Number within the inclusive range
    Range(f64, f64),
    /// Must equal the value of another field
    Matches(String),
    /// Named rule with an arbitrary predicate
    Custom { name: String, check: RulePredicate },
}

impl Rule {
    /// Build a custom rule.
    pub fn custom(
        name: impl Into<String>,
        check: impl Fn(&Value) -> bool + Send + Sync + 'static,
    ) -> Self {
        Rule::Custom {
            name: name.into(),
            check: Arc::new(check),
        }
    }

    /// The rule name, as reported in raw errors and used for message lookup.
    pub fn name(&self) -> &str {
        match self {
            Rule::NotEmpty => "not_empty",
            Rule::MinLength(_) => "min_length",
            Rule::MaxLength(_) => "max_length",
            Rule::ExactLength(_) => "exact_length",
            Rule::Regex(_) => "regex",
            Rule::Email => "email",
            Rule::Digit => "digit",
            Rule::Numeric => "numeric",
            Rule::Range(..) => "range",
            Rule::Matches(_) => "matches",
            Rule::Custom { name, .. } => name,
        }
    }

    fn params(&self) -> Vec<String> {
        match self {
            Rule::MinLength(n) | Rule::MaxLength(n) | Rule::ExactLength(n) => vec![n.to_string()],
            Rule::Regex(p) => vec![p.clone()],
            Rule::Range(min, max) => vec![min.to_string(), max.to_string()],
            Rule::Matches(other) => vec![other.clone()],
            _ => Vec::new(),
        }
    }

    /// Whether the rule still runs when the value is empty.
    fn applies_to_empty(&self) -> bool {
        matches!(self, Rule::NotEmpty | Rule::Matches(_))
    }

    fn check(&self, value: &Value, data: &BTreeMap<String, Value>) -> bool {
        match self {
            Rule::NotEmpty => !is_blank(value),
            Rule::MinLength(n) => char_len(value) >= *n,
            Rule::MaxLength(n) => char_len(value) <= *n,
            Rule::ExactLength(n) => char_len(value) == *n,
            Rule::Regex(pattern) => matches_pattern(&text_of(value), pattern),
            Rule::Email => matches_pattern(&text_of(value), EMAIL_PATTERN),
            Rule::Digit => {
                let text = text_of(value);
                !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
            }
            Rule::Numeric => numeric(value).is_some(),
            Rule::Range(min, max) => numeric(value).is_some_and(|n| n >= *min && n <= *max),
            Rule::Matches(other) => data.get(other).unwrap_or(&Value::Null) == value,
            Rule::Custom { check, .. } => check(value),
        }
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())?;
        let params = self.params();
        if !params.is_empty() {
            write!(f, "({})", params.join(", "))?;
        }
        Ok(())
    }
}

/// Empty in the `not_empty` sense: `0` is not empty.
fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Text(s) => s.is_empty(),
        Value::Bytes(b) => b.is_empty(),
        Value::Array(a) => a.is_empty(),
        Value::Json(j) => j.is_null(),
        _ => false,
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::Text(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn char_len(value: &Value) -> usize {
    text_of(value).chars().count()
}

fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Int(v) => Some(*v as f64),
        Value::Float(v) => Some(*v),
        Value::Text(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// A failed rule for a field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub rule: String,
    pub params: Vec<String>,
}

/// Validation messages, looked up by file and dotted path.
///
/// Files are slash-separated (`models/user`), paths are `field.rule`,
/// `field.default` or a bare rule name. Built-in messages for every
/// [`Rule`] live in the `validation` file and are used last.
#[derive(Debug, Clone, Default)]
pub struct MessageCatalog {
    messages: HashMap<String, HashMap<String, String>>,
}

impl MessageCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a message.
    pub fn insert(
        &mut self,
        file: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> &mut Self {
        self.messages
            .entry(file.into())
            .or_default()
            .insert(path.into(), message.into());
        self
    }

    /// Look up a message, falling back to the built-in `validation` file.
    pub fn get(&self, file: &str, path: &str) -> Option<&str> {
        self.messages
            .get(file)
            .and_then(|messages| messages.get(path))
            .map(String::as_str)
            .or_else(|| (file == "validation").then(|| default_message(path)).flatten())
    }
}

fn default_message(rule: &str) -> Option<&'static str> {
    Some(match rule {
        "not_empty" => ":field must not be empty",
        "min_length" => ":field must be at least :param1 characters long",
        "max_length" => ":field must be less than :param1 characters long",
        "exact_length" => ":field must be exactly :param1 characters long",
        "regex" => ":field does not match the required format",
        "email" => ":field must be a email address",
        "digit" => ":field must be a digit",
        "numeric" => ":field must be numeric",
        "range" => ":field must be within the range of :param1 to :param2",
        "matches" => ":field must be the same as :param1",
        _ => return None,
    })
}

/// Values under validation, with their rules and collected errors.
#[derive(Clone, Default)]
pub struct Validation {
    data: BTreeMap<String, Value>,
    rules: Vec<(String, Rule)>,
    filters: Vec<(Option<String>, Filter)>,
    labels: HashMap<String, String>,
    callbacks: Vec<(String, Callback)>,
    errors: BTreeMap<String, FieldError>,
    catalog: Option<Arc<MessageCatalog>>,
}

impl Validation {
    /// Create a validation over a copy of `data`.
    pub fn new(data: impl IntoIterator<Item = (String, Value)>) -> Self {
        Self {
            data: data.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Use `catalog` when rendering messages.
    pub fn with_catalog(mut self, catalog: Arc<MessageCatalog>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    /// Add a rule for `field`. Rules of a field run in the order they were added.
    pub fn rule(&mut self, field: impl Into<String>, rule: Rule) -> &mut Self {
        self.rules.push((field.into(), rule));
        self
    }

    /// Add several rules for `field`.
    pub fn rules(&mut self, field: &str, rules: impl IntoIterator<Item = Rule>) -> &mut Self {
        for rule in rules {
            self.rule(field, rule);
        }
        self
    }

    /// Add a filter for one field.
    pub fn filter(&mut self, field: impl Into<String>, filter: Filter) -> &mut Self {
        self.filters.push((Some(field.into()), filter));
        self
    }

    /// Add a filter applied to every field.
    pub fn filter_all(&mut self, filter: Filter) -> &mut Self {
        self.filters.push((None, filter));
        self
    }

    /// Set the human readable label of a field.
    pub fn label(&mut self, field: impl Into<String>, label: impl Into<String>) -> &mut Self {
        self.labels.insert(field.into(), label.into());
        self
    }

    /// Add a callback for `field`.
    pub fn callback(&mut self, field: impl Into<String>, callback: Callback) -> &mut Self {
        self.callbacks.push((field.into(), callback));
        self
    }

    /// Replace the values under validation, keeping rules and labels.
    pub fn exchange(&mut self, data: impl IntoIterator<Item = (String, Value)>) {
        self.data = data.into_iter().collect();
        self.errors.clear();
    }

    /// The values, with filters applied once [`check`](Self::check) ran.
    pub fn data(&self) -> &BTreeMap<String, Value> {
        &self.data
    }

    /// Record a failed rule for `field`.
    pub fn error(
        &mut self,
        field: impl Into<String>,
        rule: impl Into<String>,
        params: Vec<String>,
    ) {
        self.errors.insert(
            field.into(),
            FieldError {
                rule: rule.into(),
                params,
            },
        );
    }

    /// The failed rules, by field.
    pub fn failed(&self) -> &BTreeMap<String, FieldError> {
        &self.errors
    }

    /// Run filters, rules and callbacks. Returns true when nothing failed.
    pub fn check(&mut self) -> bool {
        self.errors.clear();

        for (field, value) in &mut self.data {
            for (target, filter) in &self.filters {
                if target.as_deref().is_none_or(|t| t == field) {
                    *value = filter(std::mem::replace(value, Value::Null));
                }
            }
        }

        let mut failed = BTreeMap::new();
        for (field, rule) in &self.rules {
            if failed.contains_key(field) {
                continue;
            }
            let value = self.data.get(field).unwrap_or(&Value::Null);
            if is_blank(value) && !rule.applies_to_empty() {
                continue;
            }
            if !rule.check(value, &self.data) {
                failed.insert(
                    field.clone(),
                    FieldError {
                        rule: rule.name().to_string(),
                        params: rule.params(),
                    },
                );
            }
        }
        self.errors = failed;

        let callbacks = self.callbacks.clone();
        for (field, callback) in &callbacks {
            if !self.errors.contains_key(field) {
                callback(self, field);
            }
        }

        if !self.errors.is_empty() {
            tracing::debug!(fields = ?self.errors.keys().collect::<Vec<_>>(), "Validation failed");
        }
        self.errors.is_empty()
    }

    /// Render the errors.
    ///
    /// Without a file, each field maps to its failed rule name. With a file,
    /// messages are looked up as `field.rule`, `field.default`, `rule`, then the
    /// built-in message, and `:field`, `:value`, `:paramN` are substituted.
    /// `translate` substitutes the field's label for `:field`, otherwise the
    /// field name is used.
    pub fn errors(&self, file: Option<&str>, translate: bool) -> BTreeMap<String, String> {
        let catalog = self.catalog.clone().unwrap_or_default();
        let mut messages = BTreeMap::new();
        for (field, error) in &self.errors {
            let Some(file) = file else {
                messages.insert(field.clone(), error.rule.clone());
                continue;
            };

            let template = catalog
                .get(file, &format!("{field}.{}", error.rule))
                .or_else(|| catalog.get(file, &format!("{field}.default")))
                .or_else(|| catalog.get(file, &error.rule))
                .or_else(|| catalog.get("validation", &error.rule))
                .map(str::to_string)
                .unwrap_or_else(|| format!("{file}.{field}.{}", error.rule));

            let field_name = if translate {
                self.labels.get(field).unwrap_or(field).clone()
            } else {
                field.clone()
            };
            let mut message = template.replace(":field", &field_name);
            message = message.replace(
                ":value",
                &self.data.get(field).map(text_of).unwrap_or_default(),
            );
            for (i, param) in error.params.iter().enumerate().rev() {
                let param = if translate {
                    self.labels.get(param).unwrap_or(param)
                } else {
                    param
                };
                message = message.replace(&format!(":param{}", i + 1), param);
            }
            messages.insert(field.clone(), message);
        }
        messages
    }
}

impl fmt::Debug for Validation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Validation")
            .field("data", &self.data)
            .field("rules", &self.rules)
            .field("labels", &self.labels)
            .field("errors", &self.errors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(pairs: &[(&str, Value)]) -> Vec<(String, Value)> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_matches_email_pattern() {
        assert!(matches_pattern("test@example.com", EMAIL_PATTERN));
        assert!(matches_pattern("first.last+tag@mail.example.org", EMAIL_PATTERN));
        assert!(!matches_pattern("invalid", EMAIL_PATTERN));
        assert!(!matches_pattern("a@b", EMAIL_PATTERN));
    }

    #[test]
    fn test_invalid_pattern_returns_false() {
        assert!(!matches_pattern("anything", "[invalid"));
    }

    #[test]
    fn first_failing_rule_wins() {
        let mut v = Validation::new(data(&[("name", Value::from("ab"))]));
        v.rules("name", [Rule::NotEmpty, Rule::MinLength(4), Rule::MaxLength(1)]);
        assert!(!v.check());
        assert_eq!(v.failed()["name"].rule, "min_length");
    }

    #[test]
    fn empty_values_skip_other_rules() {
        let mut v = Validation::new(data(&[("description", Value::from(""))]));
        v.rule("description", Rule::MaxLength(255))
            .rule("description", Rule::Email);
        assert!(v.check());

        v.rule("description", Rule::NotEmpty);
        assert!(!v.check());
        assert_eq!(v.errors(None, false)["description"], "not_empty");
    }

    #[test]
    fn zero_is_not_empty() {
        let mut v = Validation::new(data(&[("count", Value::Int(0))]));
        v.rule("count", Rule::NotEmpty).rule("count", Rule::Digit);
        assert!(v.check());
    }

    #[test]
    fn numeric_rules() {
        let mut v = Validation::new(data(&[
            ("age", Value::from("42")),
            ("score", Value::Float(11.5)),
            ("code", Value::from("12a")),
        ]));
        v.rule("age", Rule::Numeric)
            .rule("age", Rule::Range(18.0, 99.0))
            .rule("score", Rule::Range(0.0, 10.0))
            .rule("code", Rule::Digit);
        assert!(!v.check());
        assert!(!v.failed().contains_key("age"));
        assert_eq!(v.failed()["score"].rule, "range");
        assert_eq!(v.failed()["code"].rule, "digit");
    }

    #[test]
    fn filters_run_before_rules() {
        let mut v = Validation::new(data(&[("name", Value::from("  abcd  "))]));
        v.filter_all(Arc::new(|value| match value {
            Value::Text(s) => Value::Text(s.trim().to_string()),
            other => other,
        }));
        v.rule("name", Rule::ExactLength(4));
        assert!(v.check());
        assert_eq!(v.data()["name"], Value::from("abcd"));
    }

    #[test]
    fn matches_and_custom_rules() {
        let mut v = Validation::new(data(&[
            ("password", Value::from("secret")),
            ("password_confirm", Value::from("secreT")),
            ("slug", Value::from("Has Spaces")),
        ]));
        v.rule("password_confirm", Rule::Matches("password".to_string()))
            .rule(
                "slug",
                Rule::custom("no_spaces", |value| {
                    value.as_str().is_some_and(|s| !s.contains(' '))
                }),
            );
        assert!(!v.check());
        assert_eq!(v.failed()["password_confirm"].rule, "matches");
        assert_eq!(v.failed()["slug"].rule, "no_spaces");
    }

    #[test]
    fn callbacks_add_errors() {
        let mut v = Validation::new(data(&[("name", Value::from("root"))]));
        v.callback(
            "name",
            Arc::new(|validation: &mut Validation, field: &str| {
                if validation.data().get(field) == Some(&Value::from("root")) {
                    validation.error(field, "reserved", Vec::new());
                }
            }),
        );
        assert!(!v.check());
        assert_eq!(v.errors(None, false)["name"], "reserved");
    }

    #[test]
    fn messages_from_catalog_and_defaults() {
        let mut catalog = MessageCatalog::new();
        catalog.insert("models/role", "name.not_empty", "A role needs a name");

        let mut v = Validation::new(data(&[
            ("name", Value::from("")),
            ("description", Value::from("toolong")),
        ]))
        .with_catalog(Arc::new(catalog));
        v.rule("name", Rule::NotEmpty)
            .rule("description", Rule::MaxLength(3))
            .label("description", "Description");
        assert!(!v.check());

        let messages = v.errors(Some("models/role"), true);
        assert_eq!(messages["name"], "A role needs a name");
        assert_eq!(
            messages["description"],
            "Description must be less than 3 characters long"
        );

        let raw_names = v.errors(Some("models/role"), false);
        assert_eq!(
            raw_names["description"],
            "description must be less than 3 characters long"
        );
    }

    #[test]
    fn unknown_rule_falls_back_to_path() {
        let mut v = Validation::new(data(&[("name", Value::from("x"))]));
        v.error("name", "weird", Vec::new());
        assert_eq!(v.errors(Some("models/user"), false)["name"], "models/user.name.weird");
    }
}
