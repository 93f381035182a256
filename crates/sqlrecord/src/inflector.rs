//! Plural and singular forms of model and relation names.

use std::collections::{HashMap, HashSet};

/// Word inflection used to derive table names and relationship defaults.
///
/// Rules come from `pluralizer`; irregular and uncountable words registered
/// here take precedence.
#[derive(Debug, Clone, Default)]
pub struct Inflector {
    /// singular -> plural
    irregular: HashMap<String, String>,
    uncountable: HashSet<String>,
}

impl Inflector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an irregular word pair.
    pub fn irregular(mut self, singular: impl Into<String>, plural: impl Into<String>) -> Self {
        self.irregular
            .insert(singular.into().to_lowercase(), plural.into().to_lowercase());
        self
    }

    /// Register a word that has no distinct plural form.
    pub fn uncountable(mut self, word: impl Into<String>) -> Self {
        self.uncountable.insert(word.into().to_lowercase());
        self
    }

    /// The plural form of `word`.
    pub fn plural(&self, word: &str) -> String {
        if word.is_empty() || self.uncountable.contains(word) {
            return word.to_string();
        }
        if let Some(plural) = self.irregular.get(word) {
            return plural.clone();
        }
        if self.irregular.values().any(|p| p == word) {
            return word.to_string();
        }
        pluralizer::pluralize(word, 2, false)
    }

    /// The singular form of `word`.
    pub fn singular(&self, word: &str) -> String {
        if word.is_empty() || self.uncountable.contains(word) {
            return word.to_string();
        }
        if let Some((singular, _)) = self.irregular.iter().find(|(_, p)| *p == word) {
            return singular.clone();
        }
        if self.irregular.contains_key(word) {
            return word.to_string();
        }
        pluralizer::pluralize(word, 1, false)
    }
}
