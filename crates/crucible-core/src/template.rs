//! Prompt template engine.
//!
//! Templates contain `{name}` placeholders. [`fill`] replaces every
//! occurrence of each placeholder that has a value and leaves the rest
//! untouched. Substituted values are never re-scanned, so a value that
//! itself contains `{question}` is inserted literally.

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

lazy_static! {
    static ref PLACEHOLDER: Regex = Regex::new(r"\{([A-Za-z_][A-Za-z0-9_]*)\}").unwrap();
    static ref PLACEHOLDER_KEY: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    /// The key could never match a `{name}` token.
    #[error("invalid placeholder key '{0}': use letters, digits, and '_', not starting with a digit")]
    InvalidKey(String),
}

/// Placeholders with a defined meaning in generation and evaluation prompts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Placeholder {
    TextToEvaluate,
    KnowledgeBase,
    Question,
    SystemPrompt,
    Criteria,
    JobTitle,
    JobDescription,
}

impl Placeholder {
    pub const ALL: [Placeholder; 7] = [
        Placeholder::TextToEvaluate,
        Placeholder::KnowledgeBase,
        Placeholder::Question,
        Placeholder::SystemPrompt,
        Placeholder::Criteria,
        Placeholder::JobTitle,
        Placeholder::JobDescription,
    ];

    /// The placeholder name without braces.
    pub fn key(&self) -> &'static str {
        match self {
            Placeholder::TextToEvaluate => "textToEvaluate",
            Placeholder::KnowledgeBase => "knowledgeBase",
            Placeholder::Question => "question",
            Placeholder::SystemPrompt => "systemPrompt",
            Placeholder::Criteria => "criteria",
            Placeholder::JobTitle => "jobTitle",
            Placeholder::JobDescription => "jobDescription",
        }
    }

    /// The placeholder as it appears in a template, e.g. `{question}`.
    pub fn token(&self) -> String {
        format!("{{{}}}", self.key())
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.key() == key)
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{{}}}", self.key())
    }
}

/// Values to substitute, keyed by placeholder name (without braces).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitutions {
    values: BTreeMap<String, String>,
}

impl Substitutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style [`Substitutions::set`].
    pub fn with(mut self, placeholder: Placeholder, value: impl Into<String>) -> Self {
        self.set(placeholder, value);
        self
    }

    pub fn set(&mut self, placeholder: Placeholder, value: impl Into<String>) {
        self.values.insert(placeholder.key().to_string(), value.into());
    }

    /// Insert a value under a custom key.
    ///
    /// Keys follow the `{name}` token syntax; anything else (`job-title`,
    /// `1st`) is rejected since [`fill`] would never substitute it.
    pub fn insert(
        &mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), TemplateError> {
        let key = key.into();
        if !PLACEHOLDER_KEY.is_match(&key) {
            return Err(TemplateError::InvalidKey(key));
        }
        self.values.insert(key, value.into());
        Ok(())
    }

    /// Build from `(key, value)` pairs, rejecting invalid keys.
    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Result<Self, TemplateError>
    where
        K: Into<String>,
        V: Into<String>,
    {
        let mut substitutions = Self::new();
        for (key, value) in pairs {
            substitutions.insert(key, value)?;
        }
        Ok(substitutions)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Copy every value from `other`, overwriting existing keys.
    pub fn extend(&mut self, other: &Substitutions) {
        for (key, value) in &other.values {
            self.values.insert(key.clone(), value.clone());
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Fill a template in a single pass.
///
/// Every `{key}` with a value in `substitutions` is replaced; unknown keys
/// stay as they are.
pub fn fill(template: &str, substitutions: &Substitutions) -> String {
    PLACEHOLDER
        .replace_all(template, |caps: &Captures| match substitutions.get(&caps[1]) {
            Some(value) => value.to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Placeholder names in order of first appearance.
pub fn placeholders(template: &str) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let key = caps[1].to_string();
        if !seen.contains(&key) {
            seen.push(key);
        }
    }
    seen
}

/// The recognized placeholders a template uses.
pub fn recognized_placeholders(template: &str) -> Vec<Placeholder> {
    placeholders(template)
        .iter()
        .filter_map(|key| Placeholder::from_key(key))
        .collect()
}
