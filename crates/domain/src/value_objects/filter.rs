//! Target filters
//!
//! A filter is a conjunction of `key=value` terms. It stays unresolved in the
//! plan; backends turn it into concrete targets at run time.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

use crate::errors::DomainError;

/// One `key=value` term of a filter
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterTerm {
    pub key: String,
    pub value: String,
}

impl FilterTerm {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for FilterTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.key, self.value)
    }
}

/// Ordered set of `key=value` terms, all of which a target must match
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filter(Vec<FilterTerm>);

impl Filter {
    /// Wrap terms without checking they are non-empty
    #[must_use]
    pub const fn from_terms(terms: Vec<FilterTerm>) -> Self {
        Self(terms)
    }

    /// Create a filter with at least one term
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyFilter` when `terms` is empty.
    pub fn new(terms: Vec<FilterTerm>) -> Result<Self, DomainError> {
        if terms.is_empty() {
            return Err(DomainError::EmptyFilter);
        }
        Ok(Self(terms))
    }

    /// Single-term filter
    pub fn single(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self(vec![FilterTerm::new(key, value)])
    }

    #[must_use]
    pub fn terms(&self) -> &[FilterTerm] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Keys that appear more than once, in order of their second occurrence
    #[must_use]
    pub fn duplicate_keys(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.0
            .iter()
            .filter(|term| !seen.insert(term.key.as_str()))
            .map(|term| term.key.as_str())
            .collect()
    }

    /// Comma-separated form understood by label selectors (`k1=v1,k2=v2`)
    #[must_use]
    pub fn to_label_selector(&self) -> String {
        self.0
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Whether a set of labels satisfies every term
    pub fn matches<'a, I>(&self, labels: I) -> bool
    where
        I: IntoIterator<Item = (&'a str, &'a str)> + Clone,
    {
        self.0.iter().all(|term| {
            labels
                .clone()
                .into_iter()
                .any(|(k, v)| k == term.key && v == term.value)
        })
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.0.iter().map(ToString::to_string).collect();
        f.write_str(&rendered.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn staging() -> Filter {
        Filter::from_terms(vec![
            FilterTerm::new("env", "staging"),
            FilterTerm::new("tier", "web"),
        ])
    }

    #[test]
    fn empty_filter_is_rejected() {
        assert_eq!(Filter::new(Vec::new()), Err(DomainError::EmptyFilter));
    }

    #[test]
    fn display_uses_source_syntax() {
        assert_eq!(staging().to_string(), "env=staging tier=web");
    }

    #[test]
    fn label_selector_is_comma_joined() {
        assert_eq!(staging().to_label_selector(), "env=staging,tier=web");
    }

    #[test]
    fn reports_duplicate_keys() {
        let filter = Filter::from_terms(vec![
            FilterTerm::new("env", "a"),
            FilterTerm::new("env", "b"),
            FilterTerm::new("tier", "web"),
        ]);
        assert_eq!(filter.duplicate_keys(), vec!["env"]);
        assert!(staging().duplicate_keys().is_empty());
    }

    #[test]
    fn matches_requires_every_term() {
        let labels = [("env", "staging"), ("tier", "web"), ("team", "core")];
        assert!(staging().matches(labels));
        assert!(!staging().matches([("env", "staging")]));
    }
}
