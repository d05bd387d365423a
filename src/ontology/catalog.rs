use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::models::Term;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TermInfo {
    pub category: String,
    pub name: String,
}

/// Human-readable names and categories (GO aspect, EC class, ...) of terms.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TermCatalog {
    terms: HashMap<Term, TermInfo>,
}

#[derive(Debug, Clone, Default)]
pub struct Classification {
    pub by_category: BTreeMap<String, Vec<Term>>,
    pub unknown: Vec<Term>,
}

impl TermCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, term: impl Into<Term>, category: impl Into<String>, name: impl Into<String>) {
        self.terms.insert(
            term.into(),
            TermInfo {
                category: category.into(),
                name: name.into(),
            },
        );
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> impl Iterator<Item = &Term> {
        self.terms.keys()
    }

    pub fn name(&self, term: &str) -> Option<&str> {
        self.terms.get(term).map(|info| info.name.as_str())
    }

    pub fn category(&self, term: &str) -> Option<&str> {
        self.terms.get(term).map(|info| info.category.as_str())
    }

    pub fn categories(&self) -> Vec<&str> {
        let mut categories: Vec<&str> = self.terms.values().map(|i| i.category.as_str()).collect();
        categories.sort_unstable();
        categories.dedup();
        categories
    }

    /// Terms of one category, sorted.
    pub fn terms_in(&self, category: &str) -> Vec<Term> {
        let mut terms: Vec<Term> = self
            .terms
            .iter()
            .filter(|(_, info)| info.category == category)
            .map(|(term, _)| term.clone())
            .collect();
        terms.sort();
        terms
    }

    /// Groups `terms` by category; every known category is present even
    /// when none of the given terms belongs to it.
    pub fn classify<S: AsRef<str>>(&self, terms: &[S]) -> Classification {
        let mut classification = Classification::default();
        for category in self.categories() {
            classification.by_category.insert(category.to_string(), Vec::new());
        }

        for term in terms {
            let term = term.as_ref();
            match self.terms.get(term) {
                Some(info) => classification
                    .by_category
                    .entry(info.category.clone())
                    .or_default()
                    .push(term.to_string()),
                None => {
                    debug!("classify(): unknown term '{}'", term);
                    classification.unknown.push(term.to_string());
                }
            }
        }

        classification
    }
}
