use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

pub type Term = String;

/// Term to its direct parents. The root is the only term without an entry.
pub type ParentRelation = HashMap<Term, HashSet<Term>>;

/// Declared usage per term. Missing terms count as 0.
pub type UsageCounts = HashMap<Term, i64>;

/// Term to every term reachable through parent edges, itself included.
pub type AncestorClosure = HashMap<Term, HashSet<Term>>;

/// Cumulative usage mass of a term relative to its root, in `(0, 1]`.
///
/// This is not the raw frequency of the term: the mass of every descendant
/// is folded into it, so the root always has probability 1. Terms without
/// any usage in their subtree are absent rather than mapped to 0.
pub type ProbabilityMap = HashMap<Term, f64>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OntologyStats {
    pub total_terms: usize,
    pub informative_terms: usize,
    pub roots: Vec<Term>,
    pub max_closure_size: usize,
}

/// Builds a [`ParentRelation`] from `(child, parent)` edges.
pub fn parent_relation<I, C, P>(edges: I) -> ParentRelation
where
    I: IntoIterator<Item = (C, P)>,
    C: Into<Term>,
    P: Into<Term>,
{
    let mut parents = ParentRelation::new();
    for (child, parent) in edges {
        parents.entry(child.into()).or_default().insert(parent.into());
    }
    parents
}

pub fn usage_counts<I, T>(counts: I) -> UsageCounts
where
    I: IntoIterator<Item = (T, i64)>,
    T: Into<Term>,
{
    counts.into_iter().map(|(t, c)| (t.into(), c)).collect()
}
