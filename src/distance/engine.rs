use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, warn};

use super::cache::{CacheStats, PairCache};
use super::matrix::DistanceMatrix;
use crate::core::error::{Result, SemDistError};
use crate::ontology::{OntologySnapshot, Term};
use crate::utils::{mean, unique};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Side {
    First,
    Second,
}

/// Answers similarity queries against a fixed [`OntologySnapshot`].
///
/// Distances follow Lin's measure,
/// `1 - 2 ln(p_ms) / (ln p(a) + ln p(b))`, where `p_ms` is the probability
/// of the most specific ancestor shared by both terms. Nothing in the
/// snapshot is mutated, so one engine can serve any number of threads.
pub struct DistanceEngine {
    snapshot: Arc<OntologySnapshot>,
    matrix: Option<Arc<DistanceMatrix>>,
    cache: Option<PairCache>,
}

impl DistanceEngine {
    pub fn new(snapshot: Arc<OntologySnapshot>) -> Result<Self> {
        let mut invalid: Vec<(&Term, &f64)> = snapshot
            .probabilities
            .iter()
            .filter(|(_, p)| !(**p > 0.0 && **p <= 1.0))
            .collect();
        invalid.sort_by(|a, b| a.0.cmp(b.0));
        if let Some((term, p)) = invalid.first() {
            return Err(SemDistError::InvalidOntology(format!(
                "the term '{}' has an invalid probability ({})",
                term, p
            )));
        }

        info!(
            "DistanceEngine ready: {} terms, {} with information content",
            snapshot.ancestors.len(),
            snapshot.probabilities.len()
        );

        Ok(Self {
            snapshot,
            matrix: None,
            cache: None,
        })
    }

    /// Answers pairwise queries from `matrix` instead of the formula.
    pub fn with_matrix(mut self, matrix: Arc<DistanceMatrix>) -> Self {
        self.matrix = Some(matrix);
        self
    }

    pub fn with_pair_cache(mut self, capacity: usize) -> Self {
        self.cache = PairCache::new(capacity);
        self
    }

    pub fn snapshot(&self) -> &Arc<OntologySnapshot> {
        &self.snapshot
    }

    pub fn ancestors(&self, term: &str) -> Option<&HashSet<Term>> {
        self.snapshot.ancestors.get(term)
    }

    pub fn probability(&self, term: &str) -> Option<f64> {
        self.snapshot.probabilities.get(term).copied()
    }

    /// `-ln p(term)`: 0 for the root, growing with specificity.
    pub fn information_content(&self, term: &str) -> Option<f64> {
        self.probability(term).map(|p| -p.ln())
    }

    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_ref().map(PairCache::stats)
    }

    pub fn distance_between(&self, a: &str, b: &str) -> Result<f64> {
        if a == b {
            return Ok(0.0);
        }

        if let Some(matrix) = &self.matrix {
            return matrix.get(a, b).ok_or_else(|| SemDistError::MissingDistance {
                first: a.to_string(),
                second: b.to_string(),
            });
        }

        if let Some(distance) = self.cache.as_ref().and_then(|c| c.get(a, b)) {
            return Ok(distance);
        }

        let distance = self.lin_distance(a, b)?;
        if let Some(cache) = &self.cache {
            cache.set(a, b, distance);
        }
        Ok(distance)
    }

    fn lin_distance(&self, a: &str, b: &str) -> Result<f64> {
        let probabilities = &self.snapshot.probabilities;
        let (p_a, p_b) = match (probabilities.get(a), probabilities.get(b)) {
            (Some(p_a), Some(p_b)) => (*p_a, *p_b),
            _ => {
                let missing = [a, b]
                    .into_iter()
                    .filter(|t| !probabilities.contains_key(*t))
                    .map(str::to_string)
                    .collect();
                return Err(SemDistError::NoInformationContent(missing));
            }
        };

        let ancestors = &self.snapshot.ancestors;
        let (ancestors_a, ancestors_b) = match (ancestors.get(a), ancestors.get(b)) {
            (Some(x), Some(y)) => (x, y),
            _ => {
                let missing = [a, b]
                    .into_iter()
                    .filter(|t| !ancestors.contains_key(*t))
                    .map(str::to_string)
                    .collect();
                return Err(SemDistError::NoAncestor(missing));
            }
        };

        let (smaller, larger) = if ancestors_a.len() <= ancestors_b.len() {
            (ancestors_a, ancestors_b)
        } else {
            (ancestors_b, ancestors_a)
        };

        let mut shared = 0usize;
        let mut without_ic = Vec::new();
        let mut p_ms = f64::INFINITY;
        for ancestor in smaller.iter().filter(|t| larger.contains(*t)) {
            shared += 1;
            match probabilities.get(ancestor) {
                Some(p) => p_ms = p_ms.min(*p),
                None => without_ic.push(ancestor.clone()),
            }
        }

        if shared == 0 {
            return Err(SemDistError::NoCommonAncestor {
                first: a.to_string(),
                second: b.to_string(),
            });
        }
        if !without_ic.is_empty() {
            without_ic.sort();
            return Err(SemDistError::NoInformationContent(without_ic));
        }

        if p_ms < p_a || p_ms < p_b {
            return Err(SemDistError::Monotonicity {
                first: a.to_string(),
                second: b.to_string(),
                p_first: p_a,
                p_second: p_b,
                p_ms,
            });
        }

        let denominator = p_a.ln() + p_b.ln();
        if denominator == 0.0 {
            // both terms carry the whole mass of their root
            return Ok(0.0);
        }

        Ok(1.0 - 2.0 * p_ms.ln() / denominator)
    }

    /// Mean, over every term of both sets, of its smallest distance to the
    /// other set. With `force`, pairs that cannot be compared are skipped.
    pub fn distance_between_sets<S: AsRef<str>>(
        &self,
        first: &[S],
        second: &[S],
        force: bool,
    ) -> Result<f64> {
        let first = unique(first);
        let second = unique(second);

        if first.is_empty() {
            return Err(SemDistError::InvalidArgument(
                "the first set must contain at least one term".to_string(),
            ));
        }
        if second.is_empty() {
            return Err(SemDistError::InvalidArgument(
                "the second set must contain at least one term".to_string(),
            ));
        }

        let mut minima: HashMap<(Side, &str), f64> = HashMap::new();
        let mut skipped = 0usize;

        for term_a in &first {
            for term_b in &second {
                let distance = match self.distance_between(term_a, term_b) {
                    Ok(d) => d,
                    Err(e) if force && !e.is_fatal() => {
                        debug!("Skipping pair ('{}', '{}'): {}", term_a, term_b, e);
                        skipped += 1;
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                for key in [(Side::First, *term_a), (Side::Second, *term_b)] {
                    minima
                        .entry(key)
                        .and_modify(|best| *best = best.min(distance))
                        .or_insert(distance);
                }
            }
        }

        if skipped > 0 {
            warn!(
                "distance_between_sets(): {} of {} pairs skipped",
                skipped,
                first.len() * second.len()
            );
        }

        let minima: Vec<f64> = minima.into_values().collect();
        mean(&minima).ok_or_else(|| {
            SemDistError::NoData("no pairwise distance could be computed between the sets".to_string())
        })
    }

    /// The most informative ancestor shared by every known term of `terms`
    /// (terms themselves included), or `None` when no shared ancestor has a
    /// probability. Ties go to the lexicographically smallest term.
    pub fn best_common_ancestor<S: AsRef<str>>(&self, terms: &[S]) -> Result<Option<Term>> {
        let closures: Vec<&HashSet<Term>> = unique(terms)
            .into_iter()
            .filter_map(|t| self.snapshot.ancestors.get(t))
            .collect();

        let Some((first, rest)) = closures.split_first() else {
            return Err(SemDistError::InvalidArgument(
                "none of the given terms has known ancestors".to_string(),
            ));
        };

        let best = first
            .iter()
            .filter(|ancestor| rest.iter().all(|closure| closure.contains(*ancestor)))
            .filter_map(|ancestor| {
                self.snapshot
                    .probabilities
                    .get(ancestor)
                    .map(|p| (ancestor, *p))
            })
            .min_by(|(t1, p1), (t2, p2)| {
                p1.partial_cmp(p2)
                    .unwrap_or(Ordering::Equal)
                    .then_with(|| t1.cmp(t2))
            })
            .map(|(ancestor, _)| ancestor.clone());

        Ok(best)
    }

    /// Mean pairwise distance within a group of at least two distinct terms.
    pub fn dispersion<S: AsRef<str>>(&self, terms: &[S], force: bool) -> Result<f64> {
        let terms = unique(terms);
        if terms.len() < 2 {
            return Err(SemDistError::InvalidArgument(
                "at least two distinct terms are required".to_string(),
            ));
        }

        let mut distances = Vec::with_capacity(terms.len() * (terms.len() - 1) / 2);
        let mut skipped = 0usize;

        for (i, term_a) in terms.iter().enumerate() {
            for term_b in &terms[i + 1..] {
                match self.distance_between(term_a, term_b) {
                    Ok(d) => distances.push(d),
                    Err(e) if force && !e.is_fatal() => {
                        debug!("Skipping pair ('{}', '{}'): {}", term_a, term_b, e);
                        skipped += 1;
                    }
                    Err(e) => return Err(e),
                }
            }
        }

        if skipped > 0 {
            warn!("dispersion(): {} pairs skipped", skipped);
        }

        mean(&distances).ok_or_else(|| {
            SemDistError::NoData("no pairwise distance could be computed within the group".to_string())
        })
    }

    pub fn exclude_without_information_content<S: AsRef<str>>(&self, terms: &[S]) -> Vec<Term> {
        terms
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| self.snapshot.probabilities.contains_key(*t))
            .map(str::to_string)
            .collect()
    }

    /// Keeps only the most specific terms: any term that is an ancestor of
    /// another listed term is dropped.
    pub fn exclude_ancestors<S: AsRef<str>>(&self, terms: &[S]) -> Vec<Term> {
        let present: HashSet<&str> = terms.iter().map(AsRef::as_ref).collect();
        let mut excluded: HashSet<&str> = HashSet::new();

        for term in &present {
            if let Some(closure) = self.snapshot.ancestors.get(*term) {
                for ancestor in closure {
                    if ancestor != term && present.contains(ancestor.as_str()) {
                        excluded.insert(ancestor.as_str());
                    }
                }
            }
        }

        terms
            .iter()
            .map(AsRef::as_ref)
            .filter(|t| !excluded.contains(t))
            .map(str::to_string)
            .collect()
    }
}
