use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::Utc;
use tracing::{debug, info, warn};

use super::models::{AncestorClosure, ParentRelation, ProbabilityMap, Term, UsageCounts};
use super::snapshot::OntologySnapshot;
use crate::core::error::{Result, SemDistError};

enum Visit {
    Enter(Term),
    Exit(Term),
}

/// Turns a parent relation and usage counts into an ancestor closure and a
/// probability map.
///
/// Work accumulates across calls, so independent sub-hierarchies (each with
/// its own root) can be processed one at a time with
/// [`find_ancestors`](Self::find_ancestors) and
/// [`calculate_probabilities`](Self::calculate_probabilities) before the
/// whole result is taken out with [`into_snapshot`](Self::into_snapshot).
pub struct IndexBuilder {
    parents: ParentRelation,
    usage: UsageCounts,
    ancestors: AncestorClosure,
    accumulated: HashMap<Term, u64>,
    probabilities: ProbabilityMap,
    roots: BTreeSet<Term>,
}

impl IndexBuilder {
    pub fn new(parents: ParentRelation, usage: UsageCounts) -> Result<Self> {
        let mut negative: Vec<_> = usage.iter().filter(|(_, count)| **count < 0).collect();
        negative.sort();
        if let Some((term, count)) = negative.first() {
            return Err(SemDistError::InvalidOntology(format!(
                "the term '{}' has an invalid usage count ({})",
                term, count
            )));
        }

        let mut declared: Vec<_> = parents.iter().collect();
        declared.sort_by(|a, b| a.0.cmp(b.0));
        for (term, term_parents) in declared {
            if term_parents.contains(term) {
                return Err(SemDistError::InvalidOntology(format!(
                    "the term '{}' is declared as its own parent",
                    term
                )));
            }
            if term_parents.is_empty() {
                return Err(SemDistError::InvalidOntology(format!(
                    "the term '{}' has been declared with no parent",
                    term
                )));
            }
        }

        debug!(
            "IndexBuilder initialized: {} terms with parents, {} usage entries",
            parents.len(),
            usage.len()
        );

        Ok(Self {
            parents,
            usage,
            ancestors: AncestorClosure::new(),
            accumulated: HashMap::new(),
            probabilities: ProbabilityMap::new(),
            roots: BTreeSet::new(),
        })
    }

    /// Runs the full pipeline over every declared term.
    pub fn build(mut self) -> Result<OntologySnapshot> {
        self.find_ancestors(None)?;
        self.calculate_probabilities(None)?;
        Ok(self.into_snapshot())
    }

    /// Computes the ancestor closure of `terms`, or of every term declared
    /// in the parent relation when `terms` is `None`. Every ancestor met on
    /// the way gets its own closure too.
    pub fn find_ancestors(&mut self, terms: Option<&[Term]>) -> Result<&AncestorClosure> {
        let mut targets: Vec<Term> = match terms {
            Some(terms) => terms.to_vec(),
            None => self.parents.keys().cloned().collect(),
        };
        targets.sort();

        info!("Finding ancestors for {} terms", targets.len());

        for term in &targets {
            self.close_over(term)?;
        }

        info!("Ancestor closure holds {} terms", self.ancestors.len());
        Ok(&self.ancestors)
    }

    fn close_over(&mut self, term: &str) -> Result<()> {
        if self.ancestors.contains_key(term) {
            return Ok(());
        }

        let mut in_progress: HashSet<Term> = HashSet::new();
        let mut stack = vec![Visit::Enter(term.to_string())];

        while let Some(visit) = stack.pop() {
            match visit {
                Visit::Enter(current) => {
                    if self.ancestors.contains_key(&current) {
                        continue;
                    }
                    if in_progress.contains(&current) {
                        return Err(cycle_error(&current));
                    }

                    in_progress.insert(current.clone());
                    stack.push(Visit::Exit(current.clone()));

                    if let Some(parents) = self.parents.get(&current) {
                        for parent in parents {
                            // a parent still open on the current path closes a cycle
                            if in_progress.contains(parent) {
                                return Err(cycle_error(parent));
                            }
                            if !self.ancestors.contains_key(parent) {
                                stack.push(Visit::Enter(parent.clone()));
                            }
                        }
                    }
                }
                Visit::Exit(current) => {
                    let mut closure = HashSet::new();
                    if let Some(parents) = self.parents.get(&current) {
                        for parent in parents {
                            if let Some(parent_closure) = self.ancestors.get(parent) {
                                closure.extend(parent_closure.iter().cloned());
                            }
                        }
                    }
                    closure.insert(current.clone());
                    in_progress.remove(&current);
                    self.ancestors.insert(current, closure);
                }
            }
        }

        Ok(())
    }

    /// Propagates usage counts up the closure and converts them into
    /// probabilities relative to the root of the processed scope.
    ///
    /// The scope is the union of the closures of `terms` (every computed
    /// closure when `None`) and must contain exactly one root.
    pub fn calculate_probabilities(&mut self, terms: Option<&[Term]>) -> Result<&ProbabilityMap> {
        let scope: HashSet<Term> = match terms {
            Some(terms) => {
                let mut scope = HashSet::new();
                for term in terms {
                    self.close_over(term)?;
                    if let Some(closure) = self.ancestors.get(term) {
                        scope.extend(closure.iter().cloned());
                    }
                }
                scope
            }
            None => {
                if self.ancestors.is_empty() {
                    self.find_ancestors(None)?;
                }
                self.ancestors.keys().cloned().collect()
            }
        };

        let root = self.find_root(&scope)?;
        debug!("Calculating probabilities for {} terms under root '{}'", scope.len(), root);

        let mut accumulated: HashMap<&str, u64> = scope
            .iter()
            .map(|term| (term.as_str(), self.declared_usage(term)))
            .collect();

        for term in &scope {
            let usage = self.declared_usage(term);
            if usage == 0 || *term == root {
                continue;
            }
            for ancestor in &self.ancestors[term] {
                // the term's own usage is already part of its count
                if ancestor != term {
                    if let Some(count) = accumulated.get_mut(ancestor.as_str()) {
                        *count = count.checked_add(usage).ok_or_else(|| {
                            SemDistError::InvalidOntology(format!(
                                "usage overflow while accumulating into term '{}'",
                                ancestor
                            ))
                        })?;
                    }
                }
            }
        }

        let total = accumulated.get(root.as_str()).copied().unwrap_or(0);
        if total == 0 {
            warn!("No usage recorded under root '{}', no probability computed", root);
            self.roots.insert(root);
            return Ok(&self.probabilities);
        }

        let mut informative = 0usize;
        for (term, count) in &accumulated {
            // a term shared with an earlier scope keeps its first value
            if *count == 0 || self.probabilities.contains_key(*term) {
                continue;
            }
            let probability = *count as f64 / total as f64;
            if !(probability > 0.0 && probability <= 1.0) {
                return Err(SemDistError::InvalidOntology(format!(
                    "probability not in ]0;1] for term '{}' (value is {})",
                    term, probability
                )));
            }
            self.probabilities.insert((*term).to_string(), probability);
            informative += 1;
        }

        for (term, count) in accumulated {
            self.accumulated.entry(term.to_string()).or_insert(count);
        }

        info!(
            "Probabilities computed: root '{}' total usage {}, {}/{} terms informative",
            root,
            total,
            informative,
            scope.len()
        );

        self.roots.insert(root);
        Ok(&self.probabilities)
    }

    fn find_root(&self, scope: &HashSet<Term>) -> Result<Term> {
        let mut roots: Vec<&Term> = scope
            .iter()
            .filter(|term| !self.parents.contains_key(*term))
            .collect();
        roots.sort();

        match roots.as_slice() {
            [root] => Ok((*root).clone()),
            [] => Err(SemDistError::InvalidOntology(
                "the ontology contains no root".to_string(),
            )),
            many => Err(SemDistError::InvalidOntology(format!(
                "the ontology has more than one root: {}",
                many.iter()
                    .map(|t| format!("'{}'", t))
                    .collect::<Vec<_>>()
                    .join(", ")
            ))),
        }
    }

    fn declared_usage(&self, term: &str) -> u64 {
        self.usage
            .get(term)
            .map(|count| (*count).max(0) as u64)
            .unwrap_or(0)
    }

    pub fn ancestors(&self) -> &AncestorClosure {
        &self.ancestors
    }

    pub fn probabilities(&self) -> &ProbabilityMap {
        &self.probabilities
    }

    /// Usage of the term plus the usage of every distinct descendant, as
    /// computed by the first probability pass covering it.
    pub fn accumulated_usage(&self, term: &str) -> Option<u64> {
        self.accumulated.get(term).copied()
    }

    pub fn roots(&self) -> impl Iterator<Item = &Term> {
        self.roots.iter()
    }

    pub fn into_snapshot(self) -> OntologySnapshot {
        OntologySnapshot {
            ancestors: self.ancestors,
            probabilities: self.probabilities,
            roots: self.roots.into_iter().collect(),
            built_at: Some(Utc::now()),
        }
    }
}

fn cycle_error(term: &str) -> SemDistError {
    SemDistError::InvalidOntology(format!("the term '{}' is part of a cycle", term))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ontology::models::{parent_relation, usage_counts};

    fn diamond_parents() -> ParentRelation {
        parent_relation([
            ("B", "A"),
            ("C", "B"),
            ("C", "E"),
            ("D", "C"),
            ("E", "A"),
            ("F", "C"),
        ])
    }

    fn diamond_usage() -> UsageCounts {
        usage_counts([("A", 3), ("B", 5), ("C", 2), ("D", 5), ("E", 2), ("F", 2)])
    }

    fn diamond_builder() -> IndexBuilder {
        let mut builder = IndexBuilder::new(diamond_parents(), diamond_usage()).unwrap();
        builder.find_ancestors(None).unwrap();
        builder.calculate_probabilities(None).unwrap();
        builder
    }

    fn set(terms: &[&str]) -> HashSet<Term> {
        terms.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn test_closure_of_diamond() {
        let builder = diamond_builder();
        let ancestors = builder.ancestors();

        assert_eq!(ancestors["A"], set(&["A"]));
        assert_eq!(ancestors["B"], set(&["A", "B"]));
        assert_eq!(ancestors["C"], set(&["A", "B", "C", "E"]));
        assert_eq!(ancestors["D"], set(&["A", "B", "C", "D", "E"]));
        assert_eq!(ancestors["F"], set(&["A", "B", "C", "E", "F"]));
    }

    #[test]
    fn test_closure_self_inclusion_and_parent_inclusion() {
        let builder = diamond_builder();
        let parents = diamond_parents();

        for (term, closure) in builder.ancestors() {
            assert!(closure.contains(term), "{} missing from its own closure", term);
        }
        for (term, term_parents) in &parents {
            for parent in term_parents {
                assert!(builder.ancestors()[parent].is_subset(&builder.ancestors()[term]));
            }
        }
    }

    #[test]
    fn test_diamond_is_not_double_counted() {
        let builder = diamond_builder();

        assert_eq!(builder.accumulated_usage("A"), Some(19));
        assert_eq!(builder.accumulated_usage("B"), Some(14));
        assert_eq!(builder.accumulated_usage("E"), Some(11));
        assert_eq!(builder.accumulated_usage("C"), Some(9));
        assert_eq!(builder.accumulated_usage("D"), Some(5));
        assert_eq!(builder.accumulated_usage("F"), Some(2));
    }

    #[test]
    fn test_probabilities() {
        let builder = diamond_builder();
        let p = builder.probabilities();

        assert_eq!(p["A"], 1.0);
        assert!((p["B"] - 14.0 / 19.0).abs() < 1e-12);
        assert!((p["C"] - 9.0 / 19.0).abs() < 1e-12);
        assert!((p["F"] - 2.0 / 19.0).abs() < 1e-12);
        for value in p.values() {
            assert!(*value > 0.0 && *value <= 1.0);
        }
    }

    #[test]
    fn test_unused_terms_have_no_probability() {
        let parents = parent_relation([("B", "A"), ("C", "A"), ("D", "C")]);
        let usage = usage_counts([("B", 4), ("C", 0)]);
        let snapshot = IndexBuilder::new(parents, usage).unwrap().build().unwrap();

        assert!(snapshot.probabilities.contains_key("A"));
        assert!(snapshot.probabilities.contains_key("B"));
        assert!(!snapshot.probabilities.contains_key("C"));
        assert!(!snapshot.probabilities.contains_key("D"));
        assert!(snapshot.ancestors.contains_key("D"));
    }

    #[test]
    fn test_used_root_only() {
        let parents = parent_relation([("B", "A")]);
        let usage = usage_counts([("A", 7)]);
        let snapshot = IndexBuilder::new(parents, usage).unwrap().build().unwrap();

        assert_eq!(snapshot.probabilities.get("A"), Some(&1.0));
        assert_eq!(snapshot.probabilities.get("B"), None);
    }

    #[test]
    fn test_no_usage_at_all() {
        let parents = parent_relation([("B", "A")]);
        let snapshot = IndexBuilder::new(parents, UsageCounts::new()).unwrap().build().unwrap();

        assert!(snapshot.probabilities.is_empty());
        assert_eq!(snapshot.roots, vec!["A".to_string()]);
    }

    #[test]
    fn test_negative_usage_rejected() {
        let result = IndexBuilder::new(diamond_parents(), usage_counts([("B", -1)]));
        assert!(matches!(result, Err(SemDistError::InvalidOntology(msg)) if msg.contains("'B'")));
    }

    #[test]
    fn test_self_parent_rejected() {
        let parents = parent_relation([("B", "A"), ("B", "B")]);
        let result = IndexBuilder::new(parents, UsageCounts::new());
        assert!(matches!(result, Err(SemDistError::InvalidOntology(msg)) if msg.contains("own parent")));
    }

    #[test]
    fn test_empty_parent_set_rejected() {
        let mut parents = parent_relation([("B", "A")]);
        parents.insert("C".to_string(), HashSet::new());
        let result = IndexBuilder::new(parents, UsageCounts::new());
        assert!(matches!(result, Err(SemDistError::InvalidOntology(msg)) if msg.contains("no parent")));
    }

    #[test]
    fn test_multiple_roots_rejected() {
        let parents = parent_relation([("B", "A"), ("D", "C")]);
        let usage = usage_counts([("B", 1), ("D", 1)]);
        let result = IndexBuilder::new(parents, usage).unwrap().build();
        assert!(matches!(result, Err(SemDistError::InvalidOntology(msg)) if msg.contains("more than one root")));
    }

    #[test]
    fn test_cycle_rejected() {
        let parents = parent_relation([("B", "A"), ("C", "D"), ("D", "E"), ("E", "C")]);
        let result = IndexBuilder::new(parents, UsageCounts::new()).unwrap().build();
        assert!(matches!(result, Err(SemDistError::InvalidOntology(msg)) if msg.contains("cycle")));
    }

    #[test]
    fn test_partial_computation_per_sub_hierarchy() {
        let parents = parent_relation([("B", "A"), ("C", "B"), ("Y", "X"), ("Z", "X")]);
        let usage = usage_counts([("B", 1), ("C", 3), ("Y", 2), ("Z", 2)]);
        let mut builder = IndexBuilder::new(parents, usage).unwrap();

        let first: Vec<Term> = vec!["B".into(), "C".into()];
        let second: Vec<Term> = vec!["Y".into(), "Z".into()];

        builder.find_ancestors(Some(&first)).unwrap();
        builder.calculate_probabilities(Some(&first)).unwrap();
        assert!(!builder.ancestors().contains_key("Y"));

        builder.find_ancestors(Some(&second)).unwrap();
        builder.calculate_probabilities(Some(&second)).unwrap();

        assert_eq!(builder.accumulated_usage("A"), Some(4));
        assert_eq!(builder.accumulated_usage("X"), Some(4));
        assert!((builder.probabilities()["C"] - 0.75).abs() < 1e-12);
        assert!((builder.probabilities()["Y"] - 0.5).abs() < 1e-12);

        let snapshot = builder.into_snapshot();
        assert_eq!(snapshot.roots, vec!["A".to_string(), "X".to_string()]);
    }

    #[test]
    fn test_overlapping_scopes_keep_first_value() {
        let parents = parent_relation([("B", "A"), ("C", "B"), ("D", "B")]);
        let usage = usage_counts([("B", 1), ("C", 3), ("D", 1)]);
        let mut builder = IndexBuilder::new(parents, usage).unwrap();

        let first: Vec<Term> = vec!["C".into()];
        let both: Vec<Term> = vec!["C".into(), "D".into()];

        builder.calculate_probabilities(Some(&first)).unwrap();
        assert!((builder.probabilities()["C"] - 0.75).abs() < 1e-12);

        builder.calculate_probabilities(Some(&both)).unwrap();
        assert!((builder.probabilities()["C"] - 0.75).abs() < 1e-12);
        assert!((builder.probabilities()["D"] - 0.2).abs() < 1e-12);
        assert_eq!(builder.accumulated_usage("A"), Some(4));
        assert_eq!(builder.roots().collect::<Vec<_>>(), vec!["A"]);
    }

    #[test]
    fn test_usage_overflow_rejected() {
        let parents = parent_relation([("B", "A"), ("C", "A"), ("D", "A")]);
        let usage = usage_counts([("B", i64::MAX), ("C", i64::MAX), ("D", i64::MAX)]);
        let result = IndexBuilder::new(parents, usage).unwrap().build();
        assert!(matches!(result, Err(SemDistError::InvalidOntology(msg)) if msg.contains("overflow")));
    }

    #[test]
    fn test_deep_chain_does_not_recurse() {
        let edges: Vec<(String, String)> = (1..2_000)
            .map(|i| (format!("T{}", i), format!("T{}", i - 1)))
            .collect();
        let usage = usage_counts([("T1999", 1)]);
        let mut builder = IndexBuilder::new(parent_relation(edges), usage).unwrap();

        let leaf = vec!["T1999".to_string()];
        builder.find_ancestors(Some(&leaf)).unwrap();
        builder.calculate_probabilities(Some(&leaf)).unwrap();

        assert_eq!(builder.ancestors()["T1999"].len(), 2_000);
        assert_eq!(builder.probabilities()["T0"], 1.0);
    }
}
