use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::models::{AncestorClosure, OntologyStats, ProbabilityMap, Term};
use crate::core::error::Result;

/// The precomputed state every distance query reads from.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OntologySnapshot {
    pub ancestors: AncestorClosure,
    pub probabilities: ProbabilityMap,
    #[serde(default)]
    pub roots: Vec<Term>,
    #[serde(default)]
    pub built_at: Option<DateTime<Utc>>,
}

impl OntologySnapshot {
    pub fn new(ancestors: AncestorClosure, probabilities: ProbabilityMap) -> Self {
        let mut snapshot = Self {
            ancestors,
            probabilities,
            roots: Vec::new(),
            built_at: None,
        };
        snapshot.normalize();
        snapshot
    }

    /// Registers each term as its own ancestor where a producer left it out.
    pub fn normalize(&mut self) {
        let mut repaired = 0usize;
        for (term, closure) in self.ancestors.iter_mut() {
            if closure.insert(term.clone()) {
                repaired += 1;
            }
        }
        if repaired > 0 {
            debug!("Added {} missing self-ancestor entries", repaired);
        }
    }

    pub fn stats(&self) -> OntologyStats {
        OntologyStats {
            total_terms: self.ancestors.len(),
            informative_terms: self.probabilities.len(),
            roots: self.roots.clone(),
            max_closure_size: self.ancestors.values().map(|c| c.len()).max().unwrap_or(0),
        }
    }

    pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
        serde_json::to_writer(writer, self)?;
        Ok(())
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut snapshot: Self = serde_json::from_reader(reader)?;
        snapshot.normalize();
        Ok(snapshot)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.to_writer(&mut writer)?;
        writer.flush()?;
        info!(
            "Snapshot saved to {} ({} terms, {} with probability)",
            path.display(),
            self.ancestors.len(),
            self.probabilities.len()
        );
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let snapshot = Self::from_reader(BufReader::new(File::open(path)?))?;
        info!(
            "Snapshot loaded from {} ({} terms, {} with probability)",
            path.display(),
            snapshot.ancestors.len(),
            snapshot.probabilities.len()
        );
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn small_snapshot() -> OntologySnapshot {
        let mut ancestors = AncestorClosure::new();
        ancestors.insert("A".into(), HashSet::from(["A".to_string()]));
        ancestors.insert("B".into(), HashSet::from(["A".to_string()]));
        let mut probabilities = ProbabilityMap::new();
        probabilities.insert("A".into(), 1.0);
        probabilities.insert("B".into(), 0.25);
        OntologySnapshot::new(ancestors, probabilities)
    }

    #[test]
    fn test_new_normalizes_self_inclusion() {
        let snapshot = small_snapshot();
        assert!(snapshot.ancestors["B"].contains("B"));
    }

    #[test]
    fn test_writer_reader_round_trip() {
        let mut snapshot = small_snapshot();
        snapshot.roots = vec!["A".into()];

        let mut buffer = Vec::new();
        snapshot.to_writer(&mut buffer).unwrap();
        let loaded = OntologySnapshot::from_reader(buffer.as_slice()).unwrap();

        assert_eq!(loaded.ancestors, snapshot.ancestors);
        assert_eq!(loaded.probabilities, snapshot.probabilities);
        assert_eq!(loaded.roots, vec!["A".to_string()]);
    }

    #[test]
    fn test_reader_accepts_bare_mappings() {
        let json = r#"{"ancestors": {"A": ["A"], "B": ["A"]}, "probabilities": {"A": 1.0}}"#;
        let loaded = OntologySnapshot::from_reader(json.as_bytes()).unwrap();

        assert!(loaded.ancestors["B"].contains("B"));
        assert!(loaded.roots.is_empty());
        assert!(loaded.built_at.is_none());
    }

    #[test]
    fn test_stats() {
        let stats = small_snapshot().stats();
        assert_eq!(stats.total_terms, 2);
        assert_eq!(stats.informative_terms, 2);
        assert_eq!(stats.max_closure_size, 2);
    }
}
