use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;

use super::engine::DistanceEngine;
use crate::core::error::Result;
use crate::ontology::Term;
use crate::utils::{ordered_pair, unique};

/// Precomputed pairwise distances. Each unordered pair is stored once,
/// under its lexicographically smaller term.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DistanceMatrix {
    distances: BTreeMap<Term, BTreeMap<Term, f64>>,
}

impl DistanceMatrix {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, a: &str, b: &str, distance: f64) {
        let (first, second) = ordered_pair(a, b);
        self.distances
            .entry(first.to_string())
            .or_default()
            .insert(second.to_string(), distance);
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let (first, second) = ordered_pair(a, b);
        self.distances.get(first)?.get(second).copied()
    }

    /// Number of stored pairs.
    pub fn len(&self) -> usize {
        self.distances.values().map(BTreeMap::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Term, &Term, f64)> {
        self.distances
            .iter()
            .flat_map(|(a, row)| row.iter().map(move |(b, d)| (a, b, *d)))
    }

    /// Computes the distance of every pair of distinct `terms`, stopping at
    /// the first pair that cannot be compared.
    pub fn precompute<S: AsRef<str>>(engine: &DistanceEngine, terms: &[S]) -> Result<Self> {
        let mut terms = unique(terms);
        terms.sort_unstable();

        info!("Precomputing distances for {} terms", terms.len());

        let mut matrix = Self::new();
        for (i, a) in terms.iter().enumerate() {
            for b in &terms[i + 1..] {
                matrix.insert(a, b, engine.distance_between(a, b)?);
            }
        }

        info!("Distance matrix holds {} pairs", matrix.len());
        Ok(matrix)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Ok(serde_json::from_reader(BufReader::new(File::open(path)?))?)
    }
}
