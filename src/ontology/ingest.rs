use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::info;

use super::catalog::TermCatalog;
use super::models::{ParentRelation, UsageCounts};
use crate::core::error::{Result, SemDistError};

/// Non-empty, non-comment lines split on tabs, with their 1-based number.
fn records<R: BufRead>(reader: R) -> impl Iterator<Item = Result<(usize, Vec<String>)>> {
    reader.lines().enumerate().filter_map(|(idx, line)| match line {
        Err(e) => Some(Err(SemDistError::from(e))),
        Ok(line) => {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                None
            } else {
                Some(Ok((
                    idx + 1,
                    line.split('\t').map(|field| field.trim().to_string()).collect(),
                )))
            }
        }
    })
}

/// Reads `child<TAB>parent` lines. A child may appear on several lines.
pub fn read_parents<R: BufRead>(reader: R) -> Result<ParentRelation> {
    let mut parents = ParentRelation::new();
    let mut edges = 0usize;

    for record in records(reader) {
        let (line, fields) = record?;
        match fields.as_slice() {
            [child, parent] if !child.is_empty() && !parent.is_empty() => {
                parents.entry(child.clone()).or_default().insert(parent.clone());
                edges += 1;
            }
            _ => {
                return Err(SemDistError::parse(
                    line,
                    "expected 'child<TAB>parent'",
                ));
            }
        }
    }

    info!("{} relations loaded for {} terms", edges, parents.len());
    Ok(parents)
}

/// Reads usage lines: a bare `term` counts one occurrence, `term<TAB>count`
/// adds `count`. Repeated terms accumulate.
pub fn read_usage<R: BufRead>(reader: R) -> Result<UsageCounts> {
    let mut usage = UsageCounts::new();

    for record in records(reader) {
        let (line, fields) = record?;
        let (term, count) = match fields.as_slice() {
            [term] => (term, 1),
            [term, count] => {
                let count: i64 = count
                    .parse()
                    .map_err(|_| SemDistError::parse(line, format!("invalid count '{}'", count)))?;
                (term, count)
            }
            _ => return Err(SemDistError::parse(line, "expected 'term' or 'term<TAB>count'")),
        };
        let total = usage.entry(term.clone()).or_insert(0);
        *total = total
            .checked_add(count)
            .ok_or_else(|| SemDistError::parse(line, format!("usage count overflow for '{}'", term)))?;
    }

    info!("{} terms with declared usage", usage.len());
    Ok(usage)
}

/// Reads `term<TAB>category<TAB>name` lines.
pub fn read_catalog<R: BufRead>(reader: R) -> Result<TermCatalog> {
    let mut catalog = TermCatalog::new();

    for record in records(reader) {
        let (line, fields) = record?;
        match fields.as_slice() {
            [term, category, name] => catalog.insert(term.clone(), category.clone(), name.clone()),
            _ => {
                return Err(SemDistError::parse(
                    line,
                    "expected 'term<TAB>category<TAB>name'",
                ));
            }
        }
    }

    info!("{} catalog entries loaded", catalog.len());
    Ok(catalog)
}

pub fn load_parents(path: impl AsRef<Path>) -> Result<ParentRelation> {
    read_parents(BufReader::new(File::open(path)?))
}

pub fn load_usage(path: impl AsRef<Path>) -> Result<UsageCounts> {
    read_usage(BufReader::new(File::open(path)?))
}

pub fn load_catalog(path: impl AsRef<Path>) -> Result<TermCatalog> {
    read_catalog(BufReader::new(File::open(path)?))
}
