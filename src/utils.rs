use std::collections::HashSet;

/// Removes duplicates while keeping the first occurrence of each term.
pub fn unique<S: AsRef<str>>(items: &[S]) -> Vec<&str> {
    let mut seen = HashSet::with_capacity(items.len());
    items
        .iter()
        .map(AsRef::as_ref)
        .filter(|item| seen.insert(*item))
        .collect()
}

#[inline]
pub fn ordered_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b { (a, b) } else { (b, a) }
}

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        None
    } else {
        Some(values.iter().sum::<f64>() / values.len() as f64)
    }
}
