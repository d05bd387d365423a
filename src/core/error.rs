use thiserror::Error;

use crate::ontology::Term;

#[derive(Error, Debug)]
pub enum SemDistError {
    #[error("Invalid ontology: {0}")]
    InvalidOntology(String),

    #[error("No information content for {}", quoted_terms(.0))]
    NoInformationContent(Vec<Term>),

    #[error("No ancestor for {}", quoted_terms(.0))]
    NoAncestor(Vec<Term>),

    #[error("Terms '{first}' and '{second}' have no common ancestor")]
    NoCommonAncestor { first: Term, second: Term },

    /// The index claims a shared ancestor is more specific than one of the
    /// two terms. Only a corrupted snapshot can produce this.
    #[error(
        "Invalid monotony: p({first}) = {p_first}, p({second}) = {p_second}, p_ms = {p_ms}"
    )]
    Monotonicity {
        first: Term,
        second: Term,
        p_first: f64,
        p_second: f64,
        p_ms: f64,
    },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("No data: {0}")]
    NoData(String),

    #[error("Distance matrix has no value for terms '{first}' and '{second}'")]
    MissingDistance { first: Term, second: Term },

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SemDistError {
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::Parse {
            line,
            message: message.into(),
        }
    }

    /// Fatal errors signal a corrupted index and are never skipped by `force`.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Monotonicity { .. })
    }
}

fn quoted_terms(terms: &[Term]) -> String {
    let plural = if terms.len() > 1 { "terms" } else { "term" };
    let list = terms
        .iter()
        .map(|t| format!("'{}'", t))
        .collect::<Vec<_>>()
        .join(", ");
    format!("{} {}", plural, list)
}

pub type Result<T> = std::result::Result<T, SemDistError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_term_message() {
        let err = SemDistError::NoInformationContent(vec!["GO:0008150".into()]);
        assert_eq!(err.to_string(), "No information content for term 'GO:0008150'");
    }

    #[test]
    fn test_plural_terms_message() {
        let err = SemDistError::NoAncestor(vec!["A".into(), "B".into()]);
        assert_eq!(err.to_string(), "No ancestor for terms 'A', 'B'");
    }

    #[test]
    fn test_only_monotonicity_is_fatal() {
        let fatal = SemDistError::Monotonicity {
            first: "A".into(),
            second: "B".into(),
            p_first: 0.5,
            p_second: 0.4,
            p_ms: 0.1,
        };
        assert!(fatal.is_fatal());
        assert!(!SemDistError::NoData("empty".into()).is_fatal());
        assert!(!SemDistError::NoInformationContent(vec!["A".into()]).is_fatal());
    }
}
