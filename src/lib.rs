pub mod core;
pub mod distance;
pub mod ontology;
pub mod utils;

pub use crate::core::config::SemDistConfig;
pub use crate::core::error::{Result, SemDistError};
pub use distance::{DistanceEngine, DistanceMatrix};
pub use ontology::{IndexBuilder, OntologySnapshot, TermCatalog};


pub const DEFAULT_PAIR_CACHE_SIZE: usize = 10_000;


pub const DEFAULT_LOG_FILTER: &str = "semdist=info";
