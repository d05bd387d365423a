pub mod builder;
pub mod catalog;
pub mod ingest;
pub mod models;
pub mod snapshot;

pub use builder::IndexBuilder;
pub use catalog::{Classification, TermCatalog, TermInfo};
pub use models::{
    AncestorClosure, OntologyStats, ParentRelation, ProbabilityMap, Term, UsageCounts,
    parent_relation, usage_counts,
};
pub use snapshot::OntologySnapshot;
