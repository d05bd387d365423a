pub mod cache;
pub mod engine;
pub mod matrix;

pub use cache::{CacheStats, PairCache};
pub use engine::DistanceEngine;
pub use matrix::DistanceMatrix;
