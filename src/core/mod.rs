

pub mod config;
pub mod error;

pub use self::config::SemDistConfig;
pub use error::{Result, SemDistError};
