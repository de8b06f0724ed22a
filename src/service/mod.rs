//! Service layer module

pub mod inference;
pub mod types;

pub use inference::InferencePipeline;
pub use types::*;
