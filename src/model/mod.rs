//! Data model: candidates and the validated value types they are built from.

pub mod candidate;
pub mod types;

pub use candidate::Candidate;
pub use types::{ModulePath, Namespace, ValidationError, Version};
