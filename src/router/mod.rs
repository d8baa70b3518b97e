//! Model-driven classification steps of the query pipeline.
//!
//! Each classifier issues one narrowly constrained completion and maps the
//! reply onto a closed set of outcomes. Replies outside that set are never
//! guessed at.

mod pool;
mod resolver;
mod sufficiency;

pub use pool::PoolClassifier;
pub use resolver::InstanceResolver;
pub use sufficiency::SufficiencyClassifier;

/// Temperature used for every classification prompt.
pub(crate) const CLASSIFIER_TEMPERATURE: f32 = 0.0;
