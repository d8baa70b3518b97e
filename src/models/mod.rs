//! Domain models for the distributed cloud assistant.
//!
//! - [`ClusterInstance`]: a reachable cluster, central controller or subcloud.
//! - [`Session`]: one client conversation with its own memory and retrieval index.
//! - [`QueryOutcome`] / [`FeedReport`]: transient results of `ask` and `feed`.

mod instance;
mod query;
mod session;

pub use instance::*;
pub use query::*;
pub use session::*;
