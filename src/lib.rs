//! Session-scoped, retrieval-augmented question answering over the live
//! Kubernetes and platform APIs of a distributed cloud.

pub mod api;
pub mod backend;
pub mod config;
pub mod error;
pub mod llm;
pub mod models;
pub mod registry;
pub mod retrieval;
pub mod router;
pub mod session;
