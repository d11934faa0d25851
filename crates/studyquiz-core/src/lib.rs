//! studyquiz-core: Quiz lifecycle and weighted grade engines.
//!
//! This crate defines the data model, the provider trait, quiz generation and
//! grading, and the coursework registry that the rest of studyquiz builds on.

pub mod aggregate;
pub mod engine;
pub mod error;
pub mod generation;
pub mod grader;
pub mod ingest;
pub mod model;
pub mod parser;
pub mod registry;
pub mod state;
pub mod store;
pub mod traits;

pub use error::{Error, ProviderError};
