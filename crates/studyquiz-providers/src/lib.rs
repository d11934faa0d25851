//! studyquiz-providers: LLM provider integrations.
//!
//! Implements the `LlmProvider` trait for Anthropic and OpenAI, both of
//! which accept PDF course material directly, plus a mock for tests.

pub mod anthropic;
pub mod config;
pub mod error;
pub mod mock;
pub mod openai;

pub use config::{create_provider, load_config, load_config_from, ProviderConfig, StudyquizConfig};
pub use error::ProviderError;
