//! Subcommand implementations and the state they share.

pub mod answer;
pub mod coursework;
pub mod generate;
pub mod grades;
pub mod init;
pub mod list_models;
pub mod quizzes;
pub mod validate;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use studyquiz_core::engine::StudyEngine;
use studyquiz_core::model::QuizId;
use studyquiz_core::store::MemoryStore;
use studyquiz_providers::StudyquizConfig;

/// Config plus the persisted quizzes and coursework of one invocation.
pub struct Workspace {
    pub config: StudyquizConfig,
    pub engine: StudyEngine,
    store: Arc<MemoryStore>,
    state_path: PathBuf,
}

impl Workspace {
    pub fn open(config_path: Option<&Path>, state_override: Option<PathBuf>) -> Result<Self> {
        let config = studyquiz_providers::load_config_from(config_path)?;
        let state_path = state_override.unwrap_or_else(|| config.state_file.clone());
        let store = Arc::new(MemoryStore::open_or_default(&state_path)?);
        let engine = StudyEngine::with_memory_store(config.ingestor(), store.clone());
        tracing::debug!(state = %state_path.display(), "workspace opened");
        Ok(Self {
            config,
            engine,
            store,
            state_path,
        })
    }

    /// Write quizzes and coursework back to the state file.
    pub fn save(&self) -> Result<()> {
        self.store.save_json(&self.state_path)
    }
}

pub(crate) fn parse_quiz_id(raw: &str) -> Result<QuizId> {
    raw.parse()
        .with_context(|| format!("invalid quiz id: {raw}"))
}

pub(crate) fn format_grade(grade: Option<f64>) -> String {
    grade
        .map(|g| format!("{g:.1}"))
        .unwrap_or_else(|| "-".to_string())
}
