//! The `studyquiz generate` command.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;

use studyquiz_core::generation::QuizGenerationService;
use studyquiz_core::model::CourseId;
use studyquiz_providers::config::parse_model_spec;
use studyquiz_providers::create_provider;

use super::Workspace;

pub async fn execute(
    file: PathBuf,
    course: String,
    questions: usize,
    model: Option<String>,
    config_path: Option<PathBuf>,
    state_path: Option<PathBuf>,
) -> Result<()> {
    let workspace = Workspace::open(config_path.as_deref(), state_path)?;
    let config = &workspace.config;

    let spec = model.unwrap_or_else(|| config.default_model.clone());
    let (provider_name, model_id) = parse_model_spec(&spec, &config.default_provider);
    let provider_config = config.providers.get(provider_name).with_context(|| {
        format!("provider '{provider_name}' not configured. Run `studyquiz init` to create a config file.")
    })?;
    let provider = create_provider(provider_config, config.generation.timeout_secs)?;
    let generator = QuizGenerationService::new(provider, config.generation_config(Some(model_id)));

    let doc = workspace.engine.ingestor().ingest_path(&file)?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_interrupt.cancel();
        }
    });

    println!("Generating {questions} questions from {} with {provider_name}/{model_id}...", doc.name);

    let course = CourseId::new(course);
    let quiz = workspace
        .engine
        .create_quiz_from_document(&generator, &course, &doc, questions, Some(&cancel))
        .await?;
    workspace.save()?;

    println!(
        "Created quiz '{}' ({} questions) for course {}",
        quiz.name,
        quiz.questions().len(),
        course
    );
    println!("Quiz id: {}", quiz.id);

    Ok(())
}
