//! The `studyquiz init` command.

use anyhow::Result;

use studyquiz_providers::config::CONFIG_FILE_NAME;

pub fn execute() -> Result<()> {
    if std::path::Path::new(CONFIG_FILE_NAME).exists() {
        println!("{CONFIG_FILE_NAME} already exists, skipping.");
    } else {
        std::fs::write(CONFIG_FILE_NAME, SAMPLE_CONFIG)?;
        println!("Created {CONFIG_FILE_NAME}");
    }

    println!("\nNext steps:");
    println!("  1. Edit {CONFIG_FILE_NAME} with your API keys");
    println!("  2. Run: studyquiz coursework add --course cs101 --name Midterm --weight 0.3");
    println!("  3. Run: studyquiz generate --file notes.pdf --course cs101 --questions 5");

    Ok(())
}

const SAMPLE_CONFIG: &str = r#"# studyquiz configuration

default_provider = "anthropic"
default_model = "claude-3-5-sonnet-latest"
max_tokens = 4000
temperature = 0.0
state_file = "./studyquiz-state.json"

[providers.anthropic]
type = "anthropic"
api_key = "${ANTHROPIC_API_KEY}"

[providers.openai]
type = "openai"
api_key = "${OPENAI_API_KEY}"

[generation]
timeout_secs = 120
options_per_question = 4
max_questions = 10
difficulty = "medium"

[ingest]
max_size_bytes = 10485760
allowed_types = ["application/pdf", "text/plain", "text/markdown"]
"#;
