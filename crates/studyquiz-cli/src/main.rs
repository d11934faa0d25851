//! studyquiz CLI: the user-facing command-line interface.

use std::path::PathBuf;
use std::process;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "studyquiz",
    version,
    about = "Generate practice quizzes from course material and track weighted grades"
)]
struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// State file path (overrides `state_file` from the config)
    #[arg(long, global = true)]
    state: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate a quiz from a document and assign it to a course
    Generate {
        /// PDF, text or markdown file
        #[arg(long)]
        file: PathBuf,

        /// Course the quiz belongs to
        #[arg(long)]
        course: String,

        /// Number of questions
        #[arg(long, default_value = "5")]
        questions: usize,

        /// Model to use (e.g. "anthropic/claude-3-5-sonnet-latest" or "gpt-4o")
        #[arg(long)]
        model: Option<String>,
    },

    /// List the quizzes of a course
    Quizzes {
        #[arg(long)]
        course: String,
    },

    /// Show a quiz: questions to answer, or the review once graded
    Show {
        #[arg(long)]
        quiz: String,
    },

    /// Answer and submit a quiz
    Answer {
        #[arg(long)]
        quiz: String,

        /// JSON object of question id to option label, inline or as a file path
        #[arg(long)]
        answers: String,
    },

    /// Manage weighted coursework items
    Coursework {
        #[command(subcommand)]
        action: commands::coursework::Action,
    },

    /// Show a course's coursework and final grade
    Grades {
        #[arg(long)]
        course: String,
    },

    /// Check an AI quiz payload against the quiz schema
    Validate {
        /// File holding the provider's reply
        #[arg(long)]
        file: PathBuf,

        /// Number of questions the payload must hold
        #[arg(long)]
        questions: usize,
    },

    /// List available models
    ListModels {
        /// Filter to specific provider
        #[arg(long)]
        provider: Option<String>,
    },

    /// Create a starter config
    Init,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("studyquiz=info".parse().unwrap()),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.config;
    let state = cli.state;

    let result = match cli.command {
        Commands::Generate {
            file,
            course,
            questions,
            model,
        } => commands::generate::execute(file, course, questions, model, config, state).await,
        Commands::Quizzes { course } => commands::quizzes::list(course, config, state),
        Commands::Show { quiz } => commands::quizzes::show(quiz, config, state),
        Commands::Answer { quiz, answers } => commands::answer::execute(quiz, answers, config, state),
        Commands::Coursework { action } => commands::coursework::execute(action, config, state),
        Commands::Grades { course } => commands::grades::execute(course, config, state),
        Commands::Validate { file, questions } => commands::validate::execute(file, questions),
        Commands::ListModels { provider } => commands::list_models::execute(provider, config),
        Commands::Init => commands::init::execute(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}
