//! The `studyquiz list-models` command.

use std::path::PathBuf;

use anyhow::Result;

use studyquiz_providers::create_provider;

pub fn execute(provider_filter: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let config = studyquiz_providers::load_config_from(config_path.as_deref())?;

    let mut names: Vec<&String> = config.providers.keys().collect();
    names.sort();

    let mut found_any = false;
    for name in names {
        if provider_filter.as_ref().is_some_and(|filter| filter != name) {
            continue;
        }

        let provider = create_provider(&config.providers[name], config.generation.timeout_secs)?;
        let models = provider.available_models();
        if models.is_empty() {
            continue;
        }

        found_any = true;
        println!("Provider: {name}");
        for model in &models {
            println!(
                "  {} — {} ({}K context, PDF: {})",
                model.id,
                model.name,
                model.max_context / 1000,
                if model.accepts_pdf { "yes" } else { "no" },
            );
        }
        println!();
    }

    if !found_any {
        println!("No providers configured. Run `studyquiz init` to create a config file.");
    }

    Ok(())
}
