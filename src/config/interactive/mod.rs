use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{Config, ConfigError, ProviderConfig, StudyConfig};

pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("Studymate Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Model Provider").bold().yellow());
    eprintln!("Configure the OpenAI-compatible provider used for chat, summaries and embeddings.");
    eprintln!();

    configure_provider(&mut config.provider)?;

    eprintln!();
    eprintln!("{}", style("Study Settings").bold().yellow());
    configure_study(&mut config.study)?;

    eprintln!();
    if std::env::var(&config.provider.api_key_env).is_ok() {
        eprintln!(
            "{}",
            style(format!("✓ {} is set", config.provider.api_key_env)).green()
        );
    } else {
        eprintln!(
            "{}",
            style(format!(
                "⚠ Warning: {} is not set; ingestion, quiz and chat will fail without it",
                config.provider.api_key_env
            ))
            .yellow()
        );
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());

        let config_path = Config::config_file_path().context("Failed to get config file path")?;
        eprintln!(
            "Configuration saved to: {}",
            style(config_path.display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

pub fn show_config() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.provider.base_url).cyan());
    eprintln!(
        "  Chat model: {}",
        style(&config.provider.chat_model).cyan()
    );
    eprintln!(
        "  Embedding model: {}",
        style(&config.provider.embedding_model).cyan()
    );
    eprintln!(
        "  API key variable: {}",
        style(&config.provider.api_key_env).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Study Settings:").bold().yellow());
    eprintln!("  Language: {}", style(&config.study.language).cyan());
    eprintln!("  Quiz size: {}", style(config.study.quiz_size).cyan());

    let config_path = Config::config_file_path().context("Failed to get config file path")?;
    eprintln!();
    eprintln!("Config file: {}", style(config_path.display()).dim());

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config::default())
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Provider base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            url::Url::parse(input)
                .map(|_| ())
                .map_err(|_| ConfigError::InvalidUrl(input.clone()))
        })
        .interact_text()?;
    provider.base_url = base_url;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(provider.chat_model.clone())
        .interact_text()?;
    provider.chat_model = chat_model;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .interact_text()?;
    provider.embedding_model = embedding_model;

    let api_key_env: String = Input::new()
        .with_prompt("API key environment variable")
        .default(provider.api_key_env.clone())
        .interact_text()?;
    provider.api_key_env = api_key_env;

    Ok(())
}

fn configure_study(study: &mut StudyConfig) -> Result<()> {
    let language: String = Input::new()
        .with_prompt("Answer language")
        .default(study.language.clone())
        .interact_text()?;
    study.language = language;

    let quiz_size: u32 = Input::new()
        .with_prompt("Questions per quiz")
        .default(study.quiz_size)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            if *input == 0 || *input > 50 {
                Err(ConfigError::InvalidQuizSize(*input))
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    study.quiz_size = quiz_size;

    Ok(())
}
