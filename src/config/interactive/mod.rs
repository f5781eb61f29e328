
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Password};

use super::{Config, ConfigError, ProviderConfig};

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("QC RAG Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir);

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used for embeddings and answers.");
    eprintln!();

    configure_provider(&mut config.provider)?;

    eprintln!();
    if config.provider.accept_invalid_certs {
        eprintln!(
            "{}",
            style("Warning: TLS certificate verification is disabled").yellow()
        );
    }

    eprintln!("{}", style("Testing configuration...").yellow());
    if test_provider_connection(&config.provider) {
        eprintln!("{}", style("Provider endpoint reachable").green());
    } else {
        eprintln!(
            "{}",
            style("Warning: Could not reach the provider endpoint").yellow()
        );
        eprintln!("You can continue, but indexing and queries will fail until it is reachable.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load_with_env(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    match config.provider_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  API Key: {}",
        style(if config.provider.api_key.is_some() {
            "set"
        } else {
            "not set"
        })
        .cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.provider.chat_model).cyan());
    eprintln!(
        "  Embedding Model: {}",
        style(&config.provider.embedding_model).cyan()
    );
    eprintln!("  Batch Size: {}", style(config.provider.batch_size).cyan());
    eprintln!(
        "  Verify TLS: {}",
        if config.provider.accept_invalid_certs {
            style("no").red()
        } else {
            style("yes").green()
        }
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Index:").bold().yellow());
    eprintln!(
        "  Persist Dir: {}",
        style(config.persist_dir().display()).cyan()
    );
    eprintln!("  Top K: {}", style(config.index.top_k).cyan());
    eprintln!("  Fields: {}", style(config.index.fields.join(", ")).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Config {
    Config::load(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No valid configuration found. Using defaults.").yellow()
            );
            Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            }
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            config
        },
    )
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Provider base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            ProviderConfig {
                base_url: input.clone(),
                ..ProviderConfig::default()
            }
            .url()
            .map(|_| ())
        })
        .interact_text()?;

    let api_key: String = Password::new()
        .with_prompt("API key (leave empty to keep current)")
        .allow_empty_password(true)
        .interact()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(provider.chat_model.clone())
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(provider.batch_size)
        .validate_with(|input: &u32| -> Result<(), &str> {
            if *input == 0 || *input > 2048 {
                Err("Batch size must be between 1 and 2048")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let accept_invalid_certs = Confirm::new()
        .with_prompt("Skip TLS certificate verification?")
        .default(provider.accept_invalid_certs)
        .interact()?;

    provider.set_base_url(base_url)?;
    if !api_key.trim().is_empty() {
        provider.api_key = Some(api_key);
    }
    provider.set_chat_model(chat_model)?;
    provider.set_embedding_model(embedding_model)?;
    provider.set_batch_size(batch_size)?;
    provider.accept_invalid_certs = accept_invalid_certs;

    Ok(())
}

fn test_provider_connection(provider: &ProviderConfig) -> bool {
    let Ok(url) = provider.url().and_then(|base| {
        base.join("models")
            .map_err(|_| ConfigError::InvalidUrl(provider.base_url.clone()))
    }) else {
        return false;
    };

    let agent = crate::embeddings::openai::build_agent(
        std::time::Duration::from_secs(5),
        provider.accept_invalid_certs,
    );

    match agent.get(url.as_str()).call() {
        Ok(_) => true,
        // Reachable but unauthorised still proves the endpoint exists
        Err(ureq::Error::StatusCode(code)) if (400..500).contains(&code) => true,
        Err(_) => false,
    }
}
