
use std::path::Path;

use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};

use super::{AssistantConfig, Config, IndexConfig, ProviderConfig};
use crate::providers::Credentials;
use crate::store::KnowledgeBase;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 Game Memory Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Provider Configuration").bold().yellow());
    eprintln!("Configure the OpenAI-compatible endpoint used for embeddings and answers.");
    eprintln!();
    configure_provider(&mut config.provider)?;

    eprintln!();
    eprintln!("{}", style("Index Configuration").bold().yellow());
    configure_index(&mut config.index)?;

    eprintln!();
    eprintln!("{}", style("Assistant Configuration").bold().yellow());
    configure_assistant(&mut config.assistant)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_provider_connection(&config.provider) {
        eprintln!("{}", style("✓ Provider connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not reach the provider").yellow()
        );
        eprintln!(
            "You can continue, but make sure {} is set before building the index.",
            config.provider.api_key_env
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
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Provider Settings:").bold().yellow());
    match config.provider.api_url() {
        Ok(url) => eprintln!("  Base URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Base URL: {} ({})", style("Invalid").red(), e),
    }
    eprintln!(
        "  Embedding Model: {}",
        style(&config.provider.embedding_model).cyan()
    );
    eprintln!("  Chat Model: {}", style(&config.provider.chat_model).cyan());
    let key_state = if Credentials::from_env(&config.provider.api_key_env).is_ok() {
        style("set").green()
    } else {
        style("not set").red()
    };
    eprintln!(
        "  API Key Variable: {} ({})",
        style(&config.provider.api_key_env).cyan(),
        key_state
    );
    eprintln!(
        "  Timeout: {}s, Retries: {}",
        style(config.provider.timeout_seconds).cyan(),
        style(config.provider.retry_attempts).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Index Settings:").bold().yellow());
    eprintln!(
        "  Extensions: {}",
        style(config.index.extensions.join(", ")).cyan()
    );
    eprintln!("  Top K: {}", style(config.index.top_k).cyan());
    eprintln!("  Concurrency: {}", style(config.index.concurrency).cyan());
    eprintln!(
        "  Category Annotations: {}",
        style(config.index.annotate_categories).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Assistant Settings:").bold().yellow());
    eprintln!("  Project: {}", style(&config.assistant.project_name).cyan());
    eprintln!(
        "  System Prompt: {}",
        style(&config.assistant.system_prompt).dim()
    );

    let index_dir = config.index_dir();
    eprintln!();
    eprintln!("Config file: {}", style(config.config_file_path().display()).dim());
    eprintln!(
        "Index: {} ({})",
        style(index_dir.display()).dim(),
        if KnowledgeBase::exists(&index_dir) {
            "built"
        } else {
            "not built"
        }
    );

    Ok(())
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    if config_dir.join(super::settings::CONFIG_FILE_NAME).exists() {
        let config = Config::load(config_dir)?;
        eprintln!("{}", style("Found existing configuration.").green());
        Ok(config)
    } else {
        eprintln!(
            "{}",
            style("No existing configuration found. Using defaults.").yellow()
        );
        Config::load(config_dir)
    }
}

fn configure_provider(provider: &mut ProviderConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("API base URL")
        .default(provider.base_url.clone())
        .validate_with(|input: &String| -> Result<(), String> {
            let candidate = ProviderConfig {
                base_url: input.clone(),
                ..ProviderConfig::default()
            };
            candidate.api_url().map(|_| ()).map_err(|e| e.to_string())
        })
        .interact_text()?;

    let embedding_model: String = Input::new()
        .with_prompt("Embedding model")
        .default(provider.embedding_model.clone())
        .validate_with(non_empty("Model name cannot be empty"))
        .interact_text()?;

    let chat_model: String = Input::new()
        .with_prompt("Chat model")
        .default(provider.chat_model.clone())
        .validate_with(non_empty("Model name cannot be empty"))
        .interact_text()?;

    let api_key_env: String = Input::new()
        .with_prompt("Environment variable holding the API key")
        .default(provider.api_key_env.clone())
        .validate_with(non_empty("Variable name cannot be empty"))
        .interact_text()?;

    let timeout_seconds: u64 = Input::new()
        .with_prompt("Request timeout (seconds)")
        .default(provider.timeout_seconds)
        .validate_with(|input: &u64| -> Result<(), &str> {
            if (1..=600).contains(input) {
                Ok(())
            } else {
                Err("Timeout must be between 1 and 600 seconds")
            }
        })
        .interact_text()?;

    provider.set_base_url(base_url)?;
    provider.set_embedding_model(embedding_model)?;
    provider.set_chat_model(chat_model)?;
    provider.api_key_env = api_key_env;
    provider.timeout_seconds = timeout_seconds;

    Ok(())
}

fn configure_index(index: &mut IndexConfig) -> Result<()> {
    let extensions: String = Input::new()
        .with_prompt("File extensions to index (comma separated)")
        .default(index.extensions.join(","))
        .validate_with(|input: &String| -> Result<(), &str> {
            if parse_extensions(input).is_empty() {
                Err("At least one extension is required")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let top_k: usize = Input::new()
        .with_prompt("Files retrieved per question")
        .default(index.top_k)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=100).contains(input) {
                Ok(())
            } else {
                Err("Top K must be between 1 and 100")
            }
        })
        .interact_text()?;

    let concurrency: usize = Input::new()
        .with_prompt("Concurrent embedding requests")
        .default(index.concurrency)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if (1..=32).contains(input) {
                Ok(())
            } else {
                Err("Concurrency must be between 1 and 32")
            }
        })
        .interact_text()?;

    index.extensions = parse_extensions(&extensions);
    index.set_top_k(top_k)?;
    index.set_concurrency(concurrency)?;

    Ok(())
}

fn configure_assistant(assistant: &mut AssistantConfig) -> Result<()> {
    assistant.project_name = Input::new()
        .with_prompt("Project name used in prompts")
        .default(assistant.project_name.clone())
        .validate_with(non_empty("Project name cannot be empty"))
        .interact_text()?;

    assistant.system_prompt = Input::new()
        .with_prompt("System prompt")
        .default(assistant.system_prompt.clone())
        .validate_with(non_empty("System prompt cannot be empty"))
        .interact_text()?;

    Ok(())
}

fn non_empty(message: &'static str) -> impl FnMut(&String) -> Result<(), &'static str> {
    move |input: &String| {
        if input.trim().is_empty() {
            Err(message)
        } else {
            Ok(())
        }
    }
}

/// Split `"js, .ts"` into `["js", "ts"]`
fn parse_extensions(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(|ext| ext.trim().trim_start_matches('.'))
        .filter(|ext| !ext.is_empty())
        .map(str::to_string)
        .collect()
}

/// A 2xx or 4xx response means the endpoint is reachable
fn test_provider_connection(provider: &ProviderConfig) -> bool {
    let Ok(url) = provider.api_url().and_then(|base| {
        base.join("models")
            .map_err(|_| super::ConfigError::InvalidUrl(provider.base_url.clone()))
    }) else {
        return false;
    };

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    let mut request = agent.get(url.as_str());
    if let Ok(credentials) = Credentials::from_env(&provider.api_key_env) {
        request = request.header(
            "Authorization",
            &format!("Bearer {}", credentials.api_key()),
        );
    }

    match request.call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => (400..500).contains(&code),
        Err(_) => false,
    }
}
