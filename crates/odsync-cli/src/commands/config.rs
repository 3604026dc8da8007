//! Config command - Inspect odsync configuration
//!
//! Provides the `odsync config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors
//! 3. Prints where the configuration file is looked up

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use tracing::info;

use odsync_core::config::Config;

use crate::output::{get_formatter, OutputFormat, OutputFormatter};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
    /// Print the configuration file path
    Path,
}

impl ConfigCommand {
    /// Execute the config command against the file at `config_path`
    pub async fn execute(&self, config_path: &Path, format: OutputFormat) -> Result<()> {
        let formatter = get_formatter(format);
        match self {
            ConfigCommand::Show => show(formatter.as_ref(), config_path, format),
            ConfigCommand::Validate => validate(formatter.as_ref(), config_path, format),
            ConfigCommand::Path => {
                if format == OutputFormat::Json {
                    formatter.print_json(&serde_json::json!({
                        "config_path": config_path.display().to_string(),
                        "exists": config_path.exists(),
                    }));
                } else {
                    println!("{}", config_path.display());
                }
                Ok(())
            }
        }
    }
}

fn show(formatter: &dyn OutputFormatter, config_path: &Path, format: OutputFormat) -> Result<()> {
    let config = Config::load_or_default(config_path);
    info!(config_path = %config_path.display(), "Showing configuration");

    if format == OutputFormat::Json {
        let json =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&json);
    } else {
        formatter.success(&format!("Configuration ({})", config_path.display()));
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

/// Outcome of validating one configuration file
#[derive(Debug, PartialEq)]
enum Validation {
    Missing,
    Unreadable(String),
    Checked(Vec<String>),
}

fn check(config_path: &Path) -> Validation {
    if !config_path.exists() {
        return Validation::Missing;
    }
    match Config::load(config_path) {
        Ok(config) => Validation::Checked(config.validate().iter().map(ToString::to_string).collect()),
        Err(e) => Validation::Unreadable(format!("{e:#}")),
    }
}

fn validate(
    formatter: &dyn OutputFormatter,
    config_path: &Path,
    format: OutputFormat,
) -> Result<()> {
    info!(config_path = %config_path.display(), "Validating configuration");
    let outcome = check(config_path);

    if format == OutputFormat::Json {
        let (valid, errors) = match &outcome {
            Validation::Missing => (true, vec!["Configuration file not found, using defaults".to_string()]),
            Validation::Unreadable(e) => (false, vec![format!("Failed to parse configuration: {e}")]),
            Validation::Checked(errors) => (errors.is_empty(), errors.clone()),
        };
        formatter.print_json(&serde_json::json!({
            "valid": valid,
            "config_path": config_path.display().to_string(),
            "errors": errors,
        }));
    } else {
        match &outcome {
            Validation::Missing => {
                formatter.info(&format!("Configuration file not found at {}", config_path.display()));
                formatter.info("Using default configuration.");
            }
            Validation::Unreadable(e) => {
                formatter.error(&format!("Failed to parse configuration: {e}"));
                formatter.info(&format!("File: {}", config_path.display()));
            }
            Validation::Checked(errors) if errors.is_empty() => {
                formatter.success("Configuration is valid");
                formatter.info(&format!("File: {}", config_path.display()));
            }
            Validation::Checked(errors) => {
                formatter.error(&format!("Configuration has {} error(s):", errors.len()));
                formatter.info(&format!("File: {}", config_path.display()));
                for error in errors {
                    formatter.info(&format!("  {error}"));
                }
            }
        }
    }

    match outcome {
        Validation::Unreadable(_) => anyhow::bail!("Configuration could not be read"),
        Validation::Checked(errors) if !errors.is_empty() => {
            anyhow::bail!("Configuration is invalid")
        }
        _ => Ok(()),
    }
}
