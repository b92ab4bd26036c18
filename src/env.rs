use std::path::Path;

use anyhow::{Context, bail};
use tracing::{info, warn};

const DEFAULT_DATABASE_URL: &str = "sqlite://school_roster.db";
const DEFAULT_MAX_CONNECTIONS: u32 = 5;

pub fn load_environment() -> anyhow::Result<()> {
    let is_production =
        dotenvy::var("ROCKET_PROFILE").unwrap_or("development".to_string()) == "production";

    let env_files = if is_production {
        vec!["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        vec!["config/common.env", "config/dev.env", ".secrets.env"]
    };

    for env_file in env_files {
        load_env_file(env_file)?;
    }

    Ok(())
}

fn load_env_file(path: &str) -> anyhow::Result<()> {
    if !Path::new(path).exists() {
        warn!("Environment file {} not found, skipping", path);
        return Ok(());
    }

    dotenvy::from_filename_override(path)
        .with_context(|| format!("Failed to load environment file {}", path))?;
    info!("Loaded environment from: {}", path);
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// OTLP gRPC endpoint; span export is off when unset.
    pub otlp_endpoint: Option<String>,
    pub honeycomb_api_key: Option<String>,
    pub deployment_environment: String,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let max_connections = match optional_var("DATABASE_MAX_CONNECTIONS") {
            Some(raw) => {
                let parsed = raw.parse::<u32>().with_context(|| {
                    format!("DATABASE_MAX_CONNECTIONS must be a positive integer, got '{}'", raw)
                })?;
                if parsed == 0 {
                    bail!("DATABASE_MAX_CONNECTIONS must be greater than zero");
                }
                parsed
            }
            None => DEFAULT_MAX_CONNECTIONS,
        };

        Ok(Self {
            database_url: optional_var("DATABASE_URL")
                .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            max_connections,
            otlp_endpoint: optional_var("OTEL_EXPORTER_OTLP_ENDPOINT"),
            honeycomb_api_key: optional_var("HONEYCOMB_API_KEY"),
            deployment_environment: optional_var("DEPLOYMENT_ENVIRONMENT")
                .unwrap_or_else(|| "development".to_string()),
        })
    }
}

// Blank values count as unset.
fn optional_var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
