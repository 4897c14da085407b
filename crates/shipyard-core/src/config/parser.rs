//! TOML parser with helpful error messages

use std::path::Path;

use anyhow::{Context, Result};

use super::schema::ShipyardConfig;

/// Parse shipyard.toml with detailed error messages
pub fn parse_shipyard_toml(path: &Path) -> Result<ShipyardConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_shipyard_toml_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Parse shipyard.toml content from string
pub fn parse_shipyard_toml_str(content: &str) -> Result<ShipyardConfig> {
    let config: ShipyardConfig =
        toml::from_str(content).map_err(|e| anyhow::anyhow!("TOML parsing error: {}", e))?;

    validate_config(&config)?;

    Ok(config)
}

fn validate_config(config: &ShipyardConfig) -> Result<()> {
    let rollout = &config.rollout;
    if rollout.min_healthy_percent > 100 {
        anyhow::bail!(
            "rollout.min_healthy_percent must be at most 100 (got {})",
            rollout.min_healthy_percent
        );
    }
    if rollout.max_percent < 100 {
        anyhow::bail!(
            "rollout.max_percent must be at least 100 for in-place replacement (got {})",
            rollout.max_percent
        );
    }
    if config.convergence.max_attempts == 0 {
        anyhow::bail!("convergence.max_attempts must be positive");
    }
    if config.health.attempts == 0 {
        anyhow::bail!("health.attempts must be positive");
    }
    for path in &config.health.paths {
        if !path.starts_with('/') {
            anyhow::bail!("health path '{}' must start with '/'", path);
        }
    }
    if config.target.stack_name.trim().is_empty() {
        anyhow::bail!("target.stack_name must not be empty");
    }
    Ok(())
}
