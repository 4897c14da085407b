//! Config store for locating and loading shipyard.toml.

use std::path::{Path, PathBuf};

use super::{ShipyardConfig, parser};

pub const CONFIG_FILE_NAME: &str = "shipyard.toml";

#[derive(Debug, Clone)]
pub struct ConfigStore {
    candidates: Vec<PathBuf>,
    explicit: bool,
}

impl ConfigStore {
    /// Search `project_root/shipyard.toml`, then the user config directory.
    pub fn discover(project_root: &Path) -> Self {
        let mut candidates = vec![project_root.join(CONFIG_FILE_NAME)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join("shipyard").join(CONFIG_FILE_NAME));
        }
        Self {
            candidates,
            explicit: false,
        }
    }

    /// Use exactly this file; it must exist.
    pub fn from_path(path: PathBuf) -> Self {
        Self {
            candidates: vec![path],
            explicit: true,
        }
    }

    /// First candidate that exists on disk.
    pub fn config_path(&self) -> Option<&Path> {
        self.candidates
            .iter()
            .map(PathBuf::as_path)
            .find(|p| p.exists())
    }

    pub fn load(&self) -> anyhow::Result<ShipyardConfig> {
        match self.config_path() {
            Some(path) => parser::parse_shipyard_toml(path),
            None if self.explicit => {
                let path = self
                    .candidates
                    .first()
                    .map(|p| p.display().to_string())
                    .unwrap_or_default();
                anyhow::bail!("Config file not found: {}", path)
            }
            None => Ok(ShipyardConfig::default()),
        }
    }
}
