use crate::{
    errors::Result,
    naming::DEFAULT_TEMP_BRANCH,
    plan::Flags,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Settings read from git configuration (`multimerge.*`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub temp_branch: String,
    pub build_command: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            temp_branch: DEFAULT_TEMP_BRANCH.to_string(),
            build_command: None,
        }
    }
}

impl Config {
    /// Read from the global/system git config, or the given repository's config when provided
    pub fn load(repository: Option<&Path>) -> Result<Self> {
        let config = match repository {
            Some(path) => git2::Repository::open(path)?.config()?,
            None => git2::Config::open_default()?,
        };
        Ok(Self::from_git_config(&config))
    }

    fn from_git_config(config: &git2::Config) -> Self {
        let defaults = Self::default();
        let temp_branch = config
            .get_string("multimerge.tempBranch")
            .ok()
            .filter(|name| !name.trim().is_empty())
            .unwrap_or(defaults.temp_branch);
        let build_command = config
            .get_string("multimerge.buildCommand")
            .ok()
            .filter(|command| !command.trim().is_empty());
        Self {
            temp_branch,
            build_command,
        }
    }
}

/// Choices of the previous run, used as defaults for the next one
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Preferences {
    pub branches: Vec<String>,
    pub flags: Flags,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            branches: Vec::new(),
            flags: Flags {
                make: true,
                ..Flags::default()
            },
        }
    }
}

impl Preferences {
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("multimerge").join("preferences.json"))
    }

    /// A missing or unreadable file gives the defaults
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(_) => return Self::default(),
        };
        serde_json::from_str(&content).unwrap_or_else(|e| {
            log::warn!("Ignoring invalid preferences in {}: {}", path.display(), e);
            Self::default()
        })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| {
            log::error!("Cannot write preferences to {}: {}", path.display(), e);
            e
        })?;
        Ok(())
    }
}
