use anyhow::{Context, Result};
use dirs::{config_dir, data_local_dir};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::modules::notifications::DEFAULT_RETENTION;

#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct EmployeeConfig {
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub department: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ConfigFile {
    pub data_dir: Option<PathBuf>,
    pub retention_limit: usize,
    pub seed_samples: bool,
    pub log_level: String,
    pub log_file: Option<PathBuf>,
    pub username: Option<String>,
    pub leave_confirm_delay_ms: u64,
    pub employees: Vec<EmployeeConfig>,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            data_dir: None,
            retention_limit: DEFAULT_RETENTION,
            seed_samples: true,
            log_level: "info".to_string(),
            log_file: None,
            username: None,
            leave_confirm_delay_ms: 400,
            employees: Vec::new(),
        }
    }
}

impl ConfigFile {
    /// Reads `path`, writing a default file first when none exists.
    pub fn read_or_create(path: &Path) -> Result<Self> {
        if !path.exists() {
            let default = Self::default();
            let toml = toml::to_string_pretty(&default)?;
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, toml).with_context(|| format!("Writing default config {:?}", path))?;
        }
        let content = fs::read_to_string(path).with_context(|| format!("Reading {:?}", path))?;
        toml::from_str(&content).with_context(|| "Parsing config TOML")
    }
}

#[derive(Clone, Debug)]
pub struct Config {
    pub path: PathBuf,
    pub data_dir: PathBuf,
    pub retention_limit: usize,
    pub seed_samples: bool,
    pub log_level: String,
    pub log_file: PathBuf,
    pub username: Option<String>,
    pub leave_confirm_delay_ms: u64,
    pub employees: Vec<EmployeeConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(config_path()?)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let cfg = ConfigFile::read_or_create(&path)?;

        let data_dir = match cfg.data_dir {
            Some(dir) => dir,
            None => default_data_dir()?,
        };
        let log_file = cfg.log_file.unwrap_or_else(|| data_dir.join("absentra.log"));
        Ok(Self {
            path,
            data_dir,
            retention_limit: cfg.retention_limit,
            seed_samples: cfg.seed_samples,
            log_level: cfg.log_level,
            log_file,
            username: cfg.username,
            leave_confirm_delay_ms: cfg.leave_confirm_delay_ms,
            employees: cfg.employees,
        })
    }

    pub fn employee(&self, user_id: &str) -> Option<&EmployeeConfig> {
        self.employees.iter().find(|e| e.user_id == user_id)
    }
}

fn config_path() -> Result<PathBuf> {
    let base = config_dir().context("Could not determine config directory")?;
    Ok(base.join("absentra").join("config.toml"))
}

fn default_data_dir() -> Result<PathBuf> {
    let base = data_local_dir().context("Could not determine data directory")?;
    Ok(base.join("absentra"))
}
