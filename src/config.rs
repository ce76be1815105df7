use std::fmt;
use std::fs;
use std::path::PathBuf;

use camino::Utf8PathBuf;
use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

pub const DEFAULT_API: &str = "https://api.checklistbank.org";
pub const DEFAULT_PAGE_SIZE: u64 = 1000;
pub const DEFAULT_CONFIG_FILE: &str = "clb-export.json";

/// Raw settings, every field optional. Filled from a JSON file and then
/// overlaid with environment variables.
#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub release_id: Option<String>,
    #[serde(default)]
    pub taxon_id: Option<String>,
    #[serde(default)]
    pub api: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub page_size: Option<u64>,
    #[serde(default)]
    pub output_dir: Option<String>,
    #[serde(default)]
    pub cache_dir: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
}

impl Config {
    /// Overlays the process environment variables this exporter has always
    /// been driven by. Empty values count as unset.
    pub fn apply_vars<I, K, V>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (key, value) in vars {
            let value: String = value.into();
            if value.trim().is_empty() {
                continue;
            }
            let slot = match key.as_ref() {
                "NAME" => &mut self.name,
                "XRELEASE_ID" => &mut self.release_id,
                "TAXON_ID" => &mut self.taxon_id,
                "COL_API" => &mut self.api,
                "COL_USER" => &mut self.user,
                "COL_PASS" => &mut self.password,
                _ => continue,
            };
            *slot = Some(value);
        }
    }
}

#[derive(Clone)]
pub struct Credentials {
    pub user: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything one export run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub name: String,
    pub release_id: String,
    pub taxon_id: String,
    pub api_base: String,
    pub credentials: Credentials,
    pub page_size: u64,
    pub output_dir: Utf8PathBuf,
    pub cache_root: Utf8PathBuf,
    pub schema_path: Utf8PathBuf,
}

impl RunConfig {
    /// Namespace shared by the replay cache and the output files.
    pub fn run_tag(&self) -> String {
        format!("{}_{}_{}", self.name, self.release_id, self.taxon_id)
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    /// Reads the JSON file (explicit path, or `clb-export.json` when present),
    /// overlays the environment and resolves the result.
    pub fn resolve(path: Option<&str>) -> Result<RunConfig, ExportError> {
        let config_path = match path {
            Some(path) => PathBuf::from(path),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };

        let mut config = if path.is_some() || config_path.exists() {
            let content = fs::read_to_string(&config_path)
                .map_err(|_| ExportError::ConfigRead(config_path.clone()))?;
            serde_json::from_str(&content)
                .map_err(|err| ExportError::ConfigParse(err.to_string()))?
        } else {
            Config::default()
        };
        config.apply_vars(std::env::vars());

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<RunConfig, ExportError> {
        let page_size = config.page_size.unwrap_or(DEFAULT_PAGE_SIZE);
        if page_size == 0 {
            return Err(ExportError::InvalidConfig(
                "page size must be at least 1".to_string(),
            ));
        }

        let api_base = config
            .api
            .filter(|api| !api.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_API.to_string())
            .trim_end_matches('/')
            .to_string();

        let cache_root = match config.cache_dir {
            Some(dir) => Utf8PathBuf::from(dir),
            None => default_cache_root()?,
        };

        Ok(RunConfig {
            name: required(config.name, "NAME")?,
            release_id: required(config.release_id, "XRELEASE_ID")?,
            taxon_id: required(config.taxon_id, "TAXON_ID")?,
            api_base,
            credentials: Credentials {
                user: required(config.user, "COL_USER")?,
                password: required(config.password, "COL_PASS")?,
            },
            page_size,
            output_dir: Utf8PathBuf::from(config.output_dir.unwrap_or_else(|| "output".to_string())),
            cache_root,
            schema_path: Utf8PathBuf::from(config.schema.unwrap_or_else(|| "schema.sql".to_string())),
        })
    }
}

fn required(value: Option<String>, name: &str) -> Result<String, ExportError> {
    value
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ExportError::MissingConfig(name.to_string()))
}

pub fn default_cache_root() -> Result<Utf8PathBuf, ExportError> {
    BaseDirs::new()
        .and_then(|dirs| {
            Utf8PathBuf::from_path_buf(dirs.home_dir().join(".cache").join("clb-exporter")).ok()
        })
        .ok_or_else(|| ExportError::Filesystem("unable to resolve cache directory".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_overrides_file_values() {
        let mut config = Config {
            name: Some("from-file".to_string()),
            ..Config::default()
        };
        config.apply_vars([("NAME", "from-env"), ("COL_API", ""), ("PATH", "/bin")]);
        assert_eq!(config.name.as_deref(), Some("from-env"));
        assert_eq!(config.api, None);
    }

    #[test]
    fn credentials_are_redacted() {
        let credentials = Credentials {
            user: "alice".to_string(),
            password: "hunter2".to_string(),
        };
        let debug = format!("{credentials:?}");
        assert!(debug.contains("alice"));
        assert!(!debug.contains("hunter2"));
    }
}
