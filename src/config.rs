use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::domain::Version;
use crate::error::DragontailError;

pub const CONFIG_FILE_NAME: &str = "dragontail.json";
pub const DEFAULT_VERSIONS_URL: &str = "https://ddragon.leagueoflegends.com/api/versions.json";
pub const DEFAULT_ARCHIVE_URL_TEMPLATE: &str =
    "https://ddragon.leagueoflegends.com/cdn/dragontail-{version}.tgz";
pub const DEFAULT_LOCALE: &str = "en_US";
pub const DEFAULT_COPY_WORKERS: usize = 8;
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;
pub const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub schema_version: Option<u32>,
    #[serde(default)]
    pub versions_url: Option<String>,
    #[serde(default)]
    pub archive_url_template: Option<String>,
    #[serde(default)]
    pub locale: Option<String>,
    #[serde(default)]
    pub copy_workers: Option<usize>,
    #[serde(default)]
    pub chunk_size: Option<usize>,
    #[serde(default)]
    pub request_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedConfig {
    pub schema_version: u32,
    pub versions_url: String,
    pub archive_url_template: String,
    pub locale: String,
    pub copy_workers: usize,
    pub chunk_size: usize,
    pub request_timeout: Duration,
}

impl ResolvedConfig {
    pub fn archive_url(&self, version: &Version) -> String {
        self.archive_url_template
            .replace("{version}", version.as_str())
    }
}

impl Default for ResolvedConfig {
    fn default() -> Self {
        Self {
            schema_version: 1,
            versions_url: DEFAULT_VERSIONS_URL.to_string(),
            archive_url_template: DEFAULT_ARCHIVE_URL_TEMPLATE.to_string(),
            locale: DEFAULT_LOCALE.to_string(),
            copy_workers: DEFAULT_COPY_WORKERS,
            chunk_size: DEFAULT_CHUNK_SIZE,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

pub struct ConfigLoader;

impl ConfigLoader {
    pub fn resolve(path: Option<&Path>, project_root: &Path) -> Result<ResolvedConfig, DragontailError> {
        let config_path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_locations(project_root)
                .into_iter()
                .find(|candidate| candidate.is_file()),
        };

        let Some(config_path) = config_path else {
            return Ok(ResolvedConfig::default());
        };

        let content = fs::read_to_string(&config_path)
            .map_err(|_| DragontailError::ConfigRead(config_path.clone()))?;
        let config: Config = serde_json::from_str(&content)
            .map_err(|err| DragontailError::ConfigParse(err.to_string()))?;

        Self::resolve_config(config)
    }

    pub fn resolve_config(config: Config) -> Result<ResolvedConfig, DragontailError> {
        let defaults = ResolvedConfig::default();

        let archive_url_template = config
            .archive_url_template
            .unwrap_or(defaults.archive_url_template);
        if !archive_url_template.contains("{version}") {
            return Err(DragontailError::InvalidConfig(format!(
                "archive_url_template must contain {{version}}: {archive_url_template}"
            )));
        }

        let copy_workers = config.copy_workers.unwrap_or(defaults.copy_workers);
        if copy_workers == 0 {
            return Err(DragontailError::InvalidConfig(
                "copy_workers must be at least 1".to_string(),
            ));
        }

        let chunk_size = config.chunk_size.unwrap_or(defaults.chunk_size);
        if chunk_size == 0 {
            return Err(DragontailError::InvalidConfig(
                "chunk_size must be at least 1".to_string(),
            ));
        }

        let locale = config.locale.unwrap_or(defaults.locale);
        if locale.is_empty() || locale.contains(['/', '\\']) || locale.contains("..") {
            return Err(DragontailError::InvalidConfig(format!("locale: {locale}")));
        }

        Ok(ResolvedConfig {
            schema_version: config.schema_version.unwrap_or(1),
            versions_url: config.versions_url.unwrap_or(defaults.versions_url),
            archive_url_template,
            locale,
            copy_workers,
            chunk_size,
            request_timeout: config
                .request_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
        })
    }

    fn default_locations(project_root: &Path) -> Vec<PathBuf> {
        let mut locations = vec![project_root.join(CONFIG_FILE_NAME)];
        if let Some(dirs) = ProjectDirs::from("", "", "dragontail") {
            locations.push(dirs.config_dir().join(CONFIG_FILE_NAME));
        }
        locations
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn empty_config_uses_defaults() {
        let resolved = ConfigLoader::resolve_config(Config::default()).unwrap();
        assert_eq!(resolved, ResolvedConfig::default());
        assert_eq!(resolved.copy_workers, 8);
        assert_eq!(resolved.chunk_size, 1024 * 1024);
    }

    #[test]
    fn archive_template_requires_placeholder() {
        let config = Config {
            archive_url_template: Some("https://example.com/archive.tgz".to_string()),
            ..Config::default()
        };
        let err = ConfigLoader::resolve_config(config).unwrap_err();
        assert_matches!(err, DragontailError::InvalidConfig(_));
    }

    #[test]
    fn archive_url_embeds_version() {
        let config = ResolvedConfig::default();
        let version: Version = "14.1.1".parse().unwrap();
        assert_eq!(
            config.archive_url(&version),
            "https://ddragon.leagueoflegends.com/cdn/dragontail-14.1.1.tgz"
        );
    }
}
