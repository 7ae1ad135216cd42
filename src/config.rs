use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize};

use crate::directory::bootstrap::parse_agent_urls;
use crate::directory::fetch::DEFAULT_TIMEOUT;

/// Environment variable holding a comma-separated list of default agent URLs.
/// When set to a non-blank value it replaces the list from the settings file.
pub const DEFAULT_AGENT_URLS_ENV: &str = "DEFAULT_AGENT_URLS";

/// Settings file location, relative to the workspace root.
pub const SETTINGS_PATH: &str = "config/directory.toml";

/// Directory settings, usually loaded from `config/directory.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectorySettings {
    /// Agents registered at startup. Accepts a TOML array or a comma-separated string.
    #[serde(default, deserialize_with = "deserialize_url_list")]
    pub default_agent_urls: Vec<String>,
    /// Upper bound for one discovery request, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Bearer token sent as `Authorization` on every discovery request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Environment variable to read the bearer token from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token_env: Option<String>,
    /// Extra headers sent on every discovery request.
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

impl Default for DirectorySettings {
    fn default() -> Self {
        Self {
            default_agent_urls: Vec::new(),
            request_timeout_secs: default_timeout_secs(),
            auth_token: None,
            auth_token_env: None,
            headers: BTreeMap::new(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn deserialize_url_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum UrlList {
        List(Vec<String>),
        Joined(String),
    }

    Ok(match UrlList::deserialize(deserializer)? {
        UrlList::List(urls) => urls
            .into_iter()
            .map(|url| url.trim().to_string())
            .filter(|url| !url.is_empty())
            .collect(),
        UrlList::Joined(raw) => parse_agent_urls(Some(&raw)),
    })
}

impl DirectorySettings {
    /// Reads settings for `workspace_root` and applies environment overrides.
    /// A missing settings file yields the defaults.
    pub fn load(workspace_root: &Path) -> Result<Self> {
        let mut settings = Self::load_file(&Self::settings_path(workspace_root))?;
        settings.apply_overrides(|name| env::var(name).ok());
        Ok(settings)
    }

    /// Reads one settings file without consulting the environment.
    pub fn load_file(config_path: &Path) -> Result<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(config_path)
            .with_context(|| format!("Failed to read directory settings: {}", config_path.display()))?;
        toml::from_str(&raw)
            .with_context(|| format!("Failed to parse directory settings: {}", config_path.display()))
    }

    pub fn settings_path(workspace_root: &Path) -> PathBuf {
        workspace_root.join(SETTINGS_PATH)
    }

    /// Applies overrides looked up by variable name.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(raw) = lookup(DEFAULT_AGENT_URLS_ENV)
            && !raw.trim().is_empty()
        {
            self.default_agent_urls = parse_agent_urls(Some(&raw));
        }
        if self.auth_token.is_none()
            && let Some(var) = &self.auth_token_env
        {
            self.auth_token = lookup(var).filter(|token| !token.trim().is_empty());
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    /// Headers for the discovery fetch: the configured headers plus `Authorization`
    /// from the token, unless an `Authorization` header is configured explicitly.
    pub fn resolved_headers(&self) -> BTreeMap<String, String> {
        let mut headers = self.headers.clone();
        let has_authorization = headers
            .keys()
            .any(|name| name.eq_ignore_ascii_case("authorization"));
        if let Some(token) = &self.auth_token
            && !has_authorization
        {
            headers.insert(String::from("Authorization"), format!("Bearer {}", token.trim()));
        }
        headers
    }

    /// Writes the settings to `config/directory.toml` under `workspace_root`.
    pub fn save_to_file(&self, workspace_root: &Path) -> Result<()> {
        let config_path = Self::settings_path(workspace_root);
        if let Some(config_dir) = config_path.parent()
            && !config_dir.exists()
        {
            fs::create_dir_all(config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir.display()))?;
        }
        let serialized = toml::to_string_pretty(self).context("Failed to serialize directory settings")?;
        fs::write(&config_path, serialized)
            .with_context(|| format!("Failed to write directory settings: {}", config_path.display()))?;
        Ok(())
    }
}
