use config::{Config, ConfigError, Environment, File, FileFormat};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::model::{Page, Placement};

const ENV_PREFIX: &str = "NAV_SUPPLIER";

/// What to do when the auth token is missing or empty.
#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TokenPolicy {
    /// Skip the fetch until a non-empty token arrives.
    #[default]
    RequireToken,
    /// Always fetch; a missing token is sent as an empty path segment.
    Unconditional,
}

impl TokenPolicy {
    /// Returns the token to fetch with, or `None` if this change should not fetch.
    pub fn token_to_fetch<'a>(&self, token: Option<&'a str>) -> Option<&'a str> {
        match self {
            TokenPolicy::RequireToken => token.filter(|t| !t.is_empty()),
            TokenPolicy::Unconditional => Some(token.unwrap_or("")),
        }
    }
}

/// A statically configured navigation entry, always appended after fetched pages.
#[derive(Debug, Deserialize, Clone, Serialize, PartialEq, Eq)]
pub struct FallbackPage {
    pub label: String,
    pub slug: String,
    pub placement: String,
    #[serde(default)]
    pub display_in_header: bool,
}

impl From<FallbackPage> for Page {
    fn from(fallback: FallbackPage) -> Self {
        Page {
            label: fallback.label,
            slug: fallback.slug,
            is_private: false,
            display_in_header: fallback.display_in_header,
            placement: Placement::from(fallback.placement),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Serialize)]
pub struct SupplierConfig {
    /// Origin serving `/api/offers/entitlement/{token}`.
    #[serde(default = "default_app_base_url")]
    pub app_base_url: String,
    /// Origin of the content API serving `/api/pages/`.
    #[serde(default = "default_content_base_url")]
    pub content_base_url: String,
    #[serde(default)]
    pub token_policy: TokenPolicy,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_limit: Option<u32>,
    #[serde(default)]
    pub fallback_pages: Vec<FallbackPage>,
}

fn default_app_base_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_content_base_url() -> String {
    "http://localhost:3001".to_string()
}

fn default_request_timeout_secs() -> u64 {
    10
}

impl Default for SupplierConfig {
    fn default() -> Self {
        Self {
            app_base_url: default_app_base_url(),
            content_base_url: default_content_base_url(),
            token_policy: TokenPolicy::default(),
            request_timeout_secs: default_request_timeout_secs(),
            page_limit: None,
            fallback_pages: Vec::new(),
        }
    }
}

impl SupplierConfig {
    pub fn config_file_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("nav_supplier")
            .join("config.toml")
    }

    /// Loads the default config file (if present) overlaid with `NAV_SUPPLIER_*` env vars.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(Self::config_file_path())
    }

    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).try_parsing(true))
            .build()?;

        config.try_deserialize()
    }

    pub fn from_toml_str(toml: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn fallback(&self) -> Vec<Page> {
        self.fallback_pages.iter().cloned().map(Page::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_token_policy() {
        let policy = TokenPolicy::RequireToken;
        assert_eq!(policy.token_to_fetch(Some("T1")), Some("T1"));
        assert_eq!(policy.token_to_fetch(Some("")), None);
        assert_eq!(policy.token_to_fetch(None), None);
    }

    #[test]
    fn test_unconditional_policy() {
        let policy = TokenPolicy::Unconditional;
        assert_eq!(policy.token_to_fetch(Some("T1")), Some("T1"));
        assert_eq!(policy.token_to_fetch(None), Some(""));
    }

    #[test]
    fn test_defaults_from_empty_config() {
        let config = SupplierConfig::from_toml_str("").unwrap();
        assert_eq!(config.token_policy, TokenPolicy::RequireToken);
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
        assert!(config.page_limit.is_none());
        assert!(config.fallback().is_empty());
    }

    #[test]
    fn test_parse_full_config() {
        let toml = r#"
            app_base_url = "https://app.example.com"
            content_base_url = "https://cms.example.com"
            token_policy = "unconditional"
            request_timeout_secs = 3
            page_limit = 100

            [[fallback_pages]]
            label = "Home"
            slug = "/"
            placement = "main"
            display_in_header = true

            [[fallback_pages]]
            label = "Terms"
            slug = "/terms"
            placement = "footer"
        "#;
        let config = SupplierConfig::from_toml_str(toml).unwrap();
        assert_eq!(config.content_base_url, "https://cms.example.com");
        assert_eq!(config.token_policy, TokenPolicy::Unconditional);
        assert_eq!(config.page_limit, Some(100));

        let fallback = config.fallback();
        assert_eq!(fallback.len(), 2);
        assert_eq!(fallback[0].placement, Placement::Main);
        assert!(fallback[0].display_in_header);
        assert_eq!(fallback[1].placement, Placement::Footer);
        assert!(!fallback[1].is_private);
    }

    #[test]
    fn test_missing_file_falls_back_to_defaults() {
        let config = SupplierConfig::load_from("/nonexistent/nav_supplier.toml").unwrap();
        assert_eq!(config.app_base_url, "http://localhost:3000");
    }
}
