//! Application configuration.
//!
//! The configuration is one TOML document:
//!
//! ```toml
//! ics_prodid = "-//acme//calendar//EN"
//!
//! [notion]
//! api_token = "secret_..."
//!
//! [server]
//! port = 8000
//!
//! [calendar_views.team]
//! database_id = "0f3c..."
//! date_property = "When"
//! ```
//!
//! `NOTION_TOKEN`, `NOTION_VERSION`, `SERVER_HOST` and `SERVER_PORT` override
//! the file after it is parsed.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::Deserialize;

use crate::error::ConfigError;
use crate::ics::DEFAULT_PRODID;
use crate::view::{ViewRegistry, ViewSettings};

pub const DEFAULT_API_VERSION: &str = "2022-06-28";
pub const DEFAULT_BASE_URL: &str = "https://api.notion.com/v1";
/// Largest page the Notion API will return.
pub const MAX_PAGE_SIZE: u32 = 100;

/// A Notion integration secret. Never printed.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ApiToken(String);

impl ApiToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Returns the raw secret for use in an `Authorization` header.
    pub fn expose(&self) -> &str {
        &self.0
    }

    fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Debug for ApiToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiToken(<redacted>)")
    }
}

/// Settings for the upstream Notion API.
#[derive(Debug, Clone)]
pub struct NotionSettings {
    pub api_token: ApiToken,
    pub api_version: String,
    pub base_url: String,
    pub timeout: Duration,
    pub requests_per_second: u32,
    pub max_retries: u32,
    pub page_size: u32,
}

/// Settings for the HTTP listener.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    pub request_timeout: Duration,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            request_timeout: Duration::from_secs(60),
        }
    }
}

/// The full, validated configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub notion: NotionSettings,
    pub server: ServerSettings,
    pub views: ViewRegistry,
    pub ics_prodid: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawConfig {
    #[serde(default)]
    notion: RawNotion,
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    calendar_views: BTreeMap<String, ViewSettings>,
    ics_prodid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawNotion {
    api_token: Option<ApiToken>,
    api_version: Option<String>,
    base_url: Option<String>,
    timeout_secs: Option<u64>,
    requests_per_second: Option<u32>,
    max_retries: Option<u32>,
    page_size: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct RawServer {
    host: Option<String>,
    port: Option<u16>,
    request_timeout_secs: Option<u64>,
}

impl AppConfig {
    /// Reads and validates the configuration file, applying process
    /// environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_str_with_env(&raw, |key| std::env::var(key).ok())
    }

    /// Parses a configuration document, resolving overrides through `env`.
    pub fn from_str_with_env(
        raw: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut parsed: RawConfig = toml::from_str(raw)?;

        if let Some(token) = env("NOTION_TOKEN").filter(|t| !t.trim().is_empty()) {
            parsed.notion.api_token = Some(ApiToken::new(token));
        }
        if let Some(version) = env("NOTION_VERSION").filter(|v| !v.trim().is_empty()) {
            parsed.notion.api_version = Some(version);
        }
        if let Some(host) = env("SERVER_HOST").filter(|h| !h.trim().is_empty()) {
            parsed.server.host = Some(host);
        }
        if let Some(port) = env("SERVER_PORT") {
            let port = port.trim().parse::<u16>().map_err(|_| {
                ConfigError::invalid("SERVER_PORT", format!("'{port}' is not a valid port"))
            })?;
            parsed.server.port = Some(port);
        }

        let notion = resolve_notion(parsed.notion)?;
        let server = resolve_server(parsed.server)?;

        if parsed.calendar_views.is_empty() {
            return Err(ConfigError::NoViews);
        }
        let views = ViewRegistry::from_settings(parsed.calendar_views)?;

        let ics_prodid = parsed
            .ics_prodid
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_PRODID.to_string());

        Ok(Self {
            notion,
            server,
            views,
            ics_prodid,
        })
    }
}

impl FromStr for AppConfig {
    type Err = ConfigError;

    /// Parses without consulting the process environment.
    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        Self::from_str_with_env(raw, |_| None)
    }
}

fn resolve_notion(raw: RawNotion) -> Result<NotionSettings, ConfigError> {
    let api_token = raw
        .api_token
        .filter(|t| !t.is_blank())
        .ok_or(ConfigError::MissingToken)?;

    let requests_per_second = raw.requests_per_second.unwrap_or(3);
    if requests_per_second == 0 {
        return Err(ConfigError::invalid(
            "notion.requests_per_second",
            "must be at least 1",
        ));
    }

    let timeout_secs = raw.timeout_secs.unwrap_or(30);
    if timeout_secs == 0 {
        return Err(ConfigError::invalid(
            "notion.timeout_secs",
            "must be at least 1",
        ));
    }

    Ok(NotionSettings {
        api_token,
        api_version: raw
            .api_version
            .unwrap_or_else(|| DEFAULT_API_VERSION.to_string()),
        base_url: raw.base_url.unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
        timeout: Duration::from_secs(timeout_secs),
        requests_per_second,
        max_retries: raw.max_retries.unwrap_or(3),
        page_size: raw.page_size.unwrap_or(MAX_PAGE_SIZE).clamp(1, MAX_PAGE_SIZE),
    })
}

fn resolve_server(raw: RawServer) -> Result<ServerSettings, ConfigError> {
    let defaults = ServerSettings::default();
    let request_timeout = match raw.request_timeout_secs {
        Some(0) => {
            return Err(ConfigError::invalid(
                "server.request_timeout_secs",
                "must be at least 1",
            ));
        }
        Some(secs) => Duration::from_secs(secs),
        None => defaults.request_timeout,
    };

    Ok(ServerSettings {
        host: raw.host.unwrap_or(defaults.host),
        port: raw.port.unwrap_or(defaults.port),
        request_timeout,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::io::Write;

    use super::*;

    const MINIMAL: &str = r#"
[notion]
api_token = "secret_abc"

[calendar_views.team]
database_id = "db1"
date_property = "When"
"#;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn minimal_config_uses_defaults() {
        let config: AppConfig = MINIMAL.parse().unwrap();

        assert_eq!(config.notion.api_token.expose(), "secret_abc");
        assert_eq!(config.notion.api_version, "2022-06-28");
        assert_eq!(config.notion.base_url, "https://api.notion.com/v1");
        assert_eq!(config.notion.timeout, Duration::from_secs(30));
        assert_eq!(config.notion.requests_per_second, 3);
        assert_eq!(config.notion.max_retries, 3);
        assert_eq!(config.notion.page_size, 100);
        assert_eq!(config.server, ServerSettings::default());
        assert_eq!(config.ics_prodid, DEFAULT_PRODID);
        assert_eq!(config.views.len(), 1);
    }

    #[test]
    fn env_overrides_file() {
        let config = AppConfig::from_str_with_env(
            MINIMAL,
            env_from(&[
                ("NOTION_TOKEN", "secret_env"),
                ("NOTION_VERSION", "2025-09-03"),
                ("SERVER_HOST", "127.0.0.1"),
                ("SERVER_PORT", "9090"),
            ]),
        )
        .unwrap();

        assert_eq!(config.notion.api_token.expose(), "secret_env");
        assert_eq!(config.notion.api_version, "2025-09-03");
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 9090);
    }

    #[test]
    fn token_may_come_only_from_env() {
        let raw = "[calendar_views.team]\ndatabase_id = \"db1\"\ndate_property = \"When\"\n";
        assert!(matches!(
            raw.parse::<AppConfig>(),
            Err(ConfigError::MissingToken)
        ));

        let config =
            AppConfig::from_str_with_env(raw, env_from(&[("NOTION_TOKEN", "secret_env")]))
                .unwrap();
        assert_eq!(config.notion.api_token.expose(), "secret_env");
    }

    #[test]
    fn invalid_port_override_is_rejected() {
        let err = AppConfig::from_str_with_env(MINIMAL, env_from(&[("SERVER_PORT", "http")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "SERVER_PORT"));
    }

    #[test]
    fn no_views_is_rejected() {
        let err = "[notion]\napi_token = \"x\"\n".parse::<AppConfig>().unwrap_err();
        assert!(matches!(err, ConfigError::NoViews));
    }

    #[test]
    fn page_size_is_clamped() {
        let raw = MINIMAL.replace("api_token = \"secret_abc\"", "api_token = \"s\"\npage_size = 500");
        let config: AppConfig = raw.parse().unwrap();
        assert_eq!(config.notion.page_size, 100);

        let raw = MINIMAL.replace("api_token = \"secret_abc\"", "api_token = \"s\"\npage_size = 0");
        let config: AppConfig = raw.parse().unwrap();
        assert_eq!(config.notion.page_size, 1);
    }

    #[test]
    fn zero_rate_is_rejected() {
        let raw = MINIMAL.replace(
            "api_token = \"secret_abc\"",
            "api_token = \"s\"\nrequests_per_second = 0",
        );
        assert!(matches!(
            raw.parse::<AppConfig>(),
            Err(ConfigError::Invalid { .. })
        ));
    }

    #[test]
    fn zero_request_timeout_is_rejected() {
        let raw = format!("{MINIMAL}\n[server]\nrequest_timeout_secs = 0\n");
        let err = raw.parse::<AppConfig>().unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref field, .. } if field == "server.request_timeout_secs"
        ));

        let raw = format!("{MINIMAL}\n[server]\nrequest_timeout_secs = 5\n");
        let config = raw.parse::<AppConfig>().unwrap();
        assert_eq!(config.server.request_timeout, Duration::from_secs(5));
    }

    #[test]
    fn token_is_redacted_in_debug() {
        let config: AppConfig = MINIMAL.parse().unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("secret_abc"));
        assert!(rendered.contains("<redacted>"));
    }

    #[test]
    fn view_errors_propagate() {
        let raw = MINIMAL.replace("date_property = \"When\"", "");
        assert!(matches!(
            raw.parse::<AppConfig>(),
            Err(ConfigError::MissingField { .. })
        ));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(MINIMAL.as_bytes()).unwrap();

        let config = AppConfig::load_from(file.path()).unwrap();
        assert!(config.views.get("team").is_ok());
    }

    #[test]
    fn missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
        assert!(err.to_string().contains("absent.toml"));
    }
}
