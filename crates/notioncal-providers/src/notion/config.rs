//! Notion client configuration.

use std::time::Duration;

use notioncal_core::{ApiToken, NotionSettings};
use url::Url;

use crate::error::{UpstreamError, UpstreamResult};

/// Connection settings for [`NotionClient`](super::NotionClient).
#[derive(Debug, Clone)]
pub struct NotionConfig {
    /// API root, e.g. `https://api.notion.com/v1`.
    pub base_url: Url,
    pub token: ApiToken,
    /// Sent as the `Notion-Version` header.
    pub api_version: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl NotionConfig {
    /// Builds the client settings from the `[notion]` section.
    pub fn from_settings(settings: &NotionSettings) -> UpstreamResult<Self> {
        let base_url = Url::parse(&settings.base_url).map_err(|e| {
            UpstreamError::configuration(format!("invalid Notion base URL: {e}")).with_source(e)
        })?;
        Ok(Self {
            base_url,
            token: settings.api_token.clone(),
            api_version: settings.api_version.clone(),
            timeout: settings.timeout,
        })
    }

    /// URL of the query endpoint for one database.
    pub fn query_url(&self, database_id: &str) -> String {
        format!(
            "{}/databases/{}/query",
            self.base_url.as_str().trim_end_matches('/'),
            urlencoding::encode(database_id)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(base_url: &str) -> NotionSettings {
        NotionSettings {
            api_token: ApiToken::new("secret"),
            api_version: "2022-06-28".into(),
            base_url: base_url.into(),
            timeout: Duration::from_secs(30),
            requests_per_second: 3,
            max_retries: 3,
            page_size: 100,
        }
    }

    #[test]
    fn query_url_joins_base_and_database() {
        let config = NotionConfig::from_settings(&settings("https://api.notion.com/v1/")).unwrap();
        assert_eq!(
            config.query_url("abc-123"),
            "https://api.notion.com/v1/databases/abc-123/query"
        );
    }

    #[test]
    fn database_id_is_encoded() {
        let config = NotionConfig::from_settings(&settings("https://api.notion.com/v1")).unwrap();
        assert_eq!(
            config.query_url("a/b"),
            "https://api.notion.com/v1/databases/a%2Fb/query"
        );
    }

    #[test]
    fn invalid_base_url_is_a_configuration_error() {
        let err = NotionConfig::from_settings(&settings("not a url")).unwrap_err();
        assert_eq!(err.code(), crate::error::UpstreamErrorCode::ConfigurationError);
    }
}
