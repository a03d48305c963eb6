//! Notion API client.

use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::config::NotionConfig;
use crate::error::{UpstreamError, UpstreamResult};
use crate::record::{PropertyValue, RawRecord};
use crate::source::{BoxFuture, Page, PageRequest, RecordSource};

/// Queries Notion databases one page at a time.
#[derive(Debug, Clone)]
pub struct NotionClient {
    http_client: reqwest::Client,
    config: NotionConfig,
}

impl NotionClient {
    /// Creates a client with the configured request timeout.
    pub fn new(config: NotionConfig) -> UpstreamResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(concat!("notioncal/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| {
                UpstreamError::configuration("failed to create HTTP client").with_source(e)
            })?;

        Ok(Self {
            http_client,
            config,
        })
    }

    pub fn config(&self) -> &NotionConfig {
        &self.config
    }

    /// Issues one query against a database.
    pub async fn query_database(&self, request: &PageRequest) -> UpstreamResult<Page> {
        let url = self.config.query_url(&request.database_id);
        let body = QueryBody {
            page_size: request.page_size,
            filter: request.filter.as_ref(),
            start_cursor: request.start_cursor.as_deref(),
        };

        debug!(
            database_id = %request.database_id,
            cursor = request.start_cursor.as_deref().unwrap_or("-"),
            "querying Notion database"
        );

        let response = self
            .http_client
            .post(&url)
            .bearer_auth(self.config.token.expose())
            .header("Notion-Version", &self.config.api_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                let message = if e.is_timeout() {
                    "request timed out"
                } else if e.is_connect() {
                    "connection failed"
                } else {
                    "request failed"
                };
                UpstreamError::network(message).with_source(e)
            })?;

        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs);
            let mut err = UpstreamError::rate_limited(format!(
                "rate limit exceeded{}",
                retry_after
                    .map(|d| format!(", retry after {} seconds", d.as_secs()))
                    .unwrap_or_default()
            ));
            if let Some(delay) = retry_after {
                err = err.with_retry_after(delay);
            }
            return Err(err);
        }

        if !status.is_success() {
            // Only Notion's error code is kept; the message may echo
            // property values from the database.
            let code = response
                .json::<ApiError>()
                .await
                .ok()
                .and_then(|e| e.code)
                .map(|c| format!(" ({c})"))
                .unwrap_or_default();
            return Err(status_error(status, &request.database_id, &code));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| UpstreamError::network("failed to read response").with_source(e))?;

        let parsed: QueryResponse = serde_json::from_slice(&body).map_err(|e| {
            UpstreamError::invalid_response(format!("failed to decode query response: {e}"))
        })?;

        Ok(parsed.into_page())
    }
}

fn status_error(status: StatusCode, database_id: &str, code: &str) -> UpstreamError {
    match status {
        StatusCode::UNAUTHORIZED => {
            UpstreamError::authentication(format!("API token rejected{code}"))
        }
        StatusCode::FORBIDDEN => UpstreamError::authorization(format!(
            "integration has no access to database {database_id}{code}"
        )),
        StatusCode::NOT_FOUND => {
            UpstreamError::not_found(format!("database {database_id} not found{code}"))
        }
        StatusCode::BAD_REQUEST => {
            UpstreamError::bad_request(format!("query rejected{code}"))
        }
        s if s.is_server_error() => {
            UpstreamError::server(format!("Notion returned {}{code}", s.as_u16()))
        }
        s => UpstreamError::invalid_response(format!("unexpected status {}{code}", s.as_u16())),
    }
}

impl RecordSource for NotionClient {
    fn name(&self) -> &str {
        "notion"
    }

    fn query_page(&self, request: PageRequest) -> BoxFuture<'_, UpstreamResult<Page>> {
        Box::pin(async move { self.query_database(&request).await })
    }
}

#[derive(Debug, Serialize)]
struct QueryBody<'a> {
    page_size: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    filter: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_cursor: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<ApiPage>,
    #[serde(default)]
    has_more: bool,
    next_cursor: Option<String>,
}

impl QueryResponse {
    fn into_page(self) -> Page {
        let next_cursor = if self.has_more { self.next_cursor } else { None };
        let records = self.results.into_iter().map(ApiPage::into_record).collect();
        Page::new(records, next_cursor)
    }
}

#[derive(Debug, Deserialize)]
struct ApiPage {
    id: String,
    created_time: Option<DateTime<Utc>>,
    last_edited_time: Option<DateTime<Utc>>,
    url: Option<String>,
    #[serde(default)]
    properties: Map<String, Value>,
}

impl ApiPage {
    fn into_record(self) -> RawRecord {
        RawRecord {
            id: self.id,
            created_time: self.created_time,
            last_edited_time: self.last_edited_time,
            url: self.url,
            properties: self
                .properties
                .iter()
                .map(|(name, value)| (name.clone(), PropertyValue::from_json(value)))
                .collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<String>,
}

#[cfg(test)]
mod tests {
    use notioncal_core::ApiToken;
    use serde_json::json;
    use wiremock::{Mock, MockServer, ResponseTemplate, matchers};

    use super::*;
    use crate::error::UpstreamErrorCode;

    async fn client_for(server: &MockServer) -> NotionClient {
        let config = NotionConfig {
            base_url: format!("{}/v1", server.uri()).parse().unwrap(),
            token: ApiToken::new("secret_token"),
            api_version: "2022-06-28".into(),
            timeout: Duration::from_secs(5),
        };
        NotionClient::new(config).unwrap()
    }

    fn page_json(id: &str, title: &str) -> Value {
        json!({
            "object": "page",
            "id": id,
            "created_time": "2024-01-02T03:04:05.000Z",
            "last_edited_time": "2024-01-03T03:04:05.000Z",
            "url": format!("https://www.notion.so/{}", id.replace('-', "")),
            "properties": {
                "Name": { "id": "title", "type": "title", "title": [{ "plain_text": title }] },
                "When": { "id": "abc", "type": "date", "date": { "start": "2024-02-01", "end": null, "time_zone": null } }
            }
        })
    }

    #[tokio::test]
    async fn decodes_page_and_sends_headers() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .and(matchers::path("/v1/databases/db1/query"))
            .and(matchers::header("Authorization", "Bearer secret_token"))
            .and(matchers::header("Notion-Version", "2022-06-28"))
            .and(matchers::body_json(json!({ "page_size": 50 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "object": "list",
                "results": [page_json("1111-2222", "Kickoff")],
                "has_more": true,
                "next_cursor": "cursor-2"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let page = client
            .query_database(&PageRequest::new("db1", 50))
            .await
            .unwrap();

        assert_eq!(page.next_cursor.as_deref(), Some("cursor-2"));
        assert_eq!(page.records.len(), 1);
        let record = &page.records[0];
        assert_eq!(record.id, "1111-2222");
        assert_eq!(record.text("Name").as_deref(), Some("Kickoff"));
        let when = record.property("When").and_then(PropertyValue::as_date);
        assert_eq!(when.map(|d| d.start.as_str()), Some("2024-02-01"));
        assert!(record.created_time.is_some());
    }

    #[tokio::test]
    async fn sends_filter_and_cursor() {
        let server = MockServer::start().await;
        let filter = json!({ "property": "When", "date": { "on_or_after": "2024-01-01T00:00:00Z" } });
        Mock::given(matchers::method("POST"))
            .and(matchers::body_json(json!({
                "page_size": 100,
                "filter": filter.clone(),
                "start_cursor": "c1"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "has_more": false,
                "next_cursor": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server).await;
        let request = PageRequest::new("db1", 100)
            .with_filter(Some(filter))
            .with_cursor(Some("c1".into()));
        let page = client.query_database(&request).await.unwrap();
        assert!(page.records.is_empty());
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn cursor_ignored_without_has_more() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "has_more": false,
                "next_cursor": "stale"
            })))
            .mount(&server)
            .await;

        let page = client_for(&server)
            .await
            .query_database(&PageRequest::new("db1", 100))
            .await
            .unwrap();
        assert!(page.next_cursor.is_none());
    }

    #[tokio::test]
    async fn rate_limit_carries_retry_after() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "7"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .query_database(&PageRequest::new("db1", 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), UpstreamErrorCode::RateLimited);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn status_codes_are_mapped() {
        let cases = [
            (401, UpstreamErrorCode::AuthenticationFailed),
            (403, UpstreamErrorCode::AuthorizationFailed),
            (404, UpstreamErrorCode::NotFound),
            (400, UpstreamErrorCode::BadRequest),
            (500, UpstreamErrorCode::ServerError),
            (503, UpstreamErrorCode::ServerError),
        ];

        for (status, expected) in cases {
            let server = MockServer::start().await;
            Mock::given(matchers::method("POST"))
                .respond_with(ResponseTemplate::new(status).set_body_json(json!({
                    "object": "error",
                    "status": status,
                    "code": "some_code",
                    "message": "Property Secret Plan does not exist"
                })))
                .mount(&server)
                .await;

            let err = client_for(&server)
                .await
                .query_database(&PageRequest::new("db1", 100))
                .await
                .unwrap_err();
            assert_eq!(err.code(), expected, "status {status}");
            assert!(!err.is_retryable());
            let text = err.to_string();
            assert!(!text.contains("Secret Plan"), "body leaked: {text}");
            assert!(!text.contains("secret_token"), "token leaked: {text}");
            assert!(text.contains("some_code"));
        }
    }

    #[tokio::test]
    async fn undecodable_body_is_invalid_response() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .await
            .query_database(&PageRequest::new("db1", 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), UpstreamErrorCode::InvalidResponse);
    }

    #[tokio::test]
    async fn unreachable_host_is_network_error() {
        let config = NotionConfig {
            base_url: "http://127.0.0.1:9/v1".parse().unwrap(),
            token: ApiToken::new("secret_token"),
            api_version: "2022-06-28".into(),
            timeout: Duration::from_secs(5),
        };
        let err = NotionClient::new(config)
            .unwrap()
            .query_database(&PageRequest::new("db1", 100))
            .await
            .unwrap_err();
        assert_eq!(err.code(), UpstreamErrorCode::NetworkError);
        assert!(!err.to_string().contains("secret_token"));
    }

    #[tokio::test]
    async fn usable_as_record_source() {
        let server = MockServer::start().await;
        Mock::given(matchers::method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [page_json("a", "One"), page_json("b", "Two")],
                "has_more": false
            })))
            .mount(&server)
            .await;

        let source: Box<dyn RecordSource> = Box::new(client_for(&server).await);
        assert_eq!(source.name(), "notion");
        let page = source.query_page(PageRequest::new("db1", 100)).await.unwrap();
        assert_eq!(page.records.len(), 2);
    }
}
