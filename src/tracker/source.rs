//! External score API client

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::models::LiveScoreMessage;

/// Current score as reported by the score API
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSnapshot {
    pub event_id: i64,
    pub current_score: String,
}

impl From<ScoreSnapshot> for LiveScoreMessage {
    fn from(snapshot: ScoreSnapshot) -> Self {
        LiveScoreMessage::new(snapshot.event_id, snapshot.current_score)
    }
}

/// Where current scores come from
#[async_trait]
pub trait ScoreSource: Send + Sync {
    async fn current_score(&self, event_id: i64) -> Result<ScoreSnapshot>;
}

/// `GET {base_url}/{event_id}` against the score API
#[derive(Debug, Clone)]
pub struct RestScoreSource {
    client: Client,
    base_url: String,
}

impl RestScoreSource {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, event_id: i64) -> String {
        format!("{}/{}", self.base_url, event_id)
    }
}

#[async_trait]
impl ScoreSource for RestScoreSource {
    async fn current_score(&self, event_id: i64) -> Result<ScoreSnapshot> {
        info!(event_id, "Querying live score");

        let response = self.client.get(self.url(event_id)).send().await?;
        let status = response.status();

        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(Error::http(format!(
                "Score API returned {} for event {}",
                status, event_id
            )));
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(Error::validation(format!(
                "Score API rejected event {} with {}: {}",
                event_id, status, body
            )));
        }

        let snapshot: ScoreSnapshot = response.json().await?;
        debug!(
            event_id = snapshot.event_id,
            current_score = %snapshot.current_score,
            "Live score retrieved"
        );

        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn source(server: &MockServer) -> RestScoreSource {
        RestScoreSource::new(&format!("{}/mock/status/", server.uri()), Duration::from_secs(2))
            .unwrap()
    }

    #[tokio::test]
    async fn test_fetches_current_score() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/mock/status/1234"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"eventId": 1234, "currentScore": "3:2"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let snapshot = source(&server).await.current_score(1234).await.unwrap();

        assert_eq!(
            snapshot,
            ScoreSnapshot {
                event_id: 1234,
                current_score: "3:2".to_string()
            }
        );
        let message = LiveScoreMessage::from(snapshot);
        assert_eq!(message.current_score, "3:2");
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = source(&server).await.current_score(1234).await.unwrap_err();

        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_not_found_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("no such event"))
            .mount(&server)
            .await;

        let err = source(&server).await.current_score(4321).await.unwrap_err();

        assert!(!err.is_retryable());
        assert!(err.to_string().contains("4321"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_not_retryable() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&server)
            .await;

        let err = source(&server).await.current_score(1234).await.unwrap_err();

        assert!(!err.is_retryable());
    }

    #[test]
    fn test_base_url_is_normalized() {
        let source = RestScoreSource::new("http://localhost:8080/mock/status/", Duration::from_secs(1))
            .unwrap();
        assert_eq!(source.base_url(), "http://localhost:8080/mock/status");
        assert_eq!(source.url(1234), "http://localhost:8080/mock/status/1234");
    }
}
