use crate::error::{Result, ScanError};
use crate::model::{AnalysisRequest, AnalysisResult, CommentRecord, HealthStatus};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_ENDPOINT: &str = "http://127.0.0.1:8000/analyze";

/// HTTP client for the external scoring service.
#[derive(Debug, Clone)]
pub struct ScoringClient {
    client: Client,
    endpoint: Url,
}

impl ScoringClient {
    pub fn new(endpoint: &str) -> Result<Self> {
        Self::with_timeout(endpoint, 10)
    }

    pub fn with_timeout(endpoint: &str, timeout_secs: u64) -> Result<Self> {
        let endpoint = Url::parse(endpoint)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", endpoint, e)))?;

        let client = Client::builder()
            .user_agent("Swarmwatch/0.1 (https://github.com/trapdoorsec/swarmwatch)")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .pool_idle_timeout(Duration::from_secs(90))
            .build()?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Scores a batch. Results are correlated by `comment_id`, not position.
    pub async fn analyze(&self, comments: &[CommentRecord]) -> Result<Vec<AnalysisResult>> {
        info!("Analyzing {} comments via {}", comments.len(), self.endpoint);

        let request = AnalysisRequest {
            comments: comments.to_vec(),
        };
        let start = Instant::now();
        let response = self
            .client
            .post(self.endpoint.clone())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Server {
                status: status.as_u16(),
                body,
            });
        }

        let body: serde_json::Value = response.json().await?;
        let serde_json::Value::Array(items) = body else {
            return Err(ScanError::ParseError(
                "expected a JSON array of results".to_string(),
            ));
        };

        // Decoded one entry at a time; malformed entries are dropped
        let results: Vec<AnalysisResult> = items
            .into_iter()
            .filter_map(|item| match serde_json::from_value::<AnalysisResult>(item) {
                Ok(result) => Some(result),
                Err(e) => {
                    warn!("Dropping malformed result: {}", e);
                    None
                }
            })
            .collect();
        debug!(
            "Scored {} comments in {:?}",
            results.len(),
            start.elapsed()
        );
        Ok(results)
    }

    /// Queries the service's `/health` route, a sibling of the analyze endpoint.
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = self
            .endpoint
            .join("health")
            .map_err(|e| ScanError::InvalidUrl(e.to_string()))?;

        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ScanError::Server {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response.json().await?)
    }
}
