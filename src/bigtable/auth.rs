//! # Access Tokens
//!
//! OAuth2 bearer tokens for the Bigtable REST endpoints. Tokens come from a
//! fixed value (e.g. `gcloud auth print-access-token`), from the GCE/Cloud Run
//! metadata server, or are omitted entirely when talking to a local endpoint.

use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;

use super::errors::{BigtableError, BigtableResult};

/// Default metadata server token endpoint
pub const DEFAULT_METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";

/// Refresh this long before the reported expiry
const EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
struct MetadataToken {
    access_token: String,
    expires_in: u64,
}

/// A fetched token and when it stops being usable
#[derive(Debug, Clone)]
pub struct CachedToken {
    value: String,
    expires_at: Instant,
}

/// Where bearer tokens come from
pub enum TokenSource {
    /// No `Authorization` header
    Anonymous,
    /// A fixed token
    Static(String),
    /// Fetched from the metadata server and cached until near expiry
    Metadata {
        url: String,
        cached: Mutex<Option<CachedToken>>,
    },
}

impl std::fmt::Debug for TokenSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenSource::Anonymous => f.write_str("Anonymous"),
            TokenSource::Static(_) => f.write_str("Static([REDACTED])"),
            TokenSource::Metadata { url, .. } => {
                f.debug_struct("Metadata").field("url", url).finish()
            }
        }
    }
}

impl TokenSource {
    pub fn metadata(url: impl Into<String>) -> Self {
        TokenSource::Metadata {
            url: url.into(),
            cached: Mutex::new(None),
        }
    }

    /// `Authorization` header value, if any
    pub async fn authorization(
        &self,
        client: &reqwest::Client,
    ) -> BigtableResult<Option<String>> {
        match self {
            TokenSource::Anonymous => Ok(None),
            TokenSource::Static(token) => Ok(Some(format!("Bearer {}", token))),
            TokenSource::Metadata { url, cached } => {
                let mut guard = cached.lock().await;
                if let Some(token) = guard.as_ref() {
                    if Instant::now() + EXPIRY_SLACK < token.expires_at {
                        return Ok(Some(format!("Bearer {}", token.value)));
                    }
                }

                let fresh = fetch_metadata_token(client, url).await?;
                tracing::debug!(expires_in = fresh.expires_in, "refreshed access token");
                let token = CachedToken {
                    value: fresh.access_token,
                    expires_at: Instant::now() + Duration::from_secs(fresh.expires_in),
                };
                let header = format!("Bearer {}", token.value);
                *guard = Some(token);
                Ok(Some(header))
            }
        }
    }
}

async fn fetch_metadata_token(client: &reqwest::Client, url: &str) -> BigtableResult<MetadataToken> {
    let response = client
        .get(url)
        .header("Metadata-Flavor", "Google")
        .send()
        .await
        .map_err(|e| BigtableError::Auth(format!("metadata token request failed: {}", e)))?;

    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        return Err(BigtableError::Auth(format!(
            "metadata token request failed (status={}): {}",
            status, body
        )));
    }

    response
        .json::<MetadataToken>()
        .await
        .map_err(|e| BigtableError::Auth(format!("metadata token read failed: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use axum::http::HeaderMap;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    async fn spawn_metadata_server(hits: Arc<AtomicUsize>, expires_in: u64) -> String {
        let app = Router::new().route(
            "/token",
            get(move |headers: HeaderMap| {
                let hits = hits.clone();
                async move {
                    assert_eq!(
                        headers.get("Metadata-Flavor").and_then(|v| v.to_str().ok()),
                        Some("Google")
                    );
                    let n = hits.fetch_add(1, Ordering::SeqCst);
                    Json(json!({
                        "access_token": format!("tok-{}", n),
                        "expires_in": expires_in,
                        "token_type": "Bearer"
                    }))
                }
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}/token", addr)
    }

    #[tokio::test]
    async fn test_anonymous_and_static() {
        let client = reqwest::Client::new();
        assert_eq!(TokenSource::Anonymous.authorization(&client).await.unwrap(), None);
        assert_eq!(
            TokenSource::Static("abc".to_string())
                .authorization(&client)
                .await
                .unwrap(),
            Some("Bearer abc".to_string())
        );
    }

    #[test]
    fn test_debug_redacts_static_token() {
        let debug = format!("{:?}", TokenSource::Static("hunter2".to_string()));
        assert!(!debug.contains("hunter2"));
    }

    #[tokio::test]
    async fn test_metadata_token_is_cached() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_metadata_server(hits.clone(), 3600).await;
        let source = TokenSource::metadata(url);
        let client = reqwest::Client::new();

        let first = source.authorization(&client).await.unwrap();
        let second = source.authorization(&client).await.unwrap();
        assert_eq!(first, Some("Bearer tok-0".to_string()));
        assert_eq!(first, second);
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_metadata_token_near_expiry_is_refreshed() {
        let hits = Arc::new(AtomicUsize::new(0));
        let url = spawn_metadata_server(hits.clone(), 30).await;
        let source = TokenSource::metadata(url);
        let client = reqwest::Client::new();

        source.authorization(&client).await.unwrap();
        let second = source.authorization(&client).await.unwrap();
        assert_eq!(second, Some("Bearer tok-1".to_string()));
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_metadata_failure_is_auth_error() {
        let source = TokenSource::metadata("http://127.0.0.1:9/token");
        let client = reqwest::Client::new();
        let err = source.authorization(&client).await.unwrap_err();
        assert!(matches!(err, BigtableError::Auth(_)));
    }
}
