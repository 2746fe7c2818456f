use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::coordinates::join_url;
use crate::errors::FetchError;
use crate::model::DEFAULT_FETCH_TIMEOUT_SECS;

/// Retrieves raw artifact bytes relative to a resolved root.
#[async_trait]
pub trait ArtifactFetcher: Send + Sync {
    async fn fetch(&self, root: &str, relative_path: &str) -> Result<Vec<u8>, FetchError>;
}

/// HTTP transport. One client, and so one connection pool, per fetcher.
#[derive(Clone, Debug)]
pub struct HttpFetcher {
    client: Client,
    timeout: Duration,
}

impl Default for HttpFetcher {
    fn default() -> Self {
        Self::new(Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS))
    }
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Self {
        Self::with_client(Client::new(), timeout)
    }

    pub fn with_client(client: Client, timeout: Duration) -> Self {
        Self { client, timeout }
    }
}

#[async_trait]
impl ArtifactFetcher for HttpFetcher {
    async fn fetch(&self, root: &str, relative_path: &str) -> Result<Vec<u8>, FetchError> {
        let url = join_url(root, relative_path);
        debug!(%url, "fetching policy artifact");
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|err| map_transport_error(&url, err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(FetchError::NotFound(url));
        }
        if !status.is_success() {
            return Err(FetchError::Transport(format!("{url}: status {status}")));
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| map_transport_error(&url, err))?;
        Ok(body.to_vec())
    }
}

fn map_transport_error(url: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout(url.to_string())
    } else {
        FetchError::Transport(format!("{url}: {err}"))
    }
}
