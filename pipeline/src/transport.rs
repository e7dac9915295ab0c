//! The HTTP transport boundary.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;

use courier_types::{ApiRequest, ApiResponse, InvokeError};

use crate::cancel::MergedCancellation;

const CONNECT_TIMEOUT_SECS: u64 = 30;
const TCP_KEEPALIVE_SECS: u64 = 60;
const POOL_MAX_IDLE_PER_HOST: usize = 100;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

/// Sends a prepared request, bounded by the merged cancellation source.
///
/// Implementations must return [`InvokeError::Cancelled`] when the merged
/// source fires mid-call and [`InvokeError::Transport`] for network
/// failures. A completed exchange is `Ok` whatever its status code -
/// interpreting a 4xx/5xx is the return hook's concern.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(
        &self,
        request: ApiRequest,
        cancel: &MergedCancellation,
    ) -> Result<ApiResponse, InvokeError>;
}

/// Process-wide reqwest client with hardened defaults.
///
/// Lazily built once and shared by every [`HttpTransport`] that is not
/// given its own client.
pub fn shared_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build shared HTTP client: {e}. Falling back to defaults.");
            reqwest::Client::new()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

/// The default reqwest-backed transport.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Transport over the process-wide shared client.
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: shared_client().clone(),
        }
    }

    /// Transport over a caller-supplied client.
    #[must_use]
    pub const fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for HttpTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send(
        &self,
        request: ApiRequest,
        cancel: &MergedCancellation,
    ) -> Result<ApiResponse, InvokeError> {
        let (method, url, headers, body) = request.into_parts();

        let mut builder = self.client.request(method, url).headers(headers);
        if let Some(body) = body {
            let content_type = body.content_type();
            let bytes = body.to_bytes().map_err(|e| {
                InvokeError::Transport(anyhow::Error::new(e).context("cannot encode request body"))
            })?;
            builder = builder
                .header(http::header::CONTENT_TYPE, content_type)
                .body(bytes);
        }

        let exchange = async move {
            let response = builder
                .send()
                .await
                .map_err(|e| InvokeError::Transport(e.into()))?;
            let status = response.status();
            let headers = response.headers().clone();
            let body = response
                .bytes()
                .await
                .map_err(|e| InvokeError::Transport(e.into()))?;
            Ok(ApiResponse::new(status, headers, body))
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(InvokeError::Cancelled),
            result = exchange => result,
        }
    }
}
