//! HTTP client: POST one question, hand back the streamed response body.

use bytes::Bytes;
use futures_util::{Stream, TryStreamExt};
use reqwest::StatusCode;

use crate::messages::{ChatRequest, ErrorBody};

/// Why an exchange with the backend failed.
#[derive(Debug, thiserror::Error)]
pub enum ExchangeError {
    /// The request could not be sent at all.
    #[error("transport unavailable: {0}")]
    TransportUnavailable(#[source] reqwest::Error),
    /// The backend answered with a non-success status.
    #[error("request rejected with status {status}: {detail}")]
    RequestRejected { status: StatusCode, detail: String },
    /// The body stream broke after the response started.
    #[error("stream read failed: {0}")]
    StreamReadFailure(#[source] std::io::Error),
}

impl ExchangeError {
    /// Short machine-friendly name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExchangeError::TransportUnavailable(_) => "transport_unavailable",
            ExchangeError::RequestRejected { .. } => "request_rejected",
            ExchangeError::StreamReadFailure(_) => "stream_read_failure",
        }
    }
}

/// Client for the single streaming chat endpoint.
#[derive(Debug, Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    endpoint_url: String,
}

impl ChatClient {
    /// `base_url` like `http://127.0.0.1:8000`, `endpoint` like `/api/chat`.
    pub fn new(base_url: &str, endpoint: &str) -> Self {
        let endpoint_url = format!(
            "{}/{}",
            base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        );
        Self {
            http: reqwest::Client::new(),
            endpoint_url,
        }
    }

    pub fn endpoint_url(&self) -> &str {
        &self.endpoint_url
    }

    /// Send `request` and return the raw body chunks once the status is known good.
    pub async fn open_stream(
        &self,
        request: &ChatRequest<'_>,
    ) -> Result<impl Stream<Item = Result<Bytes, ExchangeError>>, ExchangeError> {
        tracing::debug!(url = %self.endpoint_url, session = %request.session_id, "sending question");
        let resp = self
            .http
            .post(&self.endpoint_url)
            .json(request)
            .send()
            .await
            .map_err(ExchangeError::TransportUnavailable)?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ExchangeError::RequestRejected {
                status,
                detail: ErrorBody::detail(&body),
            });
        }

        tracing::debug!(%status, "response stream opened");
        Ok(resp
            .bytes_stream()
            .map_err(|e| ExchangeError::StreamReadFailure(std::io::Error::other(e))))
    }
}
