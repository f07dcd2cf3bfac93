//! Client for the segmentation API.
//!
//! The dashboard talks to its backend through the [`Backend`] trait so the
//! refresh cycle can run against an in-memory fake in tests. The production
//! implementation, [`HttpBackend`], issues plain `GET` requests with the
//! synchronous `ureq` client and a per-request timeout.
//!
//! Failures fall into two kinds, both carried by [`FetchError`]:
//!
//! - **Network** — connection refused, timeout, non-2xx status, unreadable body
//! - **Malformed** — the body is not JSON or lacks expected fields
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::config::schema::{BackendConfig, EndpointsConfig};
use crate::model::{ChartKind, ChartPayload, SegmentDetails};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Why a request to the backend did not yield a usable payload.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {endpoint} failed: {message}")]
    Network { endpoint: String, message: String },
    #[error("malformed response from {endpoint}: {message}")]
    Malformed { endpoint: String, message: String },
}

impl FetchError {
    pub fn network(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Network {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    pub fn malformed(endpoint: &str, message: impl Into<String>) -> Self {
        Self::Malformed {
            endpoint: endpoint.to_string(),
            message: message.into(),
        }
    }

    /// Short label used in logs: `"network"` or `"malformed"`.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Network { .. } => "network",
            Self::Malformed { .. } => "malformed",
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::Network { endpoint, .. } | Self::Malformed { endpoint, .. } => endpoint,
        }
    }
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Source of dashboard data.
///
/// `Sync` is required because the three chart requests may be issued from
/// scoped threads sharing one backend.
pub trait Backend: Send + Sync {
    /// `GET` the segment details.
    fn segment_details(&self) -> Result<SegmentDetails, FetchError>;

    /// `GET` one chart payload.
    fn chart(&self, kind: ChartKind) -> Result<ChartPayload, FetchError>;
}

impl<B: Backend + ?Sized> Backend for Arc<B> {
    fn segment_details(&self) -> Result<SegmentDetails, FetchError> {
        (**self).segment_details()
    }

    fn chart(&self, kind: ChartKind) -> Result<ChartPayload, FetchError> {
        (**self).chart(kind)
    }
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// Blocking HTTP backend.
pub struct HttpBackend {
    agent: ureq::Agent,
    base_url: String,
    endpoints: EndpointsConfig,
    timeout: Duration,
}

impl HttpBackend {
    /// Build a client from the resolved config.
    pub fn from_config(config: &BackendConfig) -> Self {
        let timeout = Duration::from_millis(config.timeout_ms);
        Self {
            agent: ureq::AgentBuilder::new().timeout(timeout).build(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            endpoints: config.endpoints.clone(),
            timeout,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn endpoints(&self) -> &EndpointsConfig {
        &self.endpoints
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Absolute URL for an endpoint path.
    pub fn url(&self, path: &str) -> String {
        let url = if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        };
        // "localhost" may resolve to ::1 first and stall when the backend
        // only listens on IPv4.
        url.replace("://localhost", "://127.0.0.1")
    }

    /// Issue a `GET` and report how long a well-formed JSON answer took.
    pub fn check(&self, path: &str) -> Result<Duration, FetchError> {
        let started = Instant::now();
        self.get_json::<serde_json::Value>(path)?;
        Ok(started.elapsed())
    }

    fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let url = self.url(path);
        let response = self.agent.get(&url).call().map_err(|e| match e {
            ureq::Error::Status(code, _) => FetchError::network(path, format!("HTTP {code}")),
            ureq::Error::Transport(t) => FetchError::network(path, t.to_string()),
        })?;

        let body = response
            .into_string()
            .map_err(|e| FetchError::network(path, format!("failed to read body: {e}")))?;

        serde_json::from_str(&body).map_err(|e| FetchError::malformed(path, e.to_string()))
    }
}

impl Backend for HttpBackend {
    fn segment_details(&self) -> Result<SegmentDetails, FetchError> {
        self.get_json(&self.endpoints.segment_details)
    }

    fn chart(&self, kind: ChartKind) -> Result<ChartPayload, FetchError> {
        self.get_json(self.endpoints.chart(kind))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
