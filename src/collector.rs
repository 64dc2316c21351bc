//! Remote collector client
//!
//! The collector accepts two operations: "ingest batch" and "end
//! session". Any acknowledging 2xx response is delivery success; every
//! other outcome, transport failure included, is a delivery failure the
//! retry queue absorbs.

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::debug;

use crate::error::TelemetryError;
use crate::types::{Batch, CloseRequest, CloseResponse, IngestRequest, IngestResponse};

/// Request timeout; a hung collector must not wedge the flush path for
/// longer than this.
const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Delivery seam for the session controller. Implemented over HTTP in
/// production and scripted in tests.
#[async_trait]
pub trait Collector {
    /// Deliver one batch of feature frames.
    async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, TelemetryError>;

    /// Close the session; the response may carry an operator-facing
    /// report string.
    async fn end_session(&self, timestamp: i64) -> Result<CloseResponse, TelemetryError>;
}

#[async_trait]
impl<'a, T: Collector + Sync> Collector for &'a T {
    async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, TelemetryError> {
        (**self).ingest(batch).await
    }

    async fn end_session(&self, timestamp: i64) -> Result<CloseResponse, TelemetryError> {
        (**self).end_session(timestamp).await
    }
}

/// HTTP collector speaking the `/data` + `/end_session` endpoints.
#[derive(Debug, Clone)]
pub struct HttpCollector {
    client: Client,
    base_url: String,
}

impl HttpCollector {
    /// Create a client against a collector base URL, e.g.
    /// `http://localhost:8000/api`.
    pub fn new(base_url: impl Into<String>) -> Result<Self, TelemetryError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| TelemetryError::DeliveryError(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl Collector for HttpCollector {
    async fn ingest(&self, batch: &Batch) -> Result<IngestResponse, TelemetryError> {
        let body = IngestRequest { frames: &batch.frames };
        let response = self
            .client
            .post(self.endpoint("data"))
            .json(&body)
            .send()
            .await
            .map_err(|e| TelemetryError::DeliveryError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::CollectorStatus(status.as_u16()));
        }

        let ack: IngestResponse = response
            .json()
            .await
            .unwrap_or(IngestResponse { status: None, processed: None });
        debug!(frames = batch.frames.len(), processed = ?ack.processed, "batch delivered");
        Ok(ack)
    }

    async fn end_session(&self, timestamp: i64) -> Result<CloseResponse, TelemetryError> {
        let body = CloseRequest { timestamp };
        let response = self
            .client
            .post(self.endpoint("end_session"))
            .json(&body)
            .send()
            .await
            .map_err(|e| TelemetryError::SessionCloseError(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TelemetryError::CollectorStatus(status.as_u16()));
        }

        response
            .json()
            .await
            .map_err(|e| TelemetryError::SessionCloseError(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_endpoint_joins_paths() {
        let collector = HttpCollector::new("http://localhost:8000/api").unwrap();
        assert_eq!(collector.endpoint("data"), "http://localhost:8000/api/data");
        assert_eq!(
            collector.endpoint("end_session"),
            "http://localhost:8000/api/end_session"
        );
    }

    #[test]
    fn test_endpoint_tolerates_trailing_slash() {
        let collector = HttpCollector::new("http://localhost:8000/api/").unwrap();
        assert_eq!(collector.endpoint("data"), "http://localhost:8000/api/data");
    }
}
