//! Real HTTP transport used beneath the capture policy

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tracing::{debug, warn};

use super::{POOL_IDLE_TIMEOUT_SECS, POOL_MAX_IDLE_PER_HOST};
use crate::error::BoxError;
use crate::pipeline::{HttpRequest, HttpResponse, Transport};
use crate::{Result, TapedeckError};

/// Transport that sends calls over the network with a pooled hyper client
pub struct HyperTransport {
    client: Client<HttpConnector, Full<Bytes>>,
}

impl HyperTransport {
    /// Create a new HTTP transport
    #[must_use]
    pub fn new() -> Self {
        let client = Client::builder(TokioExecutor::new())
            .pool_idle_timeout(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS))
            .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
            .build_http();

        Self { client }
    }
}

impl Default for HyperTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for HyperTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        debug!("Forwarding {} to {}", request.method(), request.uri());

        let request = request.map(Full::new);

        let response = self.client.request(request).await.map_err(|e| {
            warn!("Request failed: {e}");
            TapedeckError::Transport(Box::new(e))
        })?;

        Ok(response.map(|body| {
            body.map_err(|e| -> BoxError { Box::new(e) })
                .boxed_unsync()
        }))
    }
}
