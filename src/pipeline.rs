//! Pipeline and transport seams the harness plugs into
//!
//! Requests travel fully buffered; responses carry a streaming body that a
//! policy may read once and re-expose.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::combinators::UnsyncBoxBody;
use http_body_util::{BodyExt, Full};

use crate::error::BoxError;
use crate::{Result, TapedeckError};

/// Outgoing request with a buffered body
pub type HttpRequest = hyper::Request<Bytes>;

/// Response body as seen by the pipeline
pub type Body = UnsyncBoxBody<Bytes, BoxError>;

/// Response flowing back through the pipeline
pub type HttpResponse = hyper::Response<Body>;

/// Wrap fully buffered bytes as a response body
#[must_use]
pub fn full_body(bytes: impl Into<Bytes>) -> Body {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed_unsync()
}

/// Read a body to completion
///
/// # Errors
///
/// Returns error if the underlying stream fails
pub async fn collect_body(body: Body) -> Result<Bytes> {
    let collected = body.collect().await.map_err(TapedeckError::Transport)?;
    Ok(collected.to_bytes())
}

/// Sends one call and produces its response
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send a request
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// A stage invoked once per outgoing call
#[async_trait]
pub trait Policy: Send + Sync {
    /// Handle a request, delegating to `next` for the rest of the pipeline
    async fn process(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse>;
}

/// Remainder of a pipeline after the current policy
#[derive(Clone, Copy)]
pub struct Next<'a> {
    policies: &'a [Arc<dyn Policy>],
    transport: &'a dyn Transport,
}

impl<'a> Next<'a> {
    /// Run the remaining policies, then the transport
    ///
    /// # Errors
    ///
    /// Returns whatever error a later stage produces
    pub async fn run(self, request: HttpRequest) -> Result<HttpResponse> {
        match self.policies.split_first() {
            Some((policy, rest)) => {
                let next = Next {
                    policies: rest,
                    transport: self.transport,
                };
                policy.process(request, next).await
            }
            None => self.transport.send(request).await,
        }
    }
}

/// Ordered policies in front of a transport
pub struct Pipeline {
    policies: Vec<Arc<dyn Policy>>,
    transport: Arc<dyn Transport>,
}

impl Pipeline {
    /// Create a pipeline with no policies
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            policies: Vec::new(),
            transport,
        }
    }

    /// Append a policy; earlier policies run first
    #[must_use]
    pub fn with_policy(mut self, policy: impl Policy + 'static) -> Self {
        self.policies.push(Arc::new(policy));
        self
    }

    /// Number of policies
    #[must_use]
    pub fn policy_count(&self) -> usize {
        self.policies.len()
    }

    /// Send a request through every policy and the transport
    ///
    /// # Errors
    ///
    /// Returns error from any policy or from the transport
    pub async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Next {
            policies: &self.policies,
            transport: self.transport.as_ref(),
        }
        .run(request)
        .await
    }
}

#[async_trait]
impl Transport for Pipeline {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        Pipeline::send(self, request).await
    }
}
