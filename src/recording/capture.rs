//! Capture policy for record mode

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::fingerprint::short_id;
use crate::pipeline::{collect_body, full_body, HttpRequest, HttpResponse, Next, Policy};
use crate::storage::{headers_from_map, Exchange, RecordedResponse, RecordedStore};
use crate::substitution::Ruleset;
use crate::Result;

/// Pipeline policy that records every call passing through it
///
/// Exchanges are stored verbatim; substitution rules run once per side when
/// playback matches and serves them.
/// Without a store (live mode, opted-out tests) it forwards untouched.
#[derive(Clone)]
pub struct CapturePolicy {
    store: Option<Arc<RecordedStore>>,
    rules: Arc<Ruleset>,
}

impl CapturePolicy {
    /// Bind a policy to a store and ruleset
    #[must_use]
    pub fn new(store: Option<Arc<RecordedStore>>, rules: Arc<Ruleset>) -> Self {
        Self { store, rules }
    }

    /// Whether calls are being captured
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.store.is_some()
    }
}

#[async_trait]
impl Policy for CapturePolicy {
    async fn process(&self, request: HttpRequest, next: Next<'_>) -> Result<HttpResponse> {
        let Some(store) = self.store.as_ref() else {
            return next.run(request).await;
        };

        let method = request.method().as_str().to_string();
        let url = request.uri().to_string();
        let request_headers = headers_from_map(request.headers());

        // Transport failures propagate unchanged; nothing is recorded for them
        let response = next.run(request).await?;

        let (parts, body) = response.into_parts();
        let body = collect_body(body).await?;

        let exchange = Exchange {
            method,
            url,
            request_headers,
            response: RecordedResponse {
                status: parts.status.as_u16(),
                headers: headers_from_map(&parts.headers),
                body: body.clone(),
            },
        };

        // Keyed like playback log lines: on the normalized URL
        debug!(
            "Recorded exchange {}: {} {} -> {}",
            short_id(&exchange.method, &self.rules.apply(&exchange.url)),
            exchange.method,
            exchange.url,
            exchange.response.status
        );
        store.append(exchange);

        Ok(HttpResponse::from_parts(parts, full_body(body)))
    }
}
