//! Playback resolver: a transport that answers from recorded exchanges

use std::sync::Arc;

use async_trait::async_trait;
use hyper::header::{HeaderValue, CONTENT_LENGTH};
use hyper::{Response, StatusCode};
use tracing::{debug, warn};

use crate::fingerprint::short_id;
use crate::matching::{Candidate, RequestMatcher};
use crate::pipeline::{full_body, HttpRequest, HttpResponse, Transport};
use crate::storage::{headers_to_map, Exchange, RecordedStore};
use crate::substitution::Ruleset;
use crate::{Result, TapedeckError};

/// Transport substitute that serves each recorded exchange at most once
#[derive(Clone)]
pub struct PlaybackResolver {
    session_key: String,
    store: Option<Arc<RecordedStore>>,
    rules: Arc<Ruleset>,
    matcher: Arc<dyn RequestMatcher>,
}

impl PlaybackResolver {
    /// Bind a resolver to a store, ruleset, and matcher
    #[must_use]
    pub fn new(
        session_key: &str,
        store: Option<Arc<RecordedStore>>,
        rules: Arc<Ruleset>,
        matcher: Arc<dyn RequestMatcher>,
    ) -> Self {
        Self {
            session_key: session_key.to_string(),
            store,
            rules,
            matcher,
        }
    }

    /// Resolve a request to its recorded response
    ///
    /// # Errors
    ///
    /// Returns `UnmatchedPlaybackRequest` if no unconsumed exchange matches,
    /// or `PlaybackUnavailable` if the session holds no store
    pub fn resolve(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let Some(store) = self.store.as_ref() else {
            return Err(TapedeckError::PlaybackUnavailable(self.session_key.clone()));
        };

        let candidate = Candidate::from_request(request);
        let id = short_id(&candidate.method, &self.rules.apply(&candidate.url));

        match store.find_and_consume(&candidate, self.matcher.as_ref(), &self.rules) {
            Some(exchange) => {
                debug!(
                    "Playback hit {}: {} {} -> {}",
                    id,
                    candidate.method,
                    candidate.url,
                    exchange.response.status
                );
                self.synthesize(&exchange)
            }
            None => {
                warn!(
                    "Playback miss {}: {} {} ({} exchanges left)",
                    id,
                    candidate.method,
                    candidate.url,
                    store.remaining()
                );
                Err(TapedeckError::UnmatchedPlaybackRequest {
                    method: candidate.method,
                    url: candidate.url,
                })
            }
        }
    }

    /// Build the response handed back to the client
    ///
    /// Substitution rules run once over the stored header values and text
    /// body, and a recorded `Content-Length` is corrected to the length
    /// actually served.
    fn synthesize(&self, exchange: &Exchange) -> Result<HttpResponse> {
        let recorded = &exchange.response;

        let status = StatusCode::from_u16(recorded.status).map_err(|e| {
            TapedeckError::InvalidRecordedResponse(format!("status {}: {e}", recorded.status))
        })?;

        let headers: Vec<(String, String)> = recorded
            .headers
            .iter()
            .map(|(name, value)| (name.clone(), self.rules.apply(value)))
            .collect();
        let body = self.rules.apply_body(&recorded.body).into_owned();

        let mut header_map = headers_to_map(&headers);
        if header_map.contains_key(CONTENT_LENGTH) {
            header_map.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        }

        let mut response = Response::new(full_body(body));
        *response.status_mut() = status;
        *response.headers_mut() = header_map;

        Ok(response)
    }
}

#[async_trait]
impl Transport for PlaybackResolver {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.resolve(&request)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::{MethodAndUrl, MethodUrlAndHeaders};
    use crate::pipeline::collect_body;
    use crate::storage::RecordedResponse;
    use bytes::Bytes;

    fn exchange(url: &str, body: &str) -> Exchange {
        Exchange {
            method: "GET".to_string(),
            url: url.to_string(),
            request_headers: vec![("x-ms-version".to_string(), "1".to_string())],
            response: RecordedResponse {
                status: 200,
                headers: vec![
                    ("Content-Length".to_string(), body.len().to_string()),
                    ("x-ms-subscription".to_string(), "sub-12345678".to_string()),
                ],
                body: Bytes::from(body.to_string()),
            },
        }
    }

    fn resolver(store: &Arc<RecordedStore>, rules: Arc<Ruleset>) -> PlaybackResolver {
        PlaybackResolver::new("t1", Some(Arc::clone(store)), rules, Arc::new(MethodAndUrl))
    }

    fn get(uri: &str) -> HttpRequest {
        hyper::Request::builder()
            .uri(uri)
            .body(Bytes::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_replay_in_recorded_order() {
        let store = Arc::new(RecordedStore::new());
        store.append(exchange("http://localhost/widgets", "R1"));
        store.append(exchange("http://localhost/widgets", "R2"));
        let resolver = resolver(&store, Arc::new(Ruleset::new()));

        for expected in ["R1", "R2"] {
            let response = resolver.send(get("http://localhost/widgets")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = collect_body(response.into_body()).await.unwrap();
            assert_eq!(body, expected);
        }

        let err = resolver.send(get("http://localhost/widgets")).await.unwrap_err();
        assert!(matches!(err, TapedeckError::UnmatchedPlaybackRequest { .. }));
    }

    #[tokio::test]
    async fn test_rules_steer_response() {
        let store = Arc::new(RecordedStore::new());
        store.append(exchange(
            "http://localhost/subscriptions/sub-12345678/widgets",
            "{\"id\":\"/subscriptions/sub-12345678/widgets/w1\"}",
        ));
        let rules = Arc::new(Ruleset::new());
        let resolver = resolver(&store, Arc::clone(&rules));

        // Rules added after the resolver was built still apply
        rules.add("sub-[0-9a-f]{8}", "sub-local").unwrap();

        let response = resolver
            .send(get("http://localhost/subscriptions/sub-87654321/widgets"))
            .await
            .unwrap();
        assert_eq!(response.headers().get("x-ms-subscription").unwrap(), "sub-local");

        let length: usize = response
            .headers()
            .get(CONTENT_LENGTH)
            .unwrap()
            .to_str()
            .unwrap()
            .parse()
            .unwrap();
        let body = collect_body(response.into_body()).await.unwrap();
        assert_eq!(body, "{\"id\":\"/subscriptions/sub-local/widgets/w1\"}");
        assert_eq!(length, body.len());
    }

    #[tokio::test]
    async fn test_unmatched_method() {
        let store = Arc::new(RecordedStore::new());
        store.append(exchange("http://localhost/widgets", "R1"));
        let resolver = resolver(&store, Arc::new(Ruleset::new()));

        let request = hyper::Request::builder()
            .method("DELETE")
            .uri("http://localhost/widgets")
            .body(Bytes::new())
            .unwrap();

        let err = resolver.send(request).await.unwrap_err();
        assert!(matches!(
            err,
            TapedeckError::UnmatchedPlaybackRequest { ref method, .. } if method == "DELETE"
        ));
        assert_eq!(store.remaining(), 1);
    }

    #[tokio::test]
    async fn test_header_matcher_extension() {
        let store = Arc::new(RecordedStore::new());
        store.append(exchange("http://localhost/widgets", "v1"));
        let resolver = PlaybackResolver::new(
            "t1",
            Some(Arc::clone(&store)),
            Arc::new(Ruleset::new()),
            Arc::new(MethodUrlAndHeaders::new(["x-ms-version"])),
        );

        let wrong = hyper::Request::builder()
            .uri("http://localhost/widgets")
            .header("x-ms-version", "2")
            .body(Bytes::new())
            .unwrap();
        assert!(resolver.send(wrong).await.is_err());

        let right = hyper::Request::builder()
            .uri("http://localhost/widgets")
            .header("x-ms-version", "1")
            .body(Bytes::new())
            .unwrap();
        assert!(resolver.send(right).await.is_ok());
    }

    #[tokio::test]
    async fn test_without_store() {
        let resolver =
            PlaybackResolver::new("t1", None, Arc::new(Ruleset::new()), Arc::new(MethodAndUrl));

        let err = resolver.send(get("http://localhost/widgets")).await.unwrap_err();
        assert!(matches!(err, TapedeckError::PlaybackUnavailable(_)));
    }

    #[test]
    fn test_invalid_recorded_status() {
        let store = Arc::new(RecordedStore::new());
        let mut bad = exchange("http://localhost/widgets", "");
        bad.response.status = 42;
        store.append(bad);

        let err = resolver(&store, Arc::new(Ruleset::new()))
            .resolve(&get("http://localhost/widgets"))
            .unwrap_err();
        assert!(matches!(err, TapedeckError::InvalidRecordedResponse(_)));
    }
}
