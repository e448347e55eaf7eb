//! In-memory representation of a captured exchange

use bytes::Bytes;
use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use tracing::warn;

/// Ordered header list; names compare case-insensitively
pub type Headers = Vec<(String, String)>;

/// One captured HTTP interaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exchange {
    /// Request method
    pub method: String,
    /// Request URL, including any query
    pub url: String,
    /// Request headers
    pub request_headers: Headers,
    /// Recorded response
    pub response: RecordedResponse,
}

/// Response half of an exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedResponse {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: Headers,
    /// Fully buffered response body
    pub body: Bytes,
}

impl Exchange {
    /// Look up a request header by case-insensitive name
    #[must_use]
    pub fn request_header(&self, name: &str) -> Option<&str> {
        header_value(&self.request_headers, name)
    }
}

/// Look up a header by case-insensitive name
#[must_use]
pub fn header_value<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Flatten a header map, joining repeated names with ", "
#[must_use]
pub fn headers_from_map(map: &HeaderMap) -> Headers {
    map.keys()
        .map(|name| {
            let value = map
                .get_all(name)
                .iter()
                .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
                .collect::<Vec<_>>()
                .join(", ");
            (name.as_str().to_string(), value)
        })
        .collect()
}

/// Build a header map, skipping entries that are not valid HTTP headers
#[must_use]
pub fn headers_to_map(headers: &[(String, String)]) -> HeaderMap {
    let mut map = HeaderMap::with_capacity(headers.len());

    for (name, value) in headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                map.append(name, value);
            }
            _ => warn!("Skipping invalid recorded header '{}'", name),
        }
    }

    map
}
