//! JSON session file format
//!
//! ```json
//! {
//!   "networkCallRecords": [
//!     { "Method": "GET", "Url": "...", "Headers": {},
//!       "Response": { "Status": 200, "Headers": {}, "Body": "..." } }
//!   ],
//!   "variables": { "name": "value" }
//! }
//! ```
//!
//! Header objects keep their on-disk order. Bodies that are not UTF-8 are
//! stored hex-encoded with `"BodyEncoding": "hex"`.

use std::collections::BTreeMap;

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use super::exchange::{Exchange, Headers, RecordedResponse};

/// Root of a session file
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedData {
    /// Exchanges in capture order
    #[serde(rename = "networkCallRecords", default)]
    pub network_call_records: Vec<NetworkCallRecord>,
    /// Named variables stashed by the test
    #[serde(default)]
    pub variables: BTreeMap<String, String>,
}

/// One exchange as persisted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetworkCallRecord {
    /// Request method
    pub method: String,
    /// Request URL
    pub url: String,
    /// Request headers
    #[serde(with = "ordered_headers", default)]
    pub headers: Headers,
    /// Recorded response
    pub response: ResponseRecord,
}

/// Response half of a persisted exchange
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResponseRecord {
    /// HTTP status code
    pub status: u16,
    /// Response headers
    #[serde(with = "ordered_headers", default)]
    pub headers: Headers,
    /// Body text, or hex when `body_encoding` says so
    #[serde(default)]
    pub body: String,
    /// Encoding of `body`; absent means UTF-8 text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body_encoding: Option<BodyEncoding>,
}

/// Encoding applied to a persisted body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BodyEncoding {
    /// Lowercase hex of the raw bytes
    Hex,
}

impl From<&Exchange> for NetworkCallRecord {
    fn from(exchange: &Exchange) -> Self {
        let (body, body_encoding) = match std::str::from_utf8(&exchange.response.body) {
            Ok(text) => (text.to_string(), None),
            Err(_) => (hex::encode(&exchange.response.body), Some(BodyEncoding::Hex)),
        };

        Self {
            method: exchange.method.clone(),
            url: exchange.url.clone(),
            headers: exchange.request_headers.clone(),
            response: ResponseRecord {
                status: exchange.response.status,
                headers: exchange.response.headers.clone(),
                body,
                body_encoding,
            },
        }
    }
}

impl TryFrom<NetworkCallRecord> for Exchange {
    type Error = hex::FromHexError;

    fn try_from(record: NetworkCallRecord) -> Result<Self, Self::Error> {
        let body = match record.response.body_encoding {
            Some(BodyEncoding::Hex) => Bytes::from(hex::decode(&record.response.body)?),
            None => Bytes::from(record.response.body),
        };

        Ok(Self {
            method: record.method,
            url: record.url,
            request_headers: record.headers,
            response: RecordedResponse {
                status: record.response.status,
                headers: record.response.headers,
                body,
            },
        })
    }
}

/// Serialize a header list as a JSON object without reordering it
mod ordered_headers {
    use std::fmt;

    use serde::de::{MapAccess, Visitor};
    use serde::ser::SerializeMap;
    use serde::{Deserializer, Serializer};

    use super::Headers;

    pub fn serialize<S: Serializer>(headers: &Headers, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(headers.len()))?;
        for (name, value) in headers {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Headers, D::Error> {
        struct HeaderVisitor;

        impl<'de> Visitor<'de> for HeaderVisitor {
            type Value = Headers;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map of header names to values")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Headers, A::Error> {
                let mut headers = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((name, value)) = access.next_entry::<String, String>()? {
                    headers.push((name, value));
                }
                Ok(headers)
            }
        }

        deserializer.deserialize_map(HeaderVisitor)
    }
}
