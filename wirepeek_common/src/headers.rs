//! Case-insensitive header bag as observed on the wire

use http::{HeaderMap, HeaderName};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Headers stripped before a request is forwarded upstream
const REQUEST_HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
    "host",
    "content-length",
];

/// Headers stripped before an upstream response is relayed back
const RESPONSE_HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "transfer-encoding",
    "content-length",
];

/// A single header value, or every value of a repeated header
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HeaderValue {
    Single(String),
    Multi(Vec<String>),
}

impl HeaderValue {
    /// Value as one string, repeated values joined with ", "
    pub fn joined(&self) -> String {
        match self {
            HeaderValue::Single(value) => value.clone(),
            HeaderValue::Multi(values) => values.join(", "),
        }
    }

    /// Iterate over every individual value
    pub fn values(&self) -> impl Iterator<Item = &str> {
        let slice: &[String] = match self {
            HeaderValue::Single(value) => std::slice::from_ref(value),
            HeaderValue::Multi(values) => values,
        };
        slice.iter().map(String::as_str)
    }

    fn push(&mut self, value: String) {
        match self {
            HeaderValue::Single(existing) => {
                let first = std::mem::take(existing);
                *self = HeaderValue::Multi(vec![first, value]);
            }
            HeaderValue::Multi(values) => values.push(value),
        }
    }
}

/// Header map with case-insensitive lookup that keeps names as received
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HeaderBag {
    entries: BTreeMap<String, HeaderValue>,
}

impl HeaderBag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from name/value pairs; repeated names collapse into a list
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut bag = Self::new();
        for (name, value) in pairs {
            bag.append(name.into(), value.into());
        }
        bag
    }

    /// Build from an `http` header map, lossily decoding non-UTF-8 values
    pub fn from_header_map(map: &HeaderMap) -> Self {
        Self::from_pairs(
            map.iter()
                .map(|(name, value)| (name.as_str(), String::from_utf8_lossy(value.as_bytes()))),
        )
    }

    /// Add a value, keeping any value already stored under the same name
    pub fn append(&mut self, name: String, value: String) {
        match self.key_for(&name) {
            Some(key) => {
                if let Some(existing) = self.entries.get_mut(&key) {
                    existing.push(value);
                }
            }
            None => {
                self.entries.insert(name, HeaderValue::Single(value));
            }
        }
    }

    /// Look up a header ignoring case
    pub fn get(&self, name: &str) -> Option<&HeaderValue> {
        self.entries
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }

    /// Look up a header as one string
    pub fn get_str(&self, name: &str) -> Option<String> {
        self.get(name).map(HeaderValue::joined)
    }

    /// Replace a header, keeping the existing key's spelling if present
    pub fn set(&mut self, name: &str, value: HeaderValue) {
        let key = self.key_for(name).unwrap_or_else(|| name.to_string());
        self.entries.insert(key, value);
    }

    /// Remove a header ignoring case
    pub fn remove(&mut self, name: &str) -> Option<HeaderValue> {
        let key = self.key_for(name)?;
        self.entries.remove(&key)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.key_for(name).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderValue)> {
        self.entries.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Drop headers that must not be forwarded upstream
    pub fn filter_for_request(self) -> Self {
        self.without(REQUEST_HOP_BY_HOP)
    }

    /// Drop headers that must not be relayed back to the caller
    pub fn filter_for_response(self) -> Self {
        self.without(RESPONSE_HOP_BY_HOP)
    }

    /// Check if this is a WebSocket upgrade request
    pub fn is_websocket_upgrade(&self) -> bool {
        let has_upgrade_connection = self
            .get("connection")
            .map(|v| v.values().any(|s| s.to_lowercase().contains("upgrade")))
            .unwrap_or(false);
        let has_websocket_upgrade = self
            .get("upgrade")
            .map(|v| v.values().any(|s| s.eq_ignore_ascii_case("websocket")))
            .unwrap_or(false);
        has_upgrade_connection && has_websocket_upgrade
    }

    /// Convert back into an `http` header map, skipping names or values it rejects
    pub fn to_header_map(&self) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (key, value) in &self.entries {
            let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
                continue;
            };
            for item in value.values() {
                if let Ok(header_value) = http::HeaderValue::from_str(item) {
                    map.append(name.clone(), header_value);
                }
            }
        }
        map
    }

    fn without(mut self, excluded: &[&str]) -> Self {
        self.entries
            .retain(|key, _| !excluded.iter().any(|name| key.eq_ignore_ascii_case(name)));
        self
    }

    fn key_for(&self, name: &str) -> Option<String> {
        self.entries
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
    }
}
