//! Recorded exchange store shared by a session's capture and playback sides

use std::collections::BTreeMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

use dashmap::DashMap;

use super::exchange::Exchange;
use super::format::{NetworkCallRecord, RecordedData};
use crate::matching::{Candidate, RequestMatcher};
use crate::substitution::Ruleset;

#[derive(Debug)]
struct Slot {
    exchange: Exchange,
    consumed: bool,
}

/// Ordered exchanges plus named variables
///
/// Appends and consumption both go through one mutex, so concurrent callers
/// never corrupt the sequence and never receive the same exchange twice.
#[derive(Debug, Default)]
pub struct RecordedStore {
    slots: Mutex<Vec<Slot>>,
    variables: DashMap<String, String>,
}

impl RecordedStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild a store from its persisted form
    ///
    /// # Errors
    ///
    /// Returns error if a hex-encoded body cannot be decoded
    pub fn from_data(data: RecordedData) -> Result<Self, hex::FromHexError> {
        let slots = data
            .network_call_records
            .into_iter()
            .map(|record| {
                Exchange::try_from(record).map(|exchange| Slot {
                    exchange,
                    consumed: false,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            slots: Mutex::new(slots),
            variables: data.variables.into_iter().collect(),
        })
    }

    /// Snapshot the store in its persisted form
    #[must_use]
    pub fn to_data(&self) -> RecordedData {
        let network_call_records = self
            .lock_slots()
            .iter()
            .map(|slot| NetworkCallRecord::from(&slot.exchange))
            .collect();

        RecordedData {
            network_call_records,
            variables: self.variables_snapshot(),
        }
    }

    /// Append a captured exchange
    pub fn append(&self, exchange: Exchange) {
        self.lock_slots().push(Slot {
            exchange,
            consumed: false,
        });
    }

    /// Find the first unconsumed exchange answering `candidate` and consume it
    ///
    /// The check and the mark happen under the same lock.
    pub fn find_and_consume(
        &self,
        candidate: &Candidate,
        matcher: &dyn RequestMatcher,
        rules: &Ruleset,
    ) -> Option<Exchange> {
        let candidate = candidate.normalized(rules);
        let mut slots = self.lock_slots();

        let slot = slots
            .iter_mut()
            .find(|slot| !slot.consumed && matcher.matches(&slot.exchange, &candidate, rules))?;
        slot.consumed = true;

        Some(slot.exchange.clone())
    }

    /// Total number of exchanges
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    /// Whether the store holds no exchanges
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_slots().is_empty()
    }

    /// Number of exchanges not yet consumed
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.lock_slots().iter().filter(|slot| !slot.consumed).count()
    }

    /// Copy of every exchange in order
    #[must_use]
    pub fn exchanges(&self) -> Vec<Exchange> {
        self.lock_slots()
            .iter()
            .map(|slot| slot.exchange.clone())
            .collect()
    }

    /// Direct access to the variable map
    #[must_use]
    pub fn variables(&self) -> &DashMap<String, String> {
        &self.variables
    }

    /// Set a variable, returning the previous value
    pub fn set_variable(&self, name: &str, value: &str) -> Option<String> {
        self.variables.insert(name.to_string(), value.to_string())
    }

    /// Read a variable
    #[must_use]
    pub fn variable(&self, name: &str) -> Option<String> {
        self.variables.get(name).map(|v| v.value().clone())
    }

    /// Remove and return a variable
    pub fn take_variable(&self, name: &str) -> Option<String> {
        self.variables.remove(name).map(|(_, value)| value)
    }

    /// Number of variables
    #[must_use]
    pub fn variable_count(&self) -> usize {
        self.variables.len()
    }

    /// Variables sorted by name
    #[must_use]
    pub fn variables_snapshot(&self) -> BTreeMap<String, String> {
        self.variables
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().clone()))
            .collect()
    }

    fn lock_slots(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::MethodAndUrl;
    use crate::storage::RecordedResponse;
    use bytes::Bytes;
    use std::sync::Arc;
    use std::thread;

    fn exchange(method: &str, url: &str, body: &str) -> Exchange {
        Exchange {
            method: method.to_string(),
            url: url.to_string(),
            request_headers: vec![],
            response: RecordedResponse {
                status: 200,
                headers: vec![],
                body: Bytes::from(body.to_string()),
            },
        }
    }

    #[test]
    fn test_append_preserves_order() {
        let store = RecordedStore::new();
        store.append(exchange("GET", "/a", "1"));
        store.append(exchange("GET", "/b", "2"));

        let urls: Vec<_> = store.exchanges().into_iter().map(|e| e.url).collect();
        assert_eq!(urls, vec!["/a", "/b"]);
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_first_unconsumed_match_wins() {
        let store = RecordedStore::new();
        let rules = Ruleset::new();
        store.append(exchange("GET", "/widgets", "R1"));
        store.append(exchange("POST", "/widgets", "created"));
        store.append(exchange("GET", "/widgets", "R2"));

        let candidate = Candidate::new("GET", "/widgets");
        let first = store.find_and_consume(&candidate, &MethodAndUrl, &rules).unwrap();
        let second = store.find_and_consume(&candidate, &MethodAndUrl, &rules).unwrap();

        assert_eq!(first.response.body, "R1");
        assert_eq!(second.response.body, "R2");
        assert!(store.find_and_consume(&candidate, &MethodAndUrl, &rules).is_none());
        assert_eq!(store.remaining(), 1);
    }

    #[test]
    fn test_variables() {
        let store = RecordedStore::new();
        assert_eq!(store.set_variable("widget", "w-1"), None);
        assert_eq!(store.set_variable("widget", "w-2"), Some("w-1".to_string()));
        store.variables().insert("zone".to_string(), "z".to_string());

        assert_eq!(store.variable("widget"), Some("w-2".to_string()));
        assert_eq!(store.variable_count(), 2);
        assert_eq!(
            store.variables_snapshot().keys().collect::<Vec<_>>(),
            vec!["widget", "zone"]
        );

        assert_eq!(store.take_variable("widget"), Some("w-2".to_string()));
        assert_eq!(store.variable("widget"), None);
    }

    #[test]
    fn test_data_round_trip() {
        let store = RecordedStore::new();
        store.append(exchange("GET", "/a", "one"));
        store.append(exchange("DELETE", "/a", ""));
        store.set_variable("name", "a");

        let restored = RecordedStore::from_data(store.to_data()).unwrap();
        assert_eq!(restored.exchanges(), store.exchanges());
        assert_eq!(restored.variables_snapshot(), store.variables_snapshot());
        assert_eq!(restored.remaining(), 2);
    }

    #[test]
    fn test_concurrent_appends() {
        let store = Arc::new(RecordedStore::new());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = Arc::clone(&store);
                thread::spawn(move || {
                    for i in 0..50 {
                        store.append(exchange("GET", &format!("/t{t}/{i}"), ""));
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 400);
        // Per-thread order survives any interleaving
        let exchanges = store.exchanges();
        for t in 0..8 {
            let prefix = format!("/t{t}/");
            let seen: Vec<usize> = exchanges
                .iter()
                .filter_map(|e| e.url.strip_prefix(&prefix))
                .map(|i| i.parse().unwrap())
                .collect();
            assert_eq!(seen, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_concurrent_consume_at_most_once() {
        let store = Arc::new(RecordedStore::new());
        let rules = Arc::new(Ruleset::new());
        for i in 0..16 {
            store.append(exchange("GET", "/widgets", &i.to_string()));
        }

        let handles: Vec<_> = (0..20)
            .map(|_| {
                let store = Arc::clone(&store);
                let rules = Arc::clone(&rules);
                thread::spawn(move || {
                    store.find_and_consume(&Candidate::new("GET", "/widgets"), &MethodAndUrl, &rules)
                })
            })
            .collect();

        let mut bodies: Vec<String> = handles
            .into_iter()
            .filter_map(|h| h.join().unwrap())
            .map(|e| String::from_utf8(e.response.body.to_vec()).unwrap())
            .collect();
        bodies.sort_by_key(|b| b.parse::<u32>().unwrap());

        assert_eq!(bodies, (0..16).map(|i| i.to_string()).collect::<Vec<_>>());
        assert_eq!(store.remaining(), 0);
    }
}
