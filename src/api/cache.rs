use super::endpoint::Endpoint;
use super::transport::RawResponse;
use serde_json::Value;
use std::collections::HashMap;

/// Last response per gateway endpoint. An absent entry means the endpoint was
/// never fetched, answered 404, or failed on its last regular fetch.
#[derive(Debug, Clone, Default)]
pub struct EndpointCache {
    entries: HashMap<Endpoint, RawResponse>,
}

impl EndpointCache {
    pub fn new() -> EndpointCache {
        EndpointCache::default()
    }

    pub fn get(&self, endpoint: Endpoint) -> Option<&RawResponse> {
        self.entries.get(&endpoint)
    }

    pub fn contains(&self, endpoint: Endpoint) -> bool {
        self.entries.contains_key(&endpoint)
    }

    /// Decoded body of the cached response, `None` when absent or not JSON.
    pub fn json(&self, endpoint: Endpoint) -> Option<Value> {
        self.get(endpoint).and_then(RawResponse::json)
    }

    pub fn insert(&mut self, endpoint: Endpoint, response: RawResponse) {
        self.entries.insert(endpoint, response);
    }

    /// Record the outcome of a completed fetch (`None` for 404). Installer
    /// endpoints only take successful responses and otherwise keep what they
    /// had.
    pub fn apply(&mut self, endpoint: Endpoint, fetched: Option<RawResponse>) {
        if endpoint.installer_only() {
            match fetched {
                Some(response) if response.is_ok() => self.insert(endpoint, response),
                _ => log::debug!("Keeping previous {} response", endpoint),
            }
            return;
        }

        match fetched {
            Some(response) => self.insert(endpoint, response),
            None => {
                self.entries.remove(&endpoint);
            }
        }
    }

    /// Record a failed fetch.
    pub fn invalidate(&mut self, endpoint: Endpoint) {
        if !endpoint.installer_only() {
            self.entries.remove(&endpoint);
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
