use crate::llm::CompletionRequest;
use dashmap::DashMap;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// In-memory completion cache keyed by a hash of the full request
#[derive(Clone)]
pub struct ResponseCache {
    responses: Arc<DashMap<String, String>>,
    max_entries: usize,
}

impl ResponseCache {
    pub fn new(max_entries: usize) -> Self {
        Self {
            responses: Arc::new(DashMap::new()),
            max_entries,
        }
    }

    pub fn get(&self, request: &CompletionRequest) -> Option<String> {
        let key = Self::hash_request(request);
        self.responses.get(&key).map(|r| r.value().clone())
    }

    pub fn set(&self, request: &CompletionRequest, response: String) {
        if self.max_entries == 0 {
            return;
        }
        if self.responses.len() >= self.max_entries {
            // Simple eviction: clear 25% when full
            let to_remove: Vec<_> = self
                .responses
                .iter()
                .take((self.max_entries / 4).max(1))
                .map(|r| r.key().clone())
                .collect();
            for key in to_remove {
                self.responses.remove(&key);
            }
        }
        self.responses.insert(Self::hash_request(request), response);
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }

    fn hash_request(request: &CompletionRequest) -> String {
        let mut hasher = Sha256::new();
        hasher.update(request.system.as_bytes());
        hasher.update([0u8]);
        hasher.update(request.user.as_bytes());
        hasher.update([0u8]);
        if let Some(schema) = &request.schema {
            hasher.update(schema.name.as_bytes());
            hasher.update(schema.schema.to_string().as_bytes());
        }
        hex::encode(hasher.finalize())
    }
}
