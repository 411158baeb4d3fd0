//! Deterministic completion service for tests and dry runs.

use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionService};
use async_trait::async_trait;
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
enum Reply {
    Text(String),
    Fail,
}

#[derive(Debug, Default)]
struct MockState {
    rules: Vec<(String, Reply)>,
    requests: Vec<CompletionRequest>,
}

/// Returns canned responses picked by prompt substring.
///
/// Rules are checked in insertion order against the system prompt and then
/// the user prompt; the first rule whose needle appears wins. Clones share
/// state, so a clone handed to a stage still counts calls for the test.
#[derive(Debug, Clone)]
pub struct MockService {
    default_response: String,
    state: Arc<Mutex<MockState>>,
}

impl MockService {
    pub fn new(default_response: impl Into<String>) -> Self {
        Self {
            default_response: default_response.into(),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Respond with `response` when `needle` appears in the prompt
    pub fn when(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.lock()
            .rules
            .push((needle.into(), Reply::Text(response.into())));
        self
    }

    /// Fail with a non-retryable API error when `needle` appears in the prompt
    pub fn fail_when(self, needle: impl Into<String>) -> Self {
        self.lock().rules.push((needle.into(), Reply::Fail));
        self
    }

    pub fn call_count(&self) -> usize {
        self.lock().requests.len()
    }

    /// Every request received so far, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock().requests.clone()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for MockService {
    fn default() -> Self {
        Self::new("{}")
    }
}

#[async_trait]
impl CompletionService for MockService {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        let mut state = self.lock();
        state.requests.push(request.clone());

        let reply = state
            .rules
            .iter()
            .find(|(needle, _)| request.system.contains(needle) || request.user.contains(needle))
            .map(|(_, reply)| reply.clone());

        match reply {
            Some(Reply::Text(text)) => Ok(text),
            Some(Reply::Fail) => Err(LlmError::Api {
                status: 400,
                message: "mock failure".to_string(),
            }),
            None => Ok(self.default_response.clone()),
        }
    }

    fn name(&self) -> &str {
        "mock"
    }
}
