use crate::cache::ResponseCache;
use crate::error::LlmError;
use crate::llm::{CompletionRequest, CompletionService};
use crate::retry::RetryPolicy;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tracing::debug;

/// Handle every stage uses to talk to the completion service.
///
/// Built once by the pipeline driver and cloned into each stage; clones share
/// the service and the cache.
#[derive(Clone)]
pub struct Generator {
    service: Arc<dyn CompletionService>,
    retry: RetryPolicy,
    cache: Option<ResponseCache>,
    request_timeout: Duration,
    request_delay: Duration,
    max_concurrent: usize,
}

impl Generator {
    pub fn new(service: Arc<dyn CompletionService>) -> Self {
        Self {
            service,
            retry: RetryPolicy::default(),
            cache: None,
            request_timeout: Duration::from_secs(60),
            request_delay: Duration::ZERO,
            max_concurrent: 1,
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_cache(mut self, cache: ResponseCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    /// Fixed pause before every uncached request
    pub fn with_delay(mut self, request_delay: Duration) -> Self {
        self.request_delay = request_delay;
        self
    }

    /// Articles processed at once by each stage
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn cache(&self) -> Option<&ResponseCache> {
        self.cache.as_ref()
    }

    /// Completion parsed into `T`, constrained by `T`'s JSON schema.
    ///
    /// Only transport failures are retried; a reply that does not parse is
    /// returned as `NoStructuredResponse` straight away.
    pub async fn generate_structured<T>(&self, system: &str, user: &str) -> Result<T, LlmError>
    where
        T: JsonSchema + DeserializeOwned,
    {
        let request = CompletionRequest::structured::<T>(system, user);

        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&request)) {
            if let Ok(value) = parse_structured::<T>(&cached) {
                debug!(service = self.service.name(), "Cache hit");
                return Ok(value);
            }
        }

        let operation = request
            .schema
            .as_ref()
            .map_or("completion", |schema| schema.name.as_str());

        let request = &request;
        self.retry
            .retry(operation, move || async move {
                let raw = self.call(request).await?;
                let value = parse_structured::<T>(&raw)?;
                if let Some(cache) = &self.cache {
                    cache.set(request, raw);
                }
                Ok::<T, LlmError>(value)
            })
            .await
    }

    async fn call(&self, request: &CompletionRequest) -> Result<String, LlmError> {
        if !self.request_delay.is_zero() {
            sleep(self.request_delay).await;
        }

        timeout(self.request_timeout, self.service.complete(request))
            .await
            .map_err(|_| LlmError::Timeout(self.request_timeout))?
    }
}

/// Parse a structured completion, tolerating a markdown code fence around the JSON
pub fn parse_structured<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    let body = strip_code_fence(raw);
    if body.is_empty() {
        return Err(LlmError::NoStructuredResponse("empty response".into()));
    }

    serde_json::from_str(body).map_err(|e| {
        LlmError::NoStructuredResponse(format!("{} in response {:?}", e, truncate(body, 200)))
    })
}

fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the optional language tag on the opening fence
    let rest = rest.split_once('\n').map_or(rest, |(_, body)| body);
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockService;
    use crate::schema::DecontextualizedSentence;

    fn generator(mock: &MockService) -> Generator {
        Generator::new(Arc::new(mock.clone())).with_retry(RetryPolicy::none())
    }

    #[test]
    fn test_strip_code_fence() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```{\"a\":1}```"), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_structured_parse() {
        let mock = MockService::new(r#"{"sentence": "Elon Musk leads Tesla."}"#);
        let parsed: DecontextualizedSentence = generator(&mock)
            .generate_structured("sys", "user")
            .await
            .unwrap();

        assert_eq!(parsed.sentence, "Elon Musk leads Tesla.");
        let request = &mock.requests()[0];
        assert_eq!(request.schema.as_ref().unwrap().name, "DecontextualizedSentence");
    }

    #[tokio::test]
    async fn test_invalid_structure_is_typed_error() {
        let mock = MockService::new("Sure! Here is the sentence.");
        let err = generator(&mock)
            .generate_structured::<DecontextualizedSentence>("sys", "user")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::NoStructuredResponse(_)));
    }

    #[tokio::test]
    async fn test_invalid_structure_is_not_retried() {
        let mock = MockService::new("not json at all");
        let err = Generator::new(Arc::new(mock.clone()))
            .with_retry(RetryPolicy::new(3, 0, 0))
            .generate_structured::<DecontextualizedSentence>("sys", "user")
            .await
            .unwrap_err();

        assert!(matches!(err, LlmError::NoStructuredResponse(_)));
        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_single_line_fenced_reply_parses() {
        let mock = MockService::new("```{\"sentence\": \"fenced\"}```");
        let parsed: DecontextualizedSentence = generator(&mock)
            .generate_structured("sys", "user")
            .await
            .unwrap();

        assert_eq!(parsed.sentence, "fenced");
    }

    #[tokio::test]
    async fn test_cache_skips_repeat_calls() {
        let mock = MockService::new(r#"{"sentence": "cached"}"#);
        let generator = generator(&mock).with_cache(ResponseCache::new(16));

        for _ in 0..3 {
            let parsed: DecontextualizedSentence =
                generator.generate_structured("sys", "same prompt").await.unwrap();
            assert_eq!(parsed.sentence, "cached");
        }

        assert_eq!(mock.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let mock = MockService::new("garbage");
        let generator = generator(&mock).with_cache(ResponseCache::new(16));

        let _ = generator
            .generate_structured::<DecontextualizedSentence>("sys", "p")
            .await;

        assert!(generator.cache().unwrap().is_empty());
    }
}
