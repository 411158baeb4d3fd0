use crate::error::LlmError;
use futures::stream::{self, StreamExt};
use ingest::{ArticleId, ArticleMap};
use std::future::Future;
use tracing::warn;

/// Run `f` once per article, at most `max_concurrent` articles at a time.
///
/// Completion order does not matter; results land in an ordered map.
pub async fn for_each_article<'a, I, O, F, Fut>(
    inputs: &'a ArticleMap<I>,
    max_concurrent: usize,
    f: F,
) -> ArticleMap<O>
where
    F: Fn(&'a ArticleId, &'a I) -> Fut,
    Fut: Future<Output = O>,
{
    let f = &f;
    stream::iter(inputs.iter())
        .map(|(id, input)| async move { (id.clone(), f(id, input).await) })
        .buffer_unordered(max_concurrent.max(1))
        .collect()
        .await
}

/// Turn one item's result into its slot, logging the failure
pub(crate) fn into_slot<T>(
    result: Result<T, LlmError>,
    stage: &str,
    article: &ArticleId,
    sentence: usize,
) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(stage, article = %article, sentence, error = %e, "Item failed, leaving slot empty");
            None
        }
    }
}

/// Slot `index` of an upstream article, `None` when the article or slot is absent
pub(crate) fn upstream<'a, T>(
    map: &'a ArticleMap<Vec<Option<T>>>,
    article: &ArticleId,
    index: usize,
) -> Option<&'a T> {
    map.get(article)
        .and_then(|slots| slots.get(index))
        .and_then(Option::as_ref)
}
