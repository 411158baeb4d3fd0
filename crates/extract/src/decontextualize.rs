use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{DECONTEXTUALIZE_SYSTEM, build_decontextualize_prompt};
use crate::schema::DecontextualizedSentence;
use crate::stage::{for_each_article, into_slot};
use ingest::{ArticleId, ArticleMap, Slots};
use tracing::{debug, info};

pub const DEFAULT_CONTEXT_WINDOW: usize = 3;

/// Rewrites each sentence so its pronouns and references resolve on their own
pub struct Decontextualizer {
    generator: Generator,
    context_window: Option<usize>,
}

impl Decontextualizer {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            context_window: Some(DEFAULT_CONTEXT_WINDOW),
        }
    }

    /// Preceding sentences given as context; `None` means all of them
    pub fn with_context_window(mut self, context_window: Option<usize>) -> Self {
        self.context_window = context_window;
        self
    }

    pub async fn run(&self, chunked: &ArticleMap<Vec<String>>) -> ArticleMap<Slots<String>> {
        for_each_article(chunked, self.generator.max_concurrent(), |id, sentences| {
            self.article(id, sentences)
        })
        .await
    }

    pub async fn article(&self, id: &ArticleId, sentences: &[String]) -> Slots<String> {
        info!(article = %id, sentences = sentences.len(), "Decontextualizing");

        let mut slots = Vec::with_capacity(sentences.len());
        for index in 0..sentences.len() {
            let result = self.sentence(sentences, index).await;
            slots.push(into_slot(result, "decontextualize", id, index));
        }
        slots
    }

    /// Rewrite `sentences[index]` using the original sentences before it
    pub async fn sentence(&self, sentences: &[String], index: usize) -> Result<String, LlmError> {
        let context = context_for(sentences, index, self.context_window);
        let prompt = build_decontextualize_prompt(context, &sentences[index]);

        let response: DecontextualizedSentence = self
            .generator
            .generate_structured(DECONTEXTUALIZE_SYSTEM, &prompt)
            .await?;

        let sentence = response.sentence.trim();
        if sentence.is_empty() {
            return Err(LlmError::NoStructuredResponse("empty sentence".into()));
        }

        debug!(index, "Decontextualized sentence");
        Ok(sentence.to_string())
    }
}

/// The up-to-`window` sentences immediately before `index`, in document order
pub fn context_for(sentences: &[String], index: usize, window: Option<usize>) -> &[String] {
    let end = index.min(sentences.len());
    let start = window.map_or(0, |k| end.saturating_sub(k));
    &sentences[start..end]
}
