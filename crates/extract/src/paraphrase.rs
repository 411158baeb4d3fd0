use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{PARAPHRASE_SYSTEM, build_paraphrase_prompt};
use crate::schema::{EntityMention, Paraphrase};
use crate::stage::{for_each_article, into_slot, upstream};
use ingest::{ArticleId, ArticleMap, Slots};
use tracing::info;

/// Paraphrases each sentence around its entities, giving the relation
/// extractor an independent wording to validate against
pub struct Paraphraser {
    generator: Generator,
}

impl Paraphraser {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    pub async fn run(
        &self,
        sentences: &ArticleMap<Slots<String>>,
        entities: &ArticleMap<Slots<Vec<EntityMention>>>,
    ) -> ArticleMap<Slots<String>> {
        for_each_article(sentences, self.generator.max_concurrent(), |id, slots| {
            self.article(id, slots, entities)
        })
        .await
    }

    async fn article(
        &self,
        id: &ArticleId,
        sentences: &[Option<String>],
        entities: &ArticleMap<Slots<Vec<EntityMention>>>,
    ) -> Slots<String> {
        info!(article = %id, sentences = sentences.len(), "Paraphrasing");

        let mut slots = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let slot = match (sentence, upstream(entities, id, index)) {
                (Some(sentence), Some(mentions)) => into_slot(
                    self.sentence(sentence, mentions).await,
                    "paraphrase",
                    id,
                    index,
                ),
                _ => None,
            };
            slots.push(slot);
        }
        slots
    }

    pub async fn sentence(
        &self,
        sentence: &str,
        entities: &[EntityMention],
    ) -> Result<String, LlmError> {
        let response: Paraphrase = self
            .generator
            .generate_structured(PARAPHRASE_SYSTEM, &build_paraphrase_prompt(sentence, entities))
            .await?;

        let text = response.paraphrased_text.trim();
        if text.is_empty() {
            return Err(LlmError::NoStructuredResponse("empty paraphrase".into()));
        }
        Ok(text.to_string())
    }
}
