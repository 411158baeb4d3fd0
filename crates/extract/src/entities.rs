use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{ENTITY_SYSTEM, build_entity_prompt};
use crate::schema::{EntityMention, NamedEntities};
use crate::stage::{for_each_article, into_slot};
use ingest::{ArticleId, ArticleMap, Slots};
use tracing::info;

pub struct EntityExtractor {
    generator: Generator,
}

impl EntityExtractor {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    pub async fn run(
        &self,
        sentences: &ArticleMap<Slots<String>>,
    ) -> ArticleMap<Slots<Vec<EntityMention>>> {
        for_each_article(sentences, self.generator.max_concurrent(), |id, slots| {
            self.article(id, slots)
        })
        .await
    }

    pub async fn article(
        &self,
        id: &ArticleId,
        sentences: &[Option<String>],
    ) -> Slots<Vec<EntityMention>> {
        info!(article = %id, sentences = sentences.len(), "Extracting entities");

        let mut slots = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let slot = match sentence {
                Some(sentence) => into_slot(self.sentence(sentence).await, "entities", id, index),
                None => None,
            };
            slots.push(slot);
        }
        slots
    }

    /// Entities in one sentence, in response order; blank mentions are dropped
    pub async fn sentence(&self, sentence: &str) -> Result<Vec<EntityMention>, LlmError> {
        let response: NamedEntities = self
            .generator
            .generate_structured(ENTITY_SYSTEM, &build_entity_prompt(sentence))
            .await?;

        Ok(response
            .entities
            .into_iter()
            .filter(|e| !e.entity.trim().is_empty())
            .collect())
    }
}
