use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{RELATION_SYSTEM, VALIDATION_SYSTEM, build_relation_prompt, build_validation_prompt};
use crate::schema::{CandidateRelation, EntityMention, RelationTriple, RelationValidation};
use crate::stage::{for_each_article, upstream};
use ingest::{ArticleId, ArticleMap, Slots};
use tracing::{debug, info, warn};

/// Upstream outputs the relation stage joins per sentence
pub struct RelationInputs<'a> {
    pub sentences: &'a ArticleMap<Slots<String>>,
    pub entities: &'a ArticleMap<Slots<Vec<EntityMention>>>,
    pub paraphrases: &'a ArticleMap<Slots<String>>,
}

/// Proposes a relation for each ordered entity pair and keeps the ones the
/// paraphrased sentence confirms
pub struct RelationExtractor {
    generator: Generator,
    max_pairs_per_sentence: Option<usize>,
}

impl RelationExtractor {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            max_pairs_per_sentence: None,
        }
    }

    pub fn with_max_pairs(mut self, max_pairs_per_sentence: Option<usize>) -> Self {
        self.max_pairs_per_sentence = max_pairs_per_sentence;
        self
    }

    pub async fn run(&self, inputs: &RelationInputs<'_>) -> ArticleMap<Slots<Vec<RelationTriple>>> {
        for_each_article(inputs.sentences, self.generator.max_concurrent(), |id, slots| {
            self.article(id, slots, inputs)
        })
        .await
    }

    async fn article(
        &self,
        id: &ArticleId,
        sentences: &[Option<String>],
        inputs: &RelationInputs<'_>,
    ) -> Slots<Vec<RelationTriple>> {
        info!(article = %id, sentences = sentences.len(), "Extracting relations");

        let mut slots = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let entities = upstream(inputs.entities, id, index);
            let paraphrased = upstream(inputs.paraphrases, id, index);

            let slot = match (sentence, entities, paraphrased) {
                (Some(sentence), Some(entities), Some(paraphrased)) => Some(
                    self.sentence(id, index, sentence, entities, paraphrased)
                        .await,
                ),
                _ => None,
            };
            slots.push(slot);
        }
        slots
    }

    /// Validated triples for one sentence. A failed pair only drops that pair.
    pub async fn sentence(
        &self,
        id: &ArticleId,
        index: usize,
        sentence: &str,
        entities: &[EntityMention],
        paraphrased: &str,
    ) -> Vec<RelationTriple> {
        let mut pairs = entity_pairs(entities);
        if let Some(max) = self.max_pairs_per_sentence {
            if pairs.len() > max {
                warn!(
                    article = %id,
                    sentence = index,
                    pairs = pairs.len(),
                    max,
                    "Truncating entity pairs"
                );
                pairs.truncate(max);
            }
        }

        let mut triples = Vec::new();
        for (subject, object) in pairs {
            match self.pair(subject, object, sentence, paraphrased).await {
                Ok(Some(triple)) => triples.push(triple),
                Ok(None) => {}
                Err(e) => warn!(
                    article = %id,
                    sentence = index,
                    subject,
                    object,
                    error = %e,
                    "Relation pair failed"
                ),
            }
        }
        triples
    }

    async fn pair(
        &self,
        subject: &str,
        object: &str,
        sentence: &str,
        paraphrased: &str,
    ) -> Result<Option<RelationTriple>, LlmError> {
        let candidate: CandidateRelation = self
            .generator
            .generate_structured(RELATION_SYSTEM, &build_relation_prompt(subject, object, sentence))
            .await?;

        let relation = candidate.relation.trim();
        if relation.is_empty() {
            return Ok(None);
        }

        let triple = RelationTriple::new(subject, relation, object);
        let validation: RelationValidation = self
            .generator
            .generate_structured(VALIDATION_SYSTEM, &build_validation_prompt(&triple, paraphrased))
            .await?;

        debug!(subject, relation, object, valid = validation.is_valid, "Validated relation");
        Ok(validation.is_valid.then_some(triple))
    }
}

/// Ordered pairs of mentions whose surface texts differ, in mention order
pub fn entity_pairs(entities: &[EntityMention]) -> Vec<(&str, &str)> {
    let mut pairs = Vec::new();
    for e1 in entities {
        for e2 in entities {
            if e1.entity != e2.entity {
                pairs.push((e1.entity.as_str(), e2.entity.as_str()));
            }
        }
    }
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entity_pairs_are_ordered_and_exclude_self() {
        let entities = vec![
            EntityMention::new("Musk", "PER"),
            EntityMention::new("Tesla", "ORG"),
            EntityMention::new("Musk", "PER"),
        ];

        let pairs = entity_pairs(&entities);

        assert_eq!(
            pairs,
            vec![("Musk", "Tesla"), ("Tesla", "Musk"), ("Tesla", "Musk"), ("Musk", "Tesla")]
        );
        assert!(pairs.iter().all(|(a, b)| a != b));
    }

    #[test]
    fn test_single_entity_has_no_pairs() {
        assert!(entity_pairs(&[EntityMention::new("Musk", "PER")]).is_empty());
    }
}
