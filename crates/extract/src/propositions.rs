use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{PROPOSITION_SYSTEM, build_proposition_prompt};
use crate::schema::{PropositionResponse, RelationTriple};
use crate::stage::{for_each_article, upstream};
use ingest::{ArticleId, ArticleMap, Slots};
use tracing::{info, warn};

/// Writes one standalone statement per validated relation
pub struct PropositionSynthesizer {
    generator: Generator,
}

impl PropositionSynthesizer {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    pub async fn run(
        &self,
        sentences: &ArticleMap<Slots<String>>,
        relations: &ArticleMap<Slots<Vec<RelationTriple>>>,
    ) -> ArticleMap<Slots<Vec<String>>> {
        for_each_article(sentences, self.generator.max_concurrent(), |id, slots| {
            self.article(id, slots, relations)
        })
        .await
    }

    async fn article(
        &self,
        id: &ArticleId,
        sentences: &[Option<String>],
        relations: &ArticleMap<Slots<Vec<RelationTriple>>>,
    ) -> Slots<Vec<String>> {
        info!(article = %id, sentences = sentences.len(), "Synthesizing propositions");

        let mut slots = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let slot = match (sentence, upstream(relations, id, index)) {
                (Some(sentence), Some(triples)) => {
                    let mut propositions = Vec::with_capacity(triples.len());
                    for triple in triples {
                        match self.triple(triple, sentence).await {
                            Ok(proposition) => propositions.push(proposition),
                            Err(e) => warn!(
                                article = %id,
                                sentence = index,
                                relation = %triple.relation,
                                error = %e,
                                "Proposition failed"
                            ),
                        }
                    }
                    Some(propositions)
                }
                _ => None,
            };
            slots.push(slot);
        }
        slots
    }

    pub async fn triple(&self, triple: &RelationTriple, sentence: &str) -> Result<String, LlmError> {
        let response: PropositionResponse = self
            .generator
            .generate_structured(PROPOSITION_SYSTEM, &build_proposition_prompt(triple, sentence))
            .await?;
        Ok(response.proposition.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockService;
    use crate::retry::RetryPolicy;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_failed_triple_is_skipped_and_missing_relations_stay_empty() {
        let mock = MockService::new(r#"{"proposition": "Elon Musk leads Tesla."}"#)
            .fail_when("Relation: Founded");
        let generator = Generator::new(Arc::new(mock.clone())).with_retry(RetryPolicy::none());

        let id = ArticleId::from("a");
        let sentences = ArticleMap::from([(
            id.clone(),
            vec![Some("Musk leads Tesla, which he founded.".to_string()), Some("Other.".to_string())],
        )]);
        let relations = ArticleMap::from([(
            id.clone(),
            vec![
                Some(vec![
                    RelationTriple::new("Musk", "Leads", "Tesla"),
                    RelationTriple::new("Musk", "Founded", "Tesla"),
                ]),
                None,
            ],
        )]);

        let out = PropositionSynthesizer::new(generator)
            .run(&sentences, &relations)
            .await;

        assert_eq!(
            out[&id],
            vec![Some(vec!["Elon Musk leads Tesla.".to_string()]), None]
        );
        assert_eq!(mock.call_count(), 2);
    }
}
