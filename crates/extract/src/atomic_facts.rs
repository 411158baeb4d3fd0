use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{ATOMIC_FACT_SYSTEM, MAX_ATOMIC_FACTS, build_atomic_fact_prompt};
use crate::schema::AtomicFacts;
use crate::stage::{for_each_article, into_slot, upstream};
use ingest::{ArticleId, ArticleMap, Slots};
use tracing::info;

/// Extracts facts a sentence states beyond its propositions
pub struct AtomicFactExtractor {
    generator: Generator,
}

impl AtomicFactExtractor {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    pub async fn run(
        &self,
        sentences: &ArticleMap<Slots<String>>,
        propositions: &ArticleMap<Slots<Vec<String>>>,
    ) -> ArticleMap<Slots<Vec<String>>> {
        for_each_article(sentences, self.generator.max_concurrent(), |id, slots| {
            self.article(id, slots, propositions)
        })
        .await
    }

    async fn article(
        &self,
        id: &ArticleId,
        sentences: &[Option<String>],
        propositions: &ArticleMap<Slots<Vec<String>>>,
    ) -> Slots<Vec<String>> {
        info!(article = %id, sentences = sentences.len(), "Extracting atomic facts");

        let mut slots = Vec::with_capacity(sentences.len());
        for (index, sentence) in sentences.iter().enumerate() {
            let slot = match sentence {
                Some(sentence) => {
                    // Facts only need the sentence; missing propositions mean none to exclude
                    let known = upstream(propositions, id, index).map_or(&[][..], Vec::as_slice);
                    into_slot(self.sentence(sentence, known).await, "atomic_facts", id, index)
                }
                None => None,
            };
            slots.push(slot);
        }
        slots
    }

    /// At most five non-blank facts, in response order
    pub async fn sentence(
        &self,
        sentence: &str,
        propositions: &[String],
    ) -> Result<Vec<String>, LlmError> {
        let response: AtomicFacts = self
            .generator
            .generate_structured(ATOMIC_FACT_SYSTEM, &build_atomic_fact_prompt(sentence, propositions))
            .await?;

        Ok(response
            .facts
            .into_iter()
            .map(|fact| fact.trim().to_string())
            .filter(|fact| !fact.is_empty())
            .take(MAX_ATOMIC_FACTS)
            .collect())
    }
}
