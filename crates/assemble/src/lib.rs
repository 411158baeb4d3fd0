use extract::{EntityMention, RelationTriple};
use ingest::{ArticleId, ArticleMap, Slots};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Everything known about one sentence
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeNode {
    pub index: usize,
    pub sentence: Option<String>,
    pub entities: Option<Vec<EntityMention>>,
    pub relationships: Option<Vec<RelationTriple>>,
    pub propositions: Option<Vec<String>>,
    pub atomic_facts: Option<Vec<String>>,
}

pub type KnowledgeGraph = ArticleMap<Vec<KnowledgeNode>>;

pub struct AssembleInputs<'a> {
    pub sentences: &'a ArticleMap<Slots<String>>,
    pub entities: &'a ArticleMap<Slots<Vec<EntityMention>>>,
    pub relationships: &'a ArticleMap<Slots<Vec<RelationTriple>>>,
    pub propositions: &'a ArticleMap<Slots<Vec<String>>>,
    pub atomic_facts: &'a ArticleMap<Slots<Vec<String>>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlignmentPolicy {
    /// Fail on the first misaligned article
    #[default]
    Strict,
    /// Leave misaligned articles out of the graph and report them
    SkipMisaligned,
}

/// Per-stage sequence lengths for one article; `None` when the stage has no entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageLengths {
    pub entities: Option<usize>,
    pub relationships: Option<usize>,
    pub propositions: Option<usize>,
    pub atomic_facts: Option<usize>,
}

impl StageLengths {
    fn matches(&self, expected: usize) -> bool {
        [
            self.entities,
            self.relationships,
            self.propositions,
            self.atomic_facts,
        ]
        .iter()
        .all(|len| *len == Some(expected))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Misaligned {
    pub article: ArticleId,
    pub expected: usize,
    pub lengths: StageLengths,
}

#[derive(Error, Debug)]
pub enum AssembleError {
    #[error("article {article} is misaligned: {expected} sentences, stage lengths {lengths:?}")]
    Misaligned {
        article: ArticleId,
        expected: usize,
        lengths: StageLengths,
    },
}

#[derive(Debug, Clone, Default)]
pub struct Assembly {
    pub graph: KnowledgeGraph,
    pub misaligned: Vec<Misaligned>,
}

/// Join the per-sentence stage outputs into knowledge nodes.
///
/// Each article of the decontextualized map must have the same number of
/// slots in every other stage. Nothing is truncated to make them fit.
pub fn assemble(
    inputs: &AssembleInputs<'_>,
    policy: AlignmentPolicy,
) -> Result<Assembly, AssembleError> {
    let mut assembly = Assembly::default();

    for (id, sentences) in inputs.sentences {
        let expected = sentences.len();
        let lengths = StageLengths {
            entities: inputs.entities.get(id).map(Vec::len),
            relationships: inputs.relationships.get(id).map(Vec::len),
            propositions: inputs.propositions.get(id).map(Vec::len),
            atomic_facts: inputs.atomic_facts.get(id).map(Vec::len),
        };

        if !lengths.matches(expected) {
            match policy {
                AlignmentPolicy::Strict => {
                    return Err(AssembleError::Misaligned {
                        article: id.clone(),
                        expected,
                        lengths,
                    });
                }
                AlignmentPolicy::SkipMisaligned => {
                    warn!(article = %id, expected, lengths = ?lengths, "Skipping misaligned article");
                    assembly.misaligned.push(Misaligned {
                        article: id.clone(),
                        expected,
                        lengths,
                    });
                    continue;
                }
            }
        }

        let nodes = (0..expected)
            .map(|index| KnowledgeNode {
                index,
                sentence: sentences[index].clone(),
                entities: slot(inputs.entities, id, index),
                relationships: slot(inputs.relationships, id, index),
                propositions: slot(inputs.propositions, id, index),
                atomic_facts: slot(inputs.atomic_facts, id, index),
            })
            .collect();

        assembly.graph.insert(id.clone(), nodes);
    }

    info!(
        articles = assembly.graph.len(),
        misaligned = assembly.misaligned.len(),
        "Assembled knowledge graph"
    );
    Ok(assembly)
}

fn slot<T: Clone>(map: &ArticleMap<Slots<T>>, id: &ArticleId, index: usize) -> Option<T> {
    map.get(id).and_then(|slots| slots[index].clone())
}
