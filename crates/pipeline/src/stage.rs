use clap::ValueEnum;
use serde::Serialize;
use std::fmt;

pub const MERGED_FILE: &str = "merged_articles.json";
pub const CHUNKED_FILE: &str = "chunked_articles.json";
pub const CHECKED_FILE: &str = "chunked_articles_checked.json";
pub const DECONTEXTUALIZED_FILE: &str = "decontextualized_articles.json";
pub const ENTITIES_FILE: &str = "extracted_entities.json";
pub const PARAPHRASED_FILE: &str = "paraphrased_articles.json";
pub const RELATIONSHIPS_FILE: &str = "extracted_relationships.json";
pub const PROPOSITIONS_FILE: &str = "extracted_propositions.json";
pub const ATOMIC_FACTS_FILE: &str = "extracted_atomic_facts.json";
pub const KNOWLEDGE_GRAPH_FILE: &str = "knowledge_graph.json";

/// Pipeline stages in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    Clean,
    Collect,
    Chunk,
    Check,
    Decontextualize,
    Entities,
    Paraphrase,
    Relations,
    Propositions,
    AtomicFacts,
    Assemble,
}

impl Stage {
    pub const ALL: [Stage; 11] = [
        Stage::Clean,
        Stage::Collect,
        Stage::Chunk,
        Stage::Check,
        Stage::Decontextualize,
        Stage::Entities,
        Stage::Paraphrase,
        Stage::Relations,
        Stage::Propositions,
        Stage::AtomicFacts,
        Stage::Assemble,
    ];

    /// Stages from `from` to `to`, both inclusive
    pub fn range(from: Stage, to: Stage) -> impl Iterator<Item = Stage> {
        Self::ALL
            .into_iter()
            .filter(move |stage| *stage >= from && *stage <= to)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = self
            .to_possible_value()
            .map(|value| value.get_name().to_string())
            .unwrap_or_default();
        f.write_str(&name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_range_is_inclusive_and_ordered() {
        let stages: Vec<Stage> = Stage::range(Stage::Entities, Stage::Propositions).collect();
        assert_eq!(
            stages,
            vec![
                Stage::Entities,
                Stage::Paraphrase,
                Stage::Relations,
                Stage::Propositions
            ]
        );
        assert_eq!(Stage::range(Stage::Assemble, Stage::Clean).count(), 0);
    }

    #[test]
    fn test_names_match_cli() {
        assert_eq!(Stage::AtomicFacts.to_string(), "atomic-facts");
        assert_eq!(
            serde_json::to_string(&Stage::AtomicFacts).unwrap(),
            "\"atomic-facts\""
        );
    }
}
