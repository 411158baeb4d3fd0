use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};

/// A named entity occurring in one sentence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct EntityMention {
    pub entity: String,
    #[serde(rename = "type")]
    pub entity_type: String,
}

impl EntityMention {
    pub fn new(entity: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            entity_type: entity_type.into(),
        }
    }
}

/// A validated `subject relation object` claim, stored as a 3-element array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "(String, String, String)",
    into = "(String, String, String)"
)]
pub struct RelationTriple {
    pub subject: String,
    pub relation: String,
    pub object: String,
}

impl RelationTriple {
    pub fn new(
        subject: impl Into<String>,
        relation: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            relation: relation.into(),
            object: object.into(),
        }
    }
}

impl From<(String, String, String)> for RelationTriple {
    fn from((subject, relation, object): (String, String, String)) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }
}

impl From<RelationTriple> for (String, String, String) {
    fn from(triple: RelationTriple) -> Self {
        (triple.subject, triple.relation, triple.object)
    }
}

// Structured response contracts, one per external call

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct NewsArticle {
    pub article_found: bool,
    pub title: String,
    pub publication_date: String,
    pub author: String,
    pub publisher: String,
    pub body_text: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ChunkCheck {
    /// True when the text is one complete, grammatical sentence
    pub complete: bool,
    /// Why not, when `complete` is false
    pub explanation: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DecontextualizedSentence {
    pub sentence: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct NamedEntities {
    pub entities: Vec<EntityMention>,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct Paraphrase {
    pub paraphrased_text: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CandidateRelation {
    /// Relation label, empty when the entities are unrelated
    pub relation: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RelationValidation {
    pub is_valid: bool,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct PropositionResponse {
    pub proposition: String,
}

#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct AtomicFacts {
    pub facts: Vec<String>,
}

/// JSON schema for `T` in the form strict structured-output endpoints accept.
///
/// Every object gets `additionalProperties: false` and lists all of its
/// properties as required; `$ref`s are inlined and `definitions` removed.
pub fn strict_schema<T: JsonSchema>() -> serde_json::Value {
    let mut value = serde_json::to_value(schema_for!(T)).unwrap_or_default();

    close_objects(&mut value);

    let definitions = value.get("definitions").cloned();
    if let Some(definitions) = definitions {
        inline_refs(&mut value, &definitions);
    }

    if let serde_json::Value::Object(map) = &mut value {
        map.remove("definitions");
        map.remove("$schema");
    }

    value
}

fn close_objects(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            if map.get("type").and_then(|t| t.as_str()) == Some("object") {
                map.insert(
                    "additionalProperties".to_string(),
                    serde_json::Value::Bool(false),
                );

                let keys: Option<Vec<serde_json::Value>> = map
                    .get("properties")
                    .and_then(|p| p.as_object())
                    .map(|props| props.keys().cloned().map(serde_json::Value::String).collect());
                if let Some(keys) = keys {
                    map.insert("required".to_string(), serde_json::Value::Array(keys));
                }
            }

            for (_, v) in map.iter_mut() {
                close_objects(v);
            }
        }
        serde_json::Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}

fn inline_refs(value: &mut serde_json::Value, definitions: &serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            let target = map
                .get("$ref")
                .and_then(|r| r.as_str())
                .and_then(|r| r.strip_prefix("#/definitions/"))
                .and_then(|name| definitions.get(name))
                .cloned();

            if let Some(definition) = target {
                *value = definition;
                inline_refs(value, definitions);
                return;
            }

            for (_, v) in map.iter_mut() {
                inline_refs(v, definitions);
            }
        }
        serde_json::Value::Array(items) => {
            for item in items.iter_mut() {
                inline_refs(item, definitions);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strict_schema_inlines_nested_types() {
        let schema = strict_schema::<NamedEntities>();
        let text = schema.to_string();

        assert!(!text.contains("$ref"));
        assert!(schema.get("definitions").is_none());
        assert!(schema.get("$schema").is_none());

        let item = &schema["properties"]["entities"]["items"];
        assert_eq!(item["type"], "object");
        assert_eq!(item["additionalProperties"], false);
        assert!(item["properties"].get("type").is_some());
    }

    #[test]
    fn test_strict_schema_requires_all_properties() {
        let schema = strict_schema::<NewsArticle>();
        let required = schema["required"].as_array().unwrap();
        assert_eq!(required.len(), 6);
        assert_eq!(schema["additionalProperties"], false);
    }

    #[test]
    fn test_relation_triple_is_json_array() {
        let triple = RelationTriple::new("Elon Musk", "Leads", "Tesla");
        let json = serde_json::to_value(&triple).unwrap();
        assert_eq!(json, serde_json::json!(["Elon Musk", "Leads", "Tesla"]));

        let back: RelationTriple = serde_json::from_value(json).unwrap();
        assert_eq!(back, triple);
    }

    #[test]
    fn test_entity_type_field_name() {
        let mention = EntityMention::new("Tesla", "ORG");
        let json = serde_json::to_value(&mention).unwrap();
        assert_eq!(json, serde_json::json!({"entity": "Tesla", "type": "ORG"}));
    }
}
