use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Articles keyed by id. Ordered so every stage file is written deterministically.
pub type ArticleMap<T> = BTreeMap<ArticleId, T>;

/// One slot per sentence; `None` marks an item whose stage call failed.
pub type Slots<T> = Vec<Option<T>>;

/// Filename-derived article key (`musk_v_openai_cleaned.json` -> `musk_v_openai`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ArticleId(String);

impl ArticleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Strip the `_cleaned` suffix the cleaner appends to file stems
    pub fn from_file_stem(stem: &str) -> Self {
        Self(stem.strip_suffix("_cleaned").unwrap_or(stem).to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArticleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ArticleId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default, deserialize_with = "deserialize_found_flag")]
    pub article_found: bool,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub publication_date: String,
    #[serde(default)]
    pub author: String,
    #[serde(default)]
    pub publisher: String,
    #[serde(default)]
    pub body_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
}

impl Article {
    /// Keys that identify a JSON object as an article rather than an id mapping
    pub const FIELDS: [&'static str; 6] = [
        "article_found",
        "title",
        "publication_date",
        "author",
        "publisher",
        "body_text",
    ];

    pub fn has_body(&self) -> bool {
        !self.body_text.trim().is_empty()
    }
}

/// Truthiness of a loosely typed `article_found` value.
///
/// Cleaned files come out of a text-generation model, so the flag shows up as
/// bools, strings and occasionally numbers.
pub fn is_truthy(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Bool(b) => *b,
        serde_json::Value::String(s) => {
            let s = s.trim();
            !s.is_empty() && !s.eq_ignore_ascii_case("false") && s != "0"
        }
        serde_json::Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        serde_json::Value::Null => false,
        serde_json::Value::Array(items) => !items.is_empty(),
        serde_json::Value::Object(map) => !map.is_empty(),
    }
}

fn deserialize_found_flag<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(is_truthy(&value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_found_flag_truthiness() {
        assert!(is_truthy(&json!(true)));
        assert!(is_truthy(&json!("true")));
        assert!(is_truthy(&json!("yes")));
        assert!(is_truthy(&json!(1)));

        assert!(!is_truthy(&json!(false)));
        assert!(!is_truthy(&json!("false")));
        assert!(!is_truthy(&json!("FALSE")));
        assert!(!is_truthy(&json!("0")));
        assert!(!is_truthy(&json!("")));
        assert!(!is_truthy(&json!(0)));
        assert!(!is_truthy(&json!(null)));
    }

    #[test]
    fn test_missing_flag_is_not_found() {
        let article: Article = serde_json::from_value(json!({
            "title": "Untitled",
            "body_text": "Some text."
        }))
        .unwrap();

        assert!(!article.article_found);
        assert!(article.has_body());
    }

    #[test]
    fn test_string_flag_deserializes() {
        let article: Article = serde_json::from_value(json!({
            "article_found": "false",
            "body_text": "Paywalled."
        }))
        .unwrap();

        assert!(!article.article_found);
    }

    #[test]
    fn test_id_from_file_stem() {
        assert_eq!(ArticleId::from_file_stem("reuters_01_cleaned").as_str(), "reuters_01");
        assert_eq!(ArticleId::from_file_stem("plain").as_str(), "plain");
    }
}
