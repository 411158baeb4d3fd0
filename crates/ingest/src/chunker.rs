use crate::article::{Article, ArticleMap};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use unicode_segmentation::UnicodeSegmentation;

/// Tokens whose trailing period never ends a sentence
const ABBREVIATIONS: &[&str] = &[
    "Mr.", "Mrs.", "Ms.", "Dr.", "Inc.", "Ltd.", "Jr.", "Sr.", "St.", "Co.", "U.S.", "U.K.",
    "e.g.", "i.e.", "etc.",
];

/// Sentence-final punctuation (including closing quotes/parens) followed by whitespace
static BOUNDARY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[.?!;:”’)]\s+").expect("boundary pattern is valid"));

/// Text in, ordered non-empty sentences out.
pub trait SentenceSplitter: Send + Sync {
    fn split(&self, text: &str) -> Vec<String>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Punctuation rules with an abbreviation guard
    #[default]
    Rule,
    /// UAX #29 sentence boundaries
    Unicode,
    /// Split on newlines first, then UAX #29 within each line
    Lines,
}

impl ChunkStrategy {
    pub fn splitter(self) -> Box<dyn SentenceSplitter> {
        match self {
            ChunkStrategy::Rule => Box::new(RuleSplitter),
            ChunkStrategy::Unicode => Box::new(UnicodeSplitter),
            ChunkStrategy::Lines => Box::new(LineSplitter),
        }
    }
}

impl fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChunkStrategy::Rule => "rule",
            ChunkStrategy::Unicode => "unicode",
            ChunkStrategy::Lines => "lines",
        };
        f.write_str(name)
    }
}

impl FromStr for ChunkStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "rule" | "regex" => Ok(ChunkStrategy::Rule),
            "unicode" => Ok(ChunkStrategy::Unicode),
            "lines" => Ok(ChunkStrategy::Lines),
            other => Err(format!("unknown chunk strategy: {}", other)),
        }
    }
}

pub struct RuleSplitter;

impl RuleSplitter {
    fn is_protected(prefix: &str) -> bool {
        if prefix.ends_with("...") {
            return true;
        }

        let token = prefix
            .rsplit(char::is_whitespace)
            .next()
            .unwrap_or(prefix)
            .trim_start_matches(|c: char| !c.is_alphanumeric());

        ABBREVIATIONS.contains(&token)
    }
}

impl SentenceSplitter for RuleSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        let mut start = 0;

        for boundary in BOUNDARY.find_iter(text) {
            // The punctuation mark stays with the sentence it ends
            let punct_len = text[boundary.start()..]
                .chars()
                .next()
                .map_or(1, char::len_utf8);
            let end = boundary.start() + punct_len;

            if Self::is_protected(&text[start..end]) {
                continue;
            }

            push_trimmed(&mut sentences, &text[start..end]);
            start = boundary.end();
        }

        push_trimmed(&mut sentences, &text[start..]);
        sentences
    }
}

pub struct UnicodeSplitter;

impl SentenceSplitter for UnicodeSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        let mut sentences = Vec::new();
        for sentence in text.unicode_sentences() {
            push_trimmed(&mut sentences, sentence);
        }
        sentences
    }
}

pub struct LineSplitter;

impl SentenceSplitter for LineSplitter {
    fn split(&self, text: &str) -> Vec<String> {
        text.lines()
            .flat_map(|line| UnicodeSplitter.split(line))
            .collect()
    }
}

fn push_trimmed(out: &mut Vec<String>, segment: &str) {
    let segment = segment.trim();
    if !segment.is_empty() {
        out.push(segment.to_string());
    }
}

/// Chunk every article body. Articles with an empty body are left out.
pub fn chunk_articles(
    articles: &ArticleMap<Article>,
    splitter: &dyn SentenceSplitter,
) -> ArticleMap<Vec<String>> {
    articles
        .iter()
        .filter(|(_, article)| article.has_body())
        .map(|(id, article)| {
            tracing::info!(article = %id, "Chunking article");
            (id.clone(), splitter.split(&article.body_text))
        })
        .collect()
}
