use crate::generator::Generator;
use crate::prompt::{CHECK_SYSTEM, build_check_prompt};
use crate::schema::ChunkCheck;
use crate::stage::{for_each_article, into_slot};
use ingest::{ArticleId, ArticleMap};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A chunk with the model's completeness verdict; both fields are null when the call failed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckedChunk {
    pub chunk: String,
    pub complete: Option<bool>,
    pub explanation: Option<String>,
}

pub struct ChunkChecker {
    generator: Generator,
}

impl ChunkChecker {
    pub fn new(generator: Generator) -> Self {
        Self { generator }
    }

    pub async fn run(&self, chunked: &ArticleMap<Vec<String>>) -> ArticleMap<Vec<CheckedChunk>> {
        for_each_article(chunked, self.generator.max_concurrent(), |id, chunks| {
            self.article(id, chunks)
        })
        .await
    }

    async fn article(&self, id: &ArticleId, chunks: &[String]) -> Vec<CheckedChunk> {
        info!(article = %id, chunks = chunks.len(), "Checking chunks");

        let mut checked = Vec::with_capacity(chunks.len());
        for (index, chunk) in chunks.iter().enumerate() {
            let verdict = self
                .generator
                .generate_structured::<ChunkCheck>(CHECK_SYSTEM, &build_check_prompt(chunk))
                .await;

            let verdict = into_slot(verdict, "check", id, index);
            checked.push(CheckedChunk {
                chunk: chunk.clone(),
                complete: verdict.as_ref().map(|v| v.complete),
                explanation: verdict.map(|v| v.explanation),
            });
        }
        checked
    }
}

/// Number of chunks judged incomplete
pub fn incomplete_count(checked: &ArticleMap<Vec<CheckedChunk>>) -> usize {
    checked
        .values()
        .flatten()
        .filter(|c| c.complete == Some(false))
        .count()
}
