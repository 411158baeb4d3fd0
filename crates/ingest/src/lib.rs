pub mod article;
pub mod chunker;
pub mod collector;
pub mod error;
pub mod reader;

pub use article::{Article, ArticleId, ArticleMap, Slots};
pub use chunker::{ChunkStrategy, SentenceSplitter, chunk_articles};
pub use collector::{CollectReport, collect_articles};
pub use error::{IngestError, Result};
pub use reader::StageFile;

/// Count filled and missing slots across every article
pub fn slot_counts<T>(map: &ArticleMap<Slots<T>>) -> (usize, usize) {
    map.values()
        .flatten()
        .fold((0, 0), |(filled, missing), slot| match slot {
            Some(_) => (filled + 1, missing),
            None => (filled, missing + 1),
        })
}
