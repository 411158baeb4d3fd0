use crate::article::{Article, ArticleId, ArticleMap};
use crate::error::{IngestError, Result};
use crate::reader::StageFile;
use serde::Serialize;
use std::path::Path;
use tracing::{error, info, warn};

pub const CLEANED_SUFFIX: &str = "_cleaned.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CollectReport {
    pub files_seen: usize,
    pub files_failed: usize,
    pub articles_included: usize,
    pub articles_skipped_not_found: usize,
}

/// Merge every `*_cleaned.json` file in `dir` into one mapping.
///
/// Only articles whose `article_found` flag is truthy are kept. A file that
/// cannot be read or parsed is logged and skipped. When two files share an
/// article id, the file listed later wins.
pub async fn collect_articles(dir: &Path) -> Result<(ArticleMap<Article>, CollectReport)> {
    let files = StageFile::list(dir, CLEANED_SUFFIX)?;
    let mut merged = ArticleMap::new();
    let mut report = CollectReport::default();

    for path in files {
        report.files_seen += 1;

        let records = match read_cleaned_file(&path).await {
            Ok(records) => records,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Skipping unreadable article file");
                report.files_failed += 1;
                continue;
            }
        };

        for (id, article) in records {
            if article.article_found {
                if merged.insert(id.clone(), article).is_some() {
                    warn!(
                        article = %id,
                        file = %path.display(),
                        "Duplicate article id, keeping the later file"
                    );
                }
            } else {
                report.articles_skipped_not_found += 1;
            }
        }
    }

    report.articles_included = merged.len();
    info!(
        files = report.files_seen,
        included = report.articles_included,
        not_found = report.articles_skipped_not_found,
        failed = report.files_failed,
        "Collected articles"
    );

    Ok((merged, report))
}

/// One cleaned file: either a single article or an `id -> article` mapping
async fn read_cleaned_file(path: &Path) -> Result<Vec<(ArticleId, Article)>> {
    let value: serde_json::Value = StageFile::read(path).await?;

    let parse = |value: serde_json::Value| -> Result<Article> {
        serde_json::from_value(value).map_err(|source| IngestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    };

    let serde_json::Value::Object(map) = value else {
        return Err(IngestError::Shape {
            path: path.to_path_buf(),
            reason: "expected a JSON object".to_string(),
        });
    };

    let is_single_article = Article::FIELDS.iter().any(|key| map.contains_key(*key));

    if is_single_article {
        let stem = path
            .file_name()
            .and_then(|name| name.to_str())
            .and_then(|name| name.strip_suffix(".json"))
            .unwrap_or_default();
        let id = ArticleId::from_file_stem(stem);

        let mut article = parse(serde_json::Value::Object(map))?;
        article.file_name = Some(id.to_string());
        return Ok(vec![(id, article)]);
    }

    map.into_iter()
        .map(|(id, value)| {
            let mut article = parse(value)?;
            article.file_name.get_or_insert_with(|| id.clone());
            Ok((ArticleId::new(id), article))
        })
        .collect()
}
