use crate::error::LlmError;
use crate::generator::Generator;
use crate::prompt::{CLEAN_SYSTEM, build_clean_prompt};
use crate::schema::NewsArticle;
use futures::stream::{self, StreamExt};
use ingest::StageFile;
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const HTML_SUFFIX: &str = ".html";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanReport {
    pub files_seen: usize,
    pub files_cleaned: usize,
    pub files_failed: usize,
    /// Cleaned files whose page held no article
    pub articles_not_found: usize,
}

/// Pulls the article fields out of raw HTML pages
pub struct Cleaner {
    generator: Generator,
    max_html_chars: Option<usize>,
}

enum Outcome {
    Cleaned { found: bool },
    Failed,
}

impl Cleaner {
    pub fn new(generator: Generator) -> Self {
        Self {
            generator,
            max_html_chars: None,
        }
    }

    /// Cut HTML longer than this many characters before prompting
    pub fn with_max_html_chars(mut self, max_html_chars: Option<usize>) -> Self {
        self.max_html_chars = max_html_chars;
        self
    }

    /// Clean every `*.html` in `html_dir` into `<stem>_cleaned.json` under `out_dir`.
    ///
    /// Only a missing input directory is fatal; a failed page is logged and skipped.
    pub async fn clean_dir(&self, html_dir: &Path, out_dir: &Path) -> ingest::Result<CleanReport> {
        let files = StageFile::list(html_dir, HTML_SUFFIX)?;
        let mut report = CleanReport {
            files_seen: files.len(),
            ..Default::default()
        };

        let outcomes: Vec<Outcome> = stream::iter(files.iter())
            .map(|path| self.clean_file(path, out_dir))
            .buffer_unordered(self.generator.max_concurrent())
            .collect()
            .await;

        for outcome in outcomes {
            match outcome {
                Outcome::Cleaned { found } => {
                    report.files_cleaned += 1;
                    if !found {
                        report.articles_not_found += 1;
                    }
                }
                Outcome::Failed => report.files_failed += 1,
            }
        }

        info!(
            seen = report.files_seen,
            cleaned = report.files_cleaned,
            failed = report.files_failed,
            not_found = report.articles_not_found,
            "Cleaned HTML files"
        );
        Ok(report)
    }

    async fn clean_file(&self, path: &Path, out_dir: &Path) -> Outcome {
        let html = match tokio::fs::read_to_string(path).await {
            Ok(html) => html,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Skipping unreadable HTML file");
                return Outcome::Failed;
            }
        };

        let article = match self.html(&html).await {
            Ok(article) => article,
            Err(e) => {
                error!(file = %path.display(), error = %e, "Failed to clean article");
                return Outcome::Failed;
            }
        };

        let target = cleaned_path(path, out_dir);
        if let Err(e) = StageFile::write(&target, &article).await {
            error!(file = %target.display(), error = %e, "Failed to write cleaned article");
            return Outcome::Failed;
        }

        info!(file = %path.display(), found = article.article_found, "Cleaned article");
        Outcome::Cleaned {
            found: article.article_found,
        }
    }

    pub async fn html(&self, html: &str) -> Result<NewsArticle, LlmError> {
        let html = match self.max_html_chars {
            Some(max) => truncate_chars(html, max),
            None => html,
        };
        self.generator
            .generate_structured(CLEAN_SYSTEM, &build_clean_prompt(html))
            .await
    }
}

/// `<out_dir>/<stem>_cleaned.json`
pub fn cleaned_path(html_path: &Path, out_dir: &Path) -> PathBuf {
    let stem = html_path
        .file_stem()
        .map(|s| s.to_string_lossy())
        .unwrap_or_default();
    out_dir.join(format!("{}{}", stem, ingest::collector::CLEANED_SUFFIX))
}

fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cleaned_path() {
        let path = cleaned_path(Path::new("html/reuters_01.html"), Path::new("cleaned"));
        assert_eq!(path, Path::new("cleaned/reuters_01_cleaned.json"));
    }

    #[test]
    fn test_truncate_chars_respects_boundaries() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
