use crate::article::{Article, ArticleId, ArticleMap};
use crate::error::{IngestError, Result};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use tokio::fs;
use walkdir::WalkDir;

pub struct StageFile;

impl StageFile {
    /// Read and parse one stage's JSON output
    pub async fn read<T: DeserializeOwned>(path: &Path) -> Result<T> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|source| IngestError::Read {
                path: path.to_path_buf(),
                source,
            })?;

        serde_json::from_str(&content).map_err(|source| IngestError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write pretty-printed JSON, creating parent directories as needed
    pub async fn write<T: Serialize>(path: &Path, value: &T) -> Result<()> {
        let write_err = |source| IngestError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(value).map_err(|source| IngestError::Serialize {
            path: path.to_path_buf(),
            source,
        })?;

        fs::write(path, json).await.map_err(write_err)
    }

    /// Read the merged article file.
    ///
    /// Accepts the mapping the collector writes as well as a bare list of
    /// articles keyed by their `file_name`.
    pub async fn read_articles(path: &Path) -> Result<ArticleMap<Article>> {
        let value: serde_json::Value = Self::read(path).await?;

        let parse = |value: serde_json::Value| -> Result<Article> {
            serde_json::from_value(value).map_err(|source| IngestError::Parse {
                path: path.to_path_buf(),
                source,
            })
        };

        match value {
            serde_json::Value::Object(map) => map
                .into_iter()
                .map(|(id, value)| Ok((ArticleId::new(id), parse(value)?)))
                .collect(),
            serde_json::Value::Array(items) => {
                let mut articles = ArticleMap::new();
                for (index, value) in items.into_iter().enumerate() {
                    let article = parse(value)?;
                    let Some(file_name) = article.file_name.clone() else {
                        return Err(IngestError::Shape {
                            path: path.to_path_buf(),
                            reason: format!("article at index {} has no file_name", index),
                        });
                    };
                    articles.insert(ArticleId::new(file_name), article);
                }
                Ok(articles)
            }
            _ => Err(IngestError::Shape {
                path: path.to_path_buf(),
                reason: "expected an object or an array of articles".to_string(),
            }),
        }
    }

    /// Files directly under `dir` whose name ends with `suffix`, in name order
    pub fn list(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
        if !dir.is_dir() {
            return Err(IngestError::MissingDirectory(dir.to_path_buf()));
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .sort_by_file_name()
        {
            let entry = entry.map_err(|source| IngestError::Walk {
                path: dir.to_path_buf(),
                source,
            })?;

            let is_match = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.ends_with(suffix));

            if entry.file_type().is_file() && is_match {
                files.push(entry.into_path());
            }
        }

        Ok(files)
    }
}
