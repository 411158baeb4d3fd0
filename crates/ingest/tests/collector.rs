use ingest::{ArticleId, IngestError, collect_articles};
use std::fs;

fn write(dir: &std::path::Path, name: &str, content: &str) {
    fs::write(dir.join(name), content).unwrap();
}

#[tokio::test]
async fn test_collect_includes_only_found_articles() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "alpha_cleaned.json",
        r#"{"article_found": true, "title": "Alpha", "body_text": "Alpha body."}"#,
    );
    write(
        dir.path(),
        "beta_cleaned.json",
        r#"{"article_found": false, "title": "Paywall", "body_text": ""}"#,
    );
    write(
        dir.path(),
        "gamma_cleaned.json",
        r#"{"title": "No flag at all", "body_text": "Gamma body."}"#,
    );
    write(
        dir.path(),
        "delta_cleaned.json",
        r#"{"article_found": "false", "body_text": "String false."}"#,
    );

    let (articles, report) = collect_articles(dir.path()).await.unwrap();

    assert_eq!(articles.len(), 1);
    let alpha = &articles[&ArticleId::new("alpha")];
    assert_eq!(alpha.title, "Alpha");
    assert_eq!(alpha.file_name.as_deref(), Some("alpha"));

    assert_eq!(report.files_seen, 4);
    assert_eq!(report.articles_included, 1);
    assert_eq!(report.articles_skipped_not_found, 3);
    assert_eq!(report.files_failed, 0);
}

#[tokio::test]
async fn test_collect_skips_malformed_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "broken_cleaned.json", "{ not json");
    write(
        dir.path(),
        "good_cleaned.json",
        r#"{"article_found": true, "body_text": "Fine."}"#,
    );

    let (articles, report) = collect_articles(dir.path()).await.unwrap();

    assert_eq!(articles.len(), 1);
    assert!(articles.contains_key(&ArticleId::new("good")));
    assert_eq!(report.files_failed, 1);
}

#[tokio::test]
async fn test_collect_accepts_id_mapping_files() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "batch_cleaned.json",
        r#"{
            "one": {"article_found": true, "body_text": "One."},
            "two": {"article_found": false, "body_text": "Two."}
        }"#,
    );

    let (articles, _) = collect_articles(dir.path()).await.unwrap();

    let ids: Vec<_> = articles.keys().map(|id| id.as_str()).collect();
    assert_eq!(ids, vec!["one"]);
}

#[tokio::test]
async fn test_collect_ignores_other_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "notes.json", r#"{"article_found": true}"#);
    write(dir.path(), "page.html", "<html></html>");

    let (articles, report) = collect_articles(dir.path()).await.unwrap();

    assert!(articles.is_empty());
    assert_eq!(report.files_seen, 0);
}

#[tokio::test]
async fn test_collect_missing_directory_is_fatal() {
    let err = collect_articles(std::path::Path::new("/definitely/not/here"))
        .await
        .unwrap_err();
    assert!(matches!(err, IngestError::MissingDirectory(_)));
}

#[tokio::test]
async fn test_collect_duplicate_id_keeps_later_file() {
    let dir = tempfile::tempdir().unwrap();
    write(
        dir.path(),
        "a_cleaned.json",
        r#"{"shared": {"article_found": true, "title": "First", "body_text": "One."}}"#,
    );
    write(
        dir.path(),
        "b_cleaned.json",
        r#"{"shared": {"article_found": true, "title": "Second", "body_text": "Two."}}"#,
    );

    let (articles, report) = collect_articles(dir.path()).await.unwrap();

    assert_eq!(articles.len(), 1);
    assert_eq!(articles[&ArticleId::new("shared")].title, "Second");
    assert_eq!(report.articles_included, 1);
    assert_eq!(report.files_seen, 2);
}
