use extract::{
    Cleaner, Decontextualizer, EntityMention, Generator, MockService, Paraphraser,
    RelationExtractor, RelationInputs, RelationTriple, RetryPolicy,
};
use ingest::{ArticleId, ArticleMap, Slots};
use std::sync::Arc;

fn generator(mock: &MockService) -> Generator {
    Generator::new(Arc::new(mock.clone())).with_retry(RetryPolicy::none())
}

fn one_article<T>(id: &ArticleId, value: T) -> ArticleMap<T> {
    ArticleMap::from([(id.clone(), value)])
}

struct Fixture {
    id: ArticleId,
    sentences: ArticleMap<Slots<String>>,
    entities: ArticleMap<Slots<Vec<EntityMention>>>,
    paraphrases: ArticleMap<Slots<String>>,
}

impl Fixture {
    fn new() -> Self {
        let id = ArticleId::from("musk");
        Self {
            sentences: one_article(&id, vec![Some("Musk leads Tesla.".to_string())]),
            entities: one_article(
                &id,
                vec![Some(vec![
                    EntityMention::new("Musk", "PER"),
                    EntityMention::new("Tesla", "ORG"),
                ])],
            ),
            paraphrases: one_article(&id, vec![Some("Tesla is led by Musk.".to_string())]),
            id,
        }
    }

    fn inputs(&self) -> RelationInputs<'_> {
        RelationInputs {
            sentences: &self.sentences,
            entities: &self.entities,
            paraphrases: &self.paraphrases,
        }
    }
}

#[tokio::test]
async fn test_relations_keep_only_validated_triples() {
    let mock = MockService::default()
        .when(r#"between "Musk" and "Tesla""#, r#"{"relation": "Leads"}"#)
        .when(r#"between "Tesla" and "Musk""#, r#"{"relation": ""}"#)
        .when(r#""Musk Leads Tesla""#, r#"{"is_valid": true}"#);
    let fixture = Fixture::new();

    let out = RelationExtractor::new(generator(&mock))
        .run(&fixture.inputs())
        .await;

    assert_eq!(
        out[&fixture.id],
        vec![Some(vec![RelationTriple::new("Musk", "Leads", "Tesla")])]
    );
    // Two candidates, one validation; the empty label is never validated
    assert_eq!(mock.call_count(), 3);
}

#[tokio::test]
async fn test_rejected_relation_leaves_empty_list() {
    let mock = MockService::default()
        .when("Identify the relationship", r#"{"relation": "Leads"}"#)
        .when("correct?", r#"{"is_valid": false}"#);
    let fixture = Fixture::new();

    let out = RelationExtractor::new(generator(&mock))
        .run(&fixture.inputs())
        .await;

    assert_eq!(out[&fixture.id], vec![Some(vec![])]);
}

#[tokio::test]
async fn test_failed_pair_does_not_drop_sentence() {
    let mock = MockService::default()
        .fail_when(r#"between "Tesla" and "Musk""#)
        .when(r#"between "Musk" and "Tesla""#, r#"{"relation": "Leads"}"#)
        .when("correct?", r#"{"is_valid": true}"#);
    let fixture = Fixture::new();

    let out = RelationExtractor::new(generator(&mock))
        .run(&fixture.inputs())
        .await;

    assert_eq!(
        out[&fixture.id],
        vec![Some(vec![RelationTriple::new("Musk", "Leads", "Tesla")])]
    );
}

#[tokio::test]
async fn test_pair_cap_limits_calls() {
    let mock = MockService::default()
        .when("Identify the relationship", r#"{"relation": "Leads"}"#)
        .when("correct?", r#"{"is_valid": true}"#);
    let fixture = Fixture::new();

    let out = RelationExtractor::new(generator(&mock))
        .with_max_pairs(Some(1))
        .run(&fixture.inputs())
        .await;

    assert_eq!(out[&fixture.id][0].as_ref().unwrap().len(), 1);
    assert_eq!(mock.call_count(), 2);
}

#[tokio::test]
async fn test_missing_paraphrase_makes_slot_empty() {
    let mock = MockService::default();
    let mut fixture = Fixture::new();
    fixture.paraphrases = one_article(&fixture.id, vec![None]);

    let out = RelationExtractor::new(generator(&mock))
        .run(&fixture.inputs())
        .await;

    assert_eq!(out[&fixture.id], vec![None]);
    assert_eq!(mock.call_count(), 0);
}

#[tokio::test]
async fn test_relations_never_pair_an_entity_with_itself() {
    let mock = MockService::default()
        .when("Identify the relationship", r#"{"relation": "Knows"}"#)
        .when("correct?", r#"{"is_valid": true}"#);
    let mut fixture = Fixture::new();
    fixture.entities = one_article(
        &fixture.id,
        vec![Some(vec![
            EntityMention::new("Musk", "PER"),
            EntityMention::new("Musk", "PER"),
            EntityMention::new("Tesla", "ORG"),
        ])],
    );

    let out = RelationExtractor::new(generator(&mock))
        .run(&fixture.inputs())
        .await;

    let triples = out[&fixture.id][0].as_ref().unwrap();
    assert!(!triples.is_empty());
    assert!(triples.iter().all(|t| t.subject != t.object));
}

#[tokio::test]
async fn test_decontextualize_passes_previous_sentences_in_order() {
    let mock = MockService::new(r#"{"sentence": "ok"}"#);
    let id = ArticleId::from("a");
    let chunked = one_article(
        &id,
        vec![
            "First.".to_string(),
            "Second.".to_string(),
            "Third.".to_string(),
        ],
    );

    let out = Decontextualizer::new(generator(&mock))
        .with_context_window(Some(1))
        .run(&chunked)
        .await;

    assert_eq!(out[&id].len(), 3);
    let requests = mock.requests();
    let last = &requests[2].user;
    let context = &last[last.rfind("Now rewrite").unwrap()..];
    assert!(context.contains("Second."));
    assert!(!context.contains("First."));
    assert!(context.find("Second.").unwrap() < context.find("Third.").unwrap());
}

#[tokio::test]
async fn test_cleaner_writes_cleaned_files_and_skips_failures() {
    let html_dir = tempfile::tempdir().unwrap();
    let out_dir = tempfile::tempdir().unwrap();
    std::fs::write(html_dir.path().join("good.html"), "<p>Tesla news</p>").unwrap();
    std::fs::write(html_dir.path().join("bad.html"), "<p>broken page</p>").unwrap();
    std::fs::write(html_dir.path().join("notes.txt"), "ignored").unwrap();

    let mock = MockService::new(
        r#"{"article_found": true, "title": "T", "publication_date": "2024-01-01", "author": "A", "publisher": "P", "body_text": "Tesla news."}"#,
    )
    .fail_when("broken page");

    let report = Cleaner::new(generator(&mock))
        .clean_dir(html_dir.path(), out_dir.path())
        .await
        .unwrap();

    assert_eq!(report.files_seen, 2);
    assert_eq!(report.files_cleaned, 1);
    assert_eq!(report.files_failed, 1);
    assert!(out_dir.path().join("good_cleaned.json").exists());
    assert!(!out_dir.path().join("bad_cleaned.json").exists());

    let (articles, _) = ingest::collect_articles(out_dir.path()).await.unwrap();
    assert_eq!(articles[&ArticleId::from("good")].body_text, "Tesla news.");
}

#[tokio::test]
async fn test_paraphrase_skips_sentence_without_entities() {
    let mock = MockService::new(r#"{"paraphrased_text": "Tesla is led by Musk."}"#);
    let id = ArticleId::from("musk");
    let sentences = one_article(
        &id,
        vec![
            Some("Musk leads Tesla.".to_string()),
            Some("He builds cars.".to_string()),
        ],
    );
    let entities = one_article(&id, vec![Some(vec![EntityMention::new("Musk", "PER")]), None]);

    let out = Paraphraser::new(generator(&mock))
        .run(&sentences, &entities)
        .await;

    assert_eq!(
        out[&id],
        vec![Some("Tesla is led by Musk.".to_string()), None]
    );
    assert_eq!(mock.call_count(), 1);
}
