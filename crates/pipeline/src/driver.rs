use crate::config::{ConfigError, PipelineConfig, Provider};
use crate::metrics::{RunStats, StageReport, TimedOperation};
use crate::stage::*;
use anyhow::{Context, Result};
use assemble::{AssembleInputs, assemble};
use extract::{
    AtomicFactExtractor, ChunkChecker, Cleaner, CompletionService, Decontextualizer,
    EntityExtractor, EntityMention, Generator, OllamaClient, OpenAiClient, Paraphraser,
    PropositionSynthesizer, RelationExtractor, RelationInputs, RelationTriple, ResponseCache,
    RetryPolicy,
};
use ingest::{ArticleMap, Slots, StageFile, chunk_articles, collect_articles, slot_counts};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Runs stages against the files in the configured data directory
pub struct Pipeline {
    config: PipelineConfig,
    generator: Generator,
    stats: Arc<RunStats>,
}

impl Pipeline {
    /// Build the completion service the config names.
    ///
    /// Fails when the provider cannot be used, such as OpenAI without a key.
    pub fn new(config: PipelineConfig) -> Result<Self, ConfigError> {
        let api_key = config.llm.resolve_api_key()?;
        let service = build_service(&config, api_key);
        Ok(Self::with_service(config, service))
    }

    pub fn with_service(config: PipelineConfig, service: Arc<dyn CompletionService>) -> Self {
        let generator = build_generator(&config, service);
        Self {
            config,
            generator,
            stats: RunStats::new(),
        }
    }

    pub fn stats(&self) -> &RunStats {
        &self.stats
    }

    /// Run `from..=to`. The chunk check only runs when enabled or asked for alone.
    pub async fn run(&self, from: Stage, to: Stage) -> Result<()> {
        for stage in Stage::range(from, to) {
            let requested_alone = from == Stage::Check && to == Stage::Check;
            if stage == Stage::Check && !self.config.stages.check_chunks && !requested_alone {
                info!("Skipping chunk check, stages.check_chunks is off");
                continue;
            }
            self.run_stage(stage).await?;
        }
        Ok(())
    }

    pub async fn run_stage(&self, stage: Stage) -> Result<()> {
        info!(stage = %stage, "Running stage");
        let timer = TimedOperation::start();

        let report = match stage {
            Stage::Clean => self.clean().await,
            Stage::Collect => self.collect().await,
            Stage::Chunk => self.chunk().await,
            Stage::Check => self.check().await,
            Stage::Decontextualize => self.decontextualize().await,
            Stage::Entities => self.entities().await,
            Stage::Paraphrase => self.paraphrase().await,
            Stage::Relations => self.relations().await,
            Stage::Propositions => self.propositions().await,
            Stage::AtomicFacts => self.atomic_facts().await,
            Stage::Assemble => self.assemble().await,
        }
        .with_context(|| format!("stage {} failed", stage))?;

        self.stats.record(report, timer.elapsed());
        Ok(())
    }

    async fn clean(&self) -> Result<StageReport> {
        let report = Cleaner::new(self.generator.clone())
            .with_max_html_chars(self.config.stages.max_html_chars)
            .clean_dir(&self.config.paths.html_dir, &self.config.paths.cleaned_dir)
            .await?;

        Ok(StageReport::new(Stage::Clean, report.files_seen)
            .slots((report.files_cleaned, 0))
            .skipped(report.files_failed))
    }

    async fn collect(&self) -> Result<StageReport> {
        let (merged, report) = collect_articles(&self.config.paths.cleaned_dir).await?;
        self.write(MERGED_FILE, &merged).await?;

        Ok(StageReport::new(Stage::Collect, merged.len()).skipped(report.files_failed))
    }

    async fn chunk(&self) -> Result<StageReport> {
        let articles = StageFile::read_articles(&self.path(MERGED_FILE)).await?;
        let splitter = self.config.stages.chunk_strategy.splitter();
        let chunked = chunk_articles(&articles, splitter.as_ref());
        self.write(CHUNKED_FILE, &chunked).await?;

        let sentences = chunked.values().map(Vec::len).sum();
        Ok(StageReport::new(Stage::Chunk, chunked.len()).slots((sentences, 0)))
    }

    async fn check(&self) -> Result<StageReport> {
        let chunked: ArticleMap<Vec<String>> = self.read(CHUNKED_FILE).await?;
        let checked = ChunkChecker::new(self.generator.clone()).run(&chunked).await;
        self.write(CHECKED_FILE, &checked).await?;

        let (filled, missing) = checked
            .values()
            .flatten()
            .fold((0, 0), |(filled, missing), chunk| match chunk.complete {
                Some(_) => (filled + 1, missing),
                None => (filled, missing + 1),
            });
        info!(
            incomplete = extract::check::incomplete_count(&checked),
            "Chunk check finished"
        );
        Ok(StageReport::new(Stage::Check, checked.len()).slots((filled, missing)))
    }

    async fn decontextualize(&self) -> Result<StageReport> {
        let chunked: ArticleMap<Vec<String>> = self.read(CHUNKED_FILE).await?;
        let out = Decontextualizer::new(self.generator.clone())
            .with_context_window(self.config.stages.context_window())
            .run(&chunked)
            .await;
        self.finish(Stage::Decontextualize, DECONTEXTUALIZED_FILE, &out)
            .await
    }

    async fn entities(&self) -> Result<StageReport> {
        let sentences: ArticleMap<Slots<String>> = self.read(DECONTEXTUALIZED_FILE).await?;
        let out = EntityExtractor::new(self.generator.clone())
            .run(&sentences)
            .await;
        self.finish(Stage::Entities, ENTITIES_FILE, &out).await
    }

    async fn paraphrase(&self) -> Result<StageReport> {
        let sentences: ArticleMap<Slots<String>> = self.read(DECONTEXTUALIZED_FILE).await?;
        let entities: ArticleMap<Slots<Vec<EntityMention>>> = self.read(ENTITIES_FILE).await?;
        let out = Paraphraser::new(self.generator.clone())
            .run(&sentences, &entities)
            .await;
        self.finish(Stage::Paraphrase, PARAPHRASED_FILE, &out).await
    }

    async fn relations(&self) -> Result<StageReport> {
        let sentences: ArticleMap<Slots<String>> = self.read(DECONTEXTUALIZED_FILE).await?;
        let entities: ArticleMap<Slots<Vec<EntityMention>>> = self.read(ENTITIES_FILE).await?;
        let paraphrases: ArticleMap<Slots<String>> = self.read(PARAPHRASED_FILE).await?;

        let out = RelationExtractor::new(self.generator.clone())
            .with_max_pairs(self.config.stages.max_pairs_per_sentence)
            .run(&RelationInputs {
                sentences: &sentences,
                entities: &entities,
                paraphrases: &paraphrases,
            })
            .await;
        self.finish(Stage::Relations, RELATIONSHIPS_FILE, &out).await
    }

    async fn propositions(&self) -> Result<StageReport> {
        let sentences: ArticleMap<Slots<String>> = self.read(DECONTEXTUALIZED_FILE).await?;
        let relations: ArticleMap<Slots<Vec<RelationTriple>>> =
            self.read(RELATIONSHIPS_FILE).await?;
        let out = PropositionSynthesizer::new(self.generator.clone())
            .run(&sentences, &relations)
            .await;
        self.finish(Stage::Propositions, PROPOSITIONS_FILE, &out).await
    }

    async fn atomic_facts(&self) -> Result<StageReport> {
        let sentences: ArticleMap<Slots<String>> = self.read(DECONTEXTUALIZED_FILE).await?;
        let propositions: ArticleMap<Slots<Vec<String>>> = self.read(PROPOSITIONS_FILE).await?;
        let out = AtomicFactExtractor::new(self.generator.clone())
            .run(&sentences, &propositions)
            .await;
        self.finish(Stage::AtomicFacts, ATOMIC_FACTS_FILE, &out).await
    }

    async fn assemble(&self) -> Result<StageReport> {
        let sentences: ArticleMap<Slots<String>> = self.read(DECONTEXTUALIZED_FILE).await?;
        let entities: ArticleMap<Slots<Vec<EntityMention>>> = self.read(ENTITIES_FILE).await?;
        let relationships: ArticleMap<Slots<Vec<RelationTriple>>> =
            self.read(RELATIONSHIPS_FILE).await?;
        let propositions: ArticleMap<Slots<Vec<String>>> = self.read(PROPOSITIONS_FILE).await?;
        let atomic_facts: ArticleMap<Slots<Vec<String>>> = self.read(ATOMIC_FACTS_FILE).await?;

        let inputs = AssembleInputs {
            sentences: &sentences,
            entities: &entities,
            relationships: &relationships,
            propositions: &propositions,
            atomic_facts: &atomic_facts,
        };
        let assembly = assemble(&inputs, self.config.stages.alignment_policy)?;
        self.write(KNOWLEDGE_GRAPH_FILE, &assembly.graph).await?;

        let nodes = assembly.graph.values().map(Vec::len).sum();
        Ok(StageReport::new(Stage::Assemble, assembly.graph.len())
            .slots((nodes, 0))
            .skipped(assembly.misaligned.len()))
    }

    async fn finish<T: Serialize>(
        &self,
        stage: Stage,
        file: &str,
        out: &ArticleMap<Slots<T>>,
    ) -> Result<StageReport> {
        self.write(file, out).await?;
        Ok(StageReport::new(stage, out.len()).slots(slot_counts(out)))
    }

    fn path(&self, file: &str) -> PathBuf {
        self.config.paths.data_dir.join(file)
    }

    async fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T> {
        Ok(StageFile::read(&self.path(file)).await?)
    }

    async fn write<T: Serialize>(&self, file: &str, value: &T) -> Result<()> {
        let path = self.path(file);
        StageFile::write(&path, value).await?;
        info!(file = %path.display(), "Wrote stage output");
        Ok(())
    }
}

fn build_service(config: &PipelineConfig, api_key: Option<String>) -> Arc<dyn CompletionService> {
    let llm = &config.llm;
    let base_url = llm
        .base_url
        .clone()
        .unwrap_or_else(|| llm.provider.default_base_url().to_string());

    match llm.provider {
        Provider::Ollama => Arc::new(OllamaClient::new(base_url, llm.model.clone())),
        Provider::OpenAi => Arc::new(OpenAiClient::new(base_url, llm.model.clone(), api_key)),
    }
}

fn build_generator(config: &PipelineConfig, service: Arc<dyn CompletionService>) -> Generator {
    let retry = RetryPolicy::new(
        config.retry.max_retries,
        config.retry.initial_backoff_ms,
        config.retry.max_backoff_ms,
    );

    let generator = Generator::new(service)
        .with_retry(retry)
        .with_timeout(Duration::from_secs(config.concurrency.request_timeout_secs))
        .with_delay(Duration::from_millis(config.concurrency.request_delay_ms))
        .with_max_concurrent(config.concurrency.max_concurrent_requests);

    if config.cache.enabled {
        generator.with_cache(ResponseCache::new(config.cache.max_entries))
    } else {
        generator
    }
}
