use anyhow::{Context, Result};
use clap::Parser;
use pipeline::cli::{Cli, Command, Preset};
use pipeline::{Pipeline, PipelineConfig};
use std::process::ExitCode;
use tracing::{Instrument, error, info, info_span, warn};
use tracing_subscriber::EnvFilter;

const EXIT_PARTIAL: u8 = 2;

#[tokio::main]
async fn main() -> ExitCode {
    // .env may carry OPENAI_API_KEY; a missing file is fine
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let span = info_span!("run", run_id = %uuid::Uuid::new_v4());
    match execute(cli).instrument(span).await {
        Ok(Outcome::Complete) => ExitCode::SUCCESS,
        Ok(Outcome::Partial) => ExitCode::from(EXIT_PARTIAL),
        Err(e) => {
            error!("Pipeline failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

enum Outcome {
    Complete,
    Partial,
}

async fn execute(cli: Cli) -> Result<Outcome> {
    let config = load_config(&cli)?;

    let Some((from, to)) = cli.command.stages() else {
        print!("{}", config.to_redacted_toml().context("failed to render config")?);
        return Ok(Outcome::Complete);
    };

    info!(
        provider = ?config.llm.provider,
        model = %config.llm.model,
        data_dir = %config.paths.data_dir.display(),
        from = %from,
        to = %to,
        "Starting pipeline"
    );

    let pipeline = Pipeline::new(config)?;
    pipeline.run(from, to).await?;

    let snapshot = pipeline.stats().snapshot();
    if snapshot.stages_run > 1 {
        info!("Run summary\n{}", snapshot.table());
    }

    if pipeline.stats().is_partial() {
        warn!(
            missing = snapshot.slots_missing,
            skipped = snapshot.items_skipped,
            "Finished with missing items"
        );
        Ok(Outcome::Partial)
    } else {
        Ok(Outcome::Complete)
    }
}

fn load_config(cli: &Cli) -> Result<PipelineConfig> {
    let mut config = match cli.preset {
        Some(Preset::Fast) => PipelineConfig::fast(),
        Some(Preset::Accurate) => PipelineConfig::accurate(),
        None => PipelineConfig::load(cli.config.as_deref())?,
    };

    if let Some(data_dir) = &cli.data_dir {
        config.paths.data_dir = data_dir.clone();
    }
    if let Command::Chunk {
        strategy: Some(strategy),
    } = &cli.command
    {
        config.stages.chunk_strategy = *strategy;
    }

    config.validate()?;
    Ok(config)
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}
