use crate::stage::Stage;
use clap::{Parser, Subcommand, ValueEnum};
use ingest::ChunkStrategy;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    name = "kgpipe",
    version,
    about = "Turn news articles into a per-sentence knowledge graph"
)]
pub struct Cli {
    /// TOML config file (defaults to ./kgpipe.toml when present)
    #[arg(long, global = true, env = "KGPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Start from a preset instead of a config file
    #[arg(long, global = true, value_enum, conflicts_with = "config")]
    pub preset: Option<Preset>,

    /// Directory holding the stage files
    #[arg(long, global = true, env = "KGPIPE_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Log as JSON lines
    #[arg(long, global = true)]
    pub log_json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Preset {
    Fast,
    Accurate,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Extract article fields from HTML pages
    Clean,
    /// Merge cleaned articles into one file
    Collect,
    /// Split article bodies into sentences
    Chunk {
        /// rule, unicode or lines
        #[arg(long)]
        strategy: Option<ChunkStrategy>,
    },
    /// Ask the model whether each chunk is a complete sentence
    Check,
    Decontextualize,
    Entities,
    Paraphrase,
    Relations,
    Propositions,
    AtomicFacts,
    /// Join every stage into knowledge nodes
    Assemble,
    /// Run a range of stages in order
    Run {
        #[arg(long, value_enum, default_value_t = Stage::Clean)]
        from: Stage,
        #[arg(long, value_enum, default_value_t = Stage::Assemble)]
        to: Stage,
    },
    /// Print the effective config as TOML
    Config,
}

impl Command {
    /// The stage range this command runs; `None` for `config`
    pub fn stages(&self) -> Option<(Stage, Stage)> {
        let single = |stage| Some((stage, stage));
        match self {
            Command::Clean => single(Stage::Clean),
            Command::Collect => single(Stage::Collect),
            Command::Chunk { .. } => single(Stage::Chunk),
            Command::Check => single(Stage::Check),
            Command::Decontextualize => single(Stage::Decontextualize),
            Command::Entities => single(Stage::Entities),
            Command::Paraphrase => single(Stage::Paraphrase),
            Command::Relations => single(Stage::Relations),
            Command::Propositions => single(Stage::Propositions),
            Command::AtomicFacts => single(Stage::AtomicFacts),
            Command::Assemble => single(Stage::Assemble),
            Command::Run { from, to } => Some((*from, *to)),
            Command::Config => None,
        }
    }
}
