pub mod atomic_facts;
pub mod cache;
pub mod check;
pub mod clean;
pub mod decontextualize;
pub mod entities;
pub mod error;
pub mod generator;
pub mod llm;
pub mod mock;
pub mod paraphrase;
pub mod prompt;
pub mod propositions;
pub mod relations;
pub mod retry;
pub mod schema;
pub mod stage;

pub use atomic_facts::AtomicFactExtractor;
pub use cache::ResponseCache;
pub use check::{CheckedChunk, ChunkChecker};
pub use clean::{CleanReport, Cleaner};
pub use decontextualize::Decontextualizer;
pub use entities::EntityExtractor;
pub use error::LlmError;
pub use generator::Generator;
pub use llm::{CompletionRequest, CompletionService, OllamaClient, OpenAiClient, ResponseSchema};
pub use mock::MockService;
pub use paraphrase::Paraphraser;
pub use propositions::PropositionSynthesizer;
pub use relations::{RelationExtractor, RelationInputs};
pub use retry::RetryPolicy;
pub use schema::{EntityMention, RelationTriple};
