pub mod cli;
pub mod config;
pub mod driver;
pub mod metrics;
pub mod stage;

pub use config::{ConfigError, PipelineConfig, Provider};
pub use driver::Pipeline;
pub use metrics::{RunSnapshot, RunStats, StageReport};
pub use stage::Stage;
