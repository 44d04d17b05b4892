pub mod benchmark_type;
pub mod config;
pub mod error;
pub mod metrics;
pub mod parameters;
pub mod plan;
pub mod summary;

pub use benchmark_type::{BenchmarkType, Phase, StressOptions, StressTestType};
pub use config::{DefaultsConfig, LlamaTuneConfig, OllamaConfig, ResultsConfig};
pub use error::{LlamaTuneError, Result};
pub use metrics::{MetricsAccumulator, RunResult};
pub use parameters::{GenerationParameters, ParameterChange, Preset};
pub use plan::{parse_prompts, transform_prompt, BenchmarkPlan, PlanRequest};
pub use summary::{
    summarize, BenchmarkResult, BenchmarkSummary, PerformanceDelta, PhaseResult, PromptSummary,
    RunStatus,
};
