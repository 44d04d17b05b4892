mod benchmark;
mod results;

pub use benchmark::BenchmarkService;
pub use results::{
    default_config_path, default_results_dir, export, import, local_time, ResultStore,
    StoreError, StoredResult,
};

// Re-export benchmark types for convenience
pub use llamatune_benchmark::{BenchmarkEvent, OllamaClient, OllamaModel, ProgressEvent, StepNotification, StepOutcome};
