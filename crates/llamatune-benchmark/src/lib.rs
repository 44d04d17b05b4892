pub mod events;
pub mod generator;
pub mod ollama;
pub mod runner;

pub use events::{BenchmarkEvent, ProgressEvent, StepNotification, StepOutcome};
pub use generator::{attempt, GenerationOutput, Generator};
pub use ollama::{OllamaClient, OllamaGenerator, OllamaModel};
pub use runner::{run_streaming, BenchmarkRunner, RunnerState};
