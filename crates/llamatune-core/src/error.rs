use thiserror::Error;

#[derive(Error, Debug)]
pub enum LlamaTuneError {
    #[error("Invalid benchmark plan: {0}")]
    InvalidPlan(String),

    #[error("Unknown preset: {0}")]
    UnknownPreset(String),

    #[error("Ollama error: {0}")]
    OllamaError(String),

    #[error("Generation failed: {0}")]
    GenerationFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("Config error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, LlamaTuneError>;
