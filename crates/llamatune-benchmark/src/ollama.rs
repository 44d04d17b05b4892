use std::time::{Duration, Instant};

use async_trait::async_trait;
use llamatune_core::{GenerationParameters, LlamaTuneError, Result};
use serde::{Deserialize, Serialize};

use crate::generator::{GenerationOutput, Generator};

#[derive(Debug, Clone)]
pub struct OllamaClient {
    host: String,
    client: reqwest::Client,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    models: Vec<TagModel>,
}

#[derive(Debug, Deserialize)]
struct TagModel {
    name: String,
    size: u64,
    #[serde(default)]
    details: Option<ModelDetails>,
}

#[derive(Debug, Deserialize)]
struct ModelDetails {
    parameter_size: Option<String>,
    quantization_level: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaModel {
    pub name: String,
    pub size_bytes: u64,
    pub parameter_size: Option<String>,
    pub quantization: Option<String>,
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "GenerationParameters::is_empty")]
    options: &'a GenerationParameters,
}

#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    #[serde(default)]
    pub response: String,
    #[serde(default)]
    pub total_duration: Option<u64>,
    #[serde(default)]
    pub eval_count: Option<u64>,
    #[serde(default)]
    pub prompt_eval_count: Option<u64>,
    #[serde(default)]
    pub error: Option<String>,
}

impl OllamaClient {
    pub fn new(host: &str) -> Self {
        Self {
            host: host.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub fn with_timeout(host: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| LlamaTuneError::Http(e.to_string()))?;

        Ok(Self {
            host: host.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub async fn list_models(&self) -> Result<Vec<OllamaModel>> {
        let url = format!("{}/api/tags", self.host);
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| LlamaTuneError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(LlamaTuneError::OllamaError(format!(
                "Failed to list models: {}",
                resp.status()
            )));
        }

        let tags: TagsResponse = resp
            .json()
            .await
            .map_err(|e| LlamaTuneError::Http(e.to_string()))?;

        let models = tags
            .models
            .into_iter()
            .map(|m| {
                let (parameter_size, quantization) = match m.details {
                    Some(d) => (d.parameter_size, d.quantization_level),
                    None => (None, None),
                };
                OllamaModel {
                    name: m.name,
                    size_bytes: m.size,
                    parameter_size,
                    quantization,
                }
            })
            .collect();

        Ok(models)
    }

    pub async fn generate(
        &self,
        model: &str,
        prompt: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationOutput> {
        let url = format!("{}/api/generate", self.host);
        let request = GenerateRequest {
            model,
            prompt,
            stream: false,
            options: parameters,
        };

        let start = Instant::now();
        let resp = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| LlamaTuneError::Http(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(LlamaTuneError::OllamaError(format!(
                "Generate failed: {} - {}",
                status, body
            )));
        }

        let body = resp
            .text()
            .await
            .map_err(|e| LlamaTuneError::Http(e.to_string()))?;
        let elapsed = start.elapsed();

        parse_generate(&body, elapsed)
    }
}

fn parse_generate(body: &str, elapsed: Duration) -> Result<GenerationOutput> {
    let parsed: GenerateResponse = serde_json::from_str(body).map_err(|e| {
        let excerpt: String = body.chars().take(500).collect();
        LlamaTuneError::Http(format!(
            "Failed to parse response: {} - Body: {}",
            e, excerpt
        ))
    })?;
    into_output(parsed, elapsed)
}

/// Prefer Ollama's own duration; fall back to wall clock time.
fn into_output(resp: GenerateResponse, elapsed: Duration) -> Result<GenerationOutput> {
    if let Some(error) = resp.error {
        return Err(LlamaTuneError::OllamaError(error));
    }

    let generation_time_seconds = match resp.total_duration {
        Some(ns) if ns > 0 => ns as f64 / 1_000_000_000.0,
        _ => elapsed.as_secs_f64(),
    };

    Ok(GenerationOutput {
        response: resp.response,
        generation_time_seconds,
        input_tokens: token_count(resp.prompt_eval_count),
        output_tokens: token_count(resp.eval_count),
    })
}

fn token_count(count: Option<u64>) -> u32 {
    u32::try_from(count.unwrap_or(0)).unwrap_or(u32::MAX)
}

/// An [`OllamaClient`] pinned to one model.
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: OllamaClient,
    model: String,
}

impl OllamaGenerator {
    pub fn new(client: OllamaClient, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn generate(
        &self,
        prompt: &str,
        parameters: &GenerationParameters,
    ) -> Result<GenerationOutput> {
        tracing::debug!(model = %self.model, chars = prompt.len(), "Generating");
        self.client.generate(&self.model, prompt, parameters).await
    }
}
