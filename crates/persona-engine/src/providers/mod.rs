use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use persona_contracts::studio::{GenerationError, GenerationRequest, ImagePayload};
use reqwest::blocking::Response as HttpResponse;
use serde_json::{Map, Value};

mod dryrun;
mod gemini;

pub use dryrun::DryrunProvider;
pub use gemini::GeminiProvider;

pub const SQUARE_ASPECT_RATIO: &str = "1:1";

#[derive(Debug, Clone)]
pub struct ProviderGenerateRequest {
    pub model: String,
    pub prompt: String,
    pub aspect_ratio: &'static str,
    pub selection: GenerationRequest,
}

#[derive(Debug, Clone)]
pub struct ProviderGenerateResponse {
    pub payload: ImagePayload,
    pub provider_request: Map<String, Value>,
    pub provider_response: Map<String, Value>,
    pub warnings: Vec<String>,
}

/// One outbound call to an image service. Implementations make exactly one
/// request per call and never retry.
pub trait ImageGenerator: Send + Sync {
    fn name(&self) -> &str;
    fn generate(
        &self,
        request: &ProviderGenerateRequest,
    ) -> Result<ProviderGenerateResponse, GenerationError>;
}

#[derive(Default, Clone)]
pub struct ImageGeneratorRegistry {
    providers: BTreeMap<String, Arc<dyn ImageGenerator>>,
}

impl ImageGeneratorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<P: ImageGenerator + 'static>(&mut self, provider: P) {
        self.providers
            .insert(provider.name().to_string(), Arc::new(provider));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn ImageGenerator>> {
        self.providers.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.providers.keys().cloned().collect()
    }
}

pub(crate) fn response_json_or_error(provider: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{provider} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{provider} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{provider} returned invalid JSON payload"))?;
    Ok(parsed)
}

pub(crate) fn transport_error(err: anyhow::Error) -> GenerationError {
    GenerationError::Transport(error_chain_text(&err, 1024))
}

pub(crate) fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if parts
            .last()
            .map(|existing| existing == trimmed)
            .unwrap_or(false)
        {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub(crate) fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

pub(crate) fn push_unique_warning(warnings: &mut Vec<String>, message: String) {
    if message.trim().is_empty() {
        return;
    }
    if warnings.iter().any(|existing| existing == &message) {
        return;
    }
    warnings.push(message);
}

pub(crate) fn map_object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().unwrap_or_default()
}
