use std::time::Duration;

use persona_contracts::studio::{GenerationError, ImagePayload};
use reqwest::blocking::Client as HttpClient;
use serde_json::{json, Map, Value};

use crate::config::EngineConfig;
use crate::key_gate::CredentialSlot;

use super::{
    map_object, push_unique_warning, response_json_or_error, transport_error, ImageGenerator,
    ProviderGenerateRequest, ProviderGenerateResponse,
};

const API_KEY_HEADER: &str = "x-goog-api-key";

pub struct GeminiProvider {
    api_base: String,
    request_timeout_s: f64,
    credentials: CredentialSlot,
}

impl GeminiProvider {
    pub fn new(config: &EngineConfig, credentials: CredentialSlot) -> Self {
        Self {
            api_base: config.api_base.clone(),
            request_timeout_s: config.request_timeout_s,
            credentials,
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(request: &ProviderGenerateRequest) -> Map<String, Value> {
        let mut payload = Map::new();
        payload.insert(
            "contents".to_string(),
            Value::Array(vec![json!({
                "role": "user",
                "parts": [{ "text": request.prompt }],
            })]),
        );

        let mut image_config = Map::new();
        image_config.insert(
            "aspectRatio".to_string(),
            Value::String(request.aspect_ratio.to_string()),
        );
        image_config.insert(
            "imageSize".to_string(),
            Value::String(request.selection.size.label().to_string()),
        );
        let mut generation_config = Map::new();
        generation_config.insert(
            "responseModalities".to_string(),
            json!(["TEXT", "IMAGE"]),
        );
        generation_config.insert("imageConfig".to_string(), Value::Object(image_config));
        payload.insert(
            "generationConfig".to_string(),
            Value::Object(generation_config),
        );
        payload
    }

    /// Scans the first candidate's parts for inline image data. Any other
    /// response shape counts as "no image".
    fn extract_image(response_payload: &Value) -> Result<ImagePayload, GenerationError> {
        let parts = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first())
            .and_then(|candidate| candidate.get("content"))
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .cloned()
            .unwrap_or_default();

        for part in parts {
            let Some(inline) = part
                .get("inlineData")
                .or_else(|| part.get("inline_data"))
                .and_then(Value::as_object)
            else {
                continue;
            };
            let data = inline
                .get("data")
                .and_then(Value::as_str)
                .unwrap_or_default();
            if data.is_empty() {
                continue;
            }
            let mime_type = inline
                .get("mimeType")
                .or_else(|| inline.get("mime_type"))
                .and_then(Value::as_str)
                .map(str::to_string);
            return ImagePayload::from_base64(data, mime_type);
        }

        Err(GenerationError::NoImageInResponse)
    }

    fn response_summary(response_payload: &Value) -> Map<String, Value> {
        let candidates = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .map(|rows| rows.len())
            .unwrap_or(0);
        map_object(json!({
            "candidates": candidates,
            "finish_reason": response_payload
                .pointer("/candidates/0/finishReason")
                .cloned()
                .unwrap_or(Value::Null),
            "block_reason": response_payload
                .pointer("/promptFeedback/blockReason")
                .cloned()
                .unwrap_or(Value::Null),
            "usage_metadata": response_payload
                .get("usageMetadata")
                .cloned()
                .unwrap_or(Value::Null),
        }))
    }
}

impl ImageGenerator for GeminiProvider {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate(
        &self,
        request: &ProviderGenerateRequest,
    ) -> Result<ProviderGenerateResponse, GenerationError> {
        // Resolved per call so a newly selected key applies to the next request.
        let api_key = self
            .credentials
            .resolve()
            .ok_or(GenerationError::MissingCredential)?;
        let http = HttpClient::builder()
            .timeout(Duration::from_secs_f64(self.request_timeout_s))
            .build()
            .map_err(|err| transport_error(anyhow::Error::new(err)))?;

        let endpoint = self.endpoint_for_model(&request.model);
        let payload = Self::build_payload(request);
        let response = http
            .post(&endpoint)
            .header(API_KEY_HEADER, api_key)
            .json(&payload)
            .send()
            .map_err(|raw| {
                transport_error(
                    anyhow::Error::new(raw.without_url())
                        .context(format!("Gemini request failed ({endpoint})")),
                )
            })?;
        let response_payload = response_json_or_error("Gemini", response).map_err(transport_error)?;

        let mut warnings = Vec::new();
        if let Some(reason) = response_payload
            .pointer("/promptFeedback/blockReason")
            .and_then(Value::as_str)
        {
            push_unique_warning(&mut warnings, format!("Gemini blocked the prompt: {reason}."));
        }
        let image = Self::extract_image(&response_payload)?;

        Ok(ProviderGenerateResponse {
            payload: image,
            provider_request: map_object(json!({
                "endpoint": endpoint,
                "payload": payload,
            })),
            provider_response: Self::response_summary(&response_payload),
            warnings,
        })
    }
}
