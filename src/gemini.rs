use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::{config::{ConfigError, GeminiConfig}, models::SourceImage};

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("invalid request: {0}")] InvalidRequest(&'static str),
    #[error("HTTP error: {0}")] Http(String),
    #[error("parse error: {0}")] Parse(String),
    #[error("no image data in response")] NoImage,
}

/// One call to the external image generator. Implementations keep no state
/// between calls and never retry on their own.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Returns the generated image as base64.
    async fn generate(&self, source: &SourceImage, instruction: &str) -> Result<String, GenerationError>;
}

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    aspect_ratio: String,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            aspect_ratio: config.aspect_ratio.clone(),
        })
    }

    async fn perform_api_call(&self, source: &SourceImage, instruction: &str) -> Result<String, GenerationError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, self.model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let request_body = build_request_body(source, instruction, &self.aspect_ratio);
        if tracing::enabled!(tracing::Level::DEBUG) {
            let mut logged = request_body.clone();
            truncate_base64_in_json(&mut logged);
            debug!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());
        }

        let response = self.client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GenerationError::Http(e.to_string()))?;
        drop(request_body);

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await.map_err(|e| GenerationError::Http(e.to_string()))?;
        if !status.is_success() {
            error!("❌ API Error response: {}", truncate_for_log(&response_text));
            return Err(GenerationError::Http(format!("status={} body={}", status, truncate_for_log(&response_text))));
        }

        let parsed: GeminiResponse = serde_json::from_str(&response_text)
            .map_err(|e| GenerationError::Parse(e.to_string()))?;

        match extract_first_image_b64(&parsed) {
            Some(image_data) => {
                info!("🖼️ Extracted {} image from API response: {}", sniff_image_type(&image_data), preview(&image_data));
                Ok(image_data)
            }
            None => {
                warn!("⚠️ No image data found in API response: {}", truncate_for_log(&response_text));
                Err(GenerationError::NoImage)
            }
        }
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn generate(&self, source: &SourceImage, instruction: &str) -> Result<String, GenerationError> {
        if source.data().is_empty() {
            return Err(GenerationError::InvalidRequest("image data is empty"));
        }
        if instruction.trim().is_empty() {
            return Err(GenerationError::InvalidRequest("instruction text is empty"));
        }
        info!("Generating portrait with Gemini model {}...", self.model);
        self.perform_api_call(source, instruction).await
    }
}

pub fn build_request_body(source: &SourceImage, instruction: &str, aspect_ratio: &str) -> serde_json::Value {
    json!({
        "contents": [{
            "parts": [
                {"inlineData": {"mimeType": source.mime_type(), "data": source.to_base64()}},
                {"text": instruction}
            ]
        }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": {"aspectRatio": aspect_ratio}
        }
    })
}

/// Short preview of a base64 payload for log lines.
pub fn preview(data: &str) -> String {
    let total = data.chars().count();
    if total > 50 {
        format!("{}...[{} chars total]", data.chars().take(50).collect::<String>(), total)
    } else {
        data.to_string()
    }
}

fn truncate_for_log(text: &str) -> String {
    if text.len() <= 1000 {
        return text.to_string();
    }
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(mut value) => {
            truncate_base64_in_json(&mut value);
            serde_json::to_string(&value).unwrap_or_default()
        }
        Err(_) => format!("{}...", text.chars().take(1000).collect::<String>()),
    }
}

fn sniff_image_type(image_data: &str) -> &'static str {
    if image_data.starts_with("iVBORw0KGgo") {
        "PNG"
    } else if image_data.starts_with("/9j/") {
        "JPEG"
    } else if image_data.starts_with("UklGR") {
        "WEBP"
    } else {
        "Unknown"
    }
}

// Replaces long base64 "data" strings so request/response dumps stay readable.
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        let total = s.chars().count();
                        if total > 100 && s.chars().all(|c| c.is_alphanumeric() || c == '+' || c == '/' || c == '=') {
                            let head: String = s.chars().take(50).collect();
                            *val = serde_json::Value::String(format!("{}...[truncated {} chars]", head, total - 50));
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

// --- Response Parsing Helpers ---

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(serde_json::Value)
}

#[derive(Debug, Deserialize)]
struct InlineData {
    #[serde(default)]
    data: String,
    #[serde(rename = "mimeType", default)]
    mime_type: String,
}

fn extract_first_image_b64(resp: &GeminiResponse) -> Option<String> {
    for c in &resp.candidates {
        for p in &c.content.parts {
            match p {
                Part::Inline { inline_data } if !inline_data.data.is_empty() => {
                    debug!("🎯 Found image data with mime type: {}", inline_data.mime_type);
                    return Some(inline_data.data.clone());
                }
                Part::Text { text } => debug!("💬 Model text part: {}", text),
                _ => {}
            }
        }
    }
    None
}
