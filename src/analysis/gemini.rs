use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::config::AnalysisConfig;
use crate::error::{Result, VidioError};
use crate::media::StillImage;
use crate::state::Language;
use super::prompt::{analysis_response_schema, build_analysis_prompt, build_thumbnail_prompt};
use super::{parse_analysis_report, AnalysisReport, AnalysisService, GeneratedImage};

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Part {
    text: Option<String>,
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

impl GenerateContentResponse {
    fn first_parts(&self) -> &[Part] {
        self.candidates
            .first()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or_default()
    }

    /// Concatenated text of the first candidate
    fn text(&self) -> Option<String> {
        let text: String = self.first_parts()
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        (!text.trim().is_empty()).then_some(text)
    }

    fn first_inline_data(&self) -> Option<&InlineData> {
        self.first_parts().iter().find_map(|p| p.inline_data.as_ref())
    }
}

/// Request body for frame analysis: frames first, then the instruction
pub(crate) fn build_analysis_request(images: &[StillImage], language: Language) -> Value {
    let mut parts: Vec<Value> = images
        .iter()
        .map(|image| json!({
            "inlineData": { "mimeType": image.mime_type, "data": image.to_base64() }
        }))
        .collect();
    parts.push(json!({ "text": build_analysis_prompt(language) }));

    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseMimeType": "application/json",
            "responseSchema": analysis_response_schema()
        }
    })
}

pub(crate) fn build_image_request(prompt: &str, aspect_ratio: &str) -> Value {
    json!({
        "contents": [{ "parts": [{ "text": build_thumbnail_prompt(prompt) }] }],
        "generationConfig": {
            "responseModalities": ["IMAGE"],
            "imageConfig": { "aspectRatio": aspect_ratio }
        }
    })
}

/// Extract the report from a raw generateContent reply
pub(crate) fn parse_analysis_reply(body: &str) -> Result<AnalysisReport> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| VidioError::Analysis(format!("Unexpected response envelope: {}", e)))?;
    let text = response.text()
        .ok_or_else(|| VidioError::Analysis("Response contained no text".to_string()))?;
    parse_analysis_report(&text)
}

/// Extract the first inline image from a raw generateContent reply
pub(crate) fn parse_image_reply(body: &str) -> Result<GeneratedImage> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| VidioError::Generation(format!("Unexpected response envelope: {}", e)))?;
    let inline = response.first_inline_data()
        .ok_or_else(|| VidioError::Generation("No image generated".to_string()))?;
    let data = STANDARD.decode(inline.data.as_bytes())
        .map_err(|e| VidioError::Generation(format!("Invalid image payload: {}", e)))?;
    if data.is_empty() {
        return Err(VidioError::Generation("No image generated".to_string()));
    }

    Ok(GeneratedImage {
        mime_type: inline.mime_type.clone(),
        data,
    })
}

/// Client for the Gemini generateContent endpoint
pub struct GeminiClient {
    client: Client,
    config: AnalysisConfig,
    api_key: String,
}

impl GeminiClient {
    pub fn new(config: AnalysisConfig) -> Result<Self> {
        let api_key = config.resolve_api_key()?;
        let client = Client::builder()
            .timeout(config.request_timeout())
            .user_agent(concat!("vidio/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, config, api_key })
    }

    fn endpoint_for(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.endpoint.trim_end_matches('/'),
            model
        )
    }

    /// POST a request body and return the raw reply text
    async fn generate_content(&self, model: &str, body: &Value) -> std::result::Result<String, String> {
        let url = self.endpoint_for(model);
        debug!("POST {}", url);

        let response = self.client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status();
        let text = response.text().await
            .map_err(|e| format!("Failed to read response: {}", e))?;

        if !status.is_success() {
            return Err(format!("{} returned {}: {}", model, status, text));
        }
        Ok(text)
    }
}

#[async_trait]
impl AnalysisService for GeminiClient {
    async fn analyze(&self, images: &[StillImage], language: Language) -> Result<AnalysisReport> {
        if images.is_empty() {
            return Err(VidioError::InvalidArgument("No frames to analyze".to_string()));
        }

        let limit = self.config.max_images;
        let images = if images.len() > limit {
            warn!("Sending only the first {} of {} frames", limit, images.len());
            &images[..limit]
        } else {
            images
        };

        info!("Analyzing {} frames with {} ({})", images.len(), self.config.model, language);
        let body = build_analysis_request(images, language);
        let reply = self.generate_content(&self.config.model, &body).await
            .map_err(VidioError::Analysis)?;

        parse_analysis_reply(&reply)
    }

    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage> {
        if prompt.trim().is_empty() {
            return Err(VidioError::InvalidArgument("Thumbnail prompt is empty".to_string()));
        }

        info!("Generating {} thumbnail with {}", aspect_ratio, self.config.image_model);
        let body = build_image_request(prompt, aspect_ratio);
        let reply = self.generate_content(&self.config.image_model, &body).await
            .map_err(VidioError::Generation)?;

        parse_image_reply(&reply)
    }
}
