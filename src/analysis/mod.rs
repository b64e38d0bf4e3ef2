// Remote analysis of sampled frames
//
// - Gemini: generateContent REST client (analysis + thumbnail images)
// - Prompt: prompt text and response schema

pub mod gemini;
pub mod prompt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub use gemini::GeminiClient;

use crate::config::AnalysisConfig;
use crate::error::{Result, VidioError};
use crate::media::StillImage;
use crate::state::Language;

/// Growth package returned for a video
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    #[serde(rename = "viralTitles")]
    pub titles: Vec<String>,
    pub description: String,
    pub tags: Vec<String>,
    #[serde(rename = "engagementStrategy")]
    pub engagement_strategy: String,
    #[serde(rename = "thumbnailPrompts")]
    pub thumbnail_prompts: Vec<String>,
}

/// Image returned by the generation endpoint
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl GeneratedImage {
    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            _ => "png",
        }
    }

    /// Write the image into `dir` as `vidio-studio-thumbnail-<suffix>.<ext>`
    pub async fn save_to_dir(&self, dir: &Path, suffix: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(dir).await?;
        let path = dir.join(format!("vidio-studio-thumbnail-{}.{}", suffix, self.extension()));
        tokio::fs::write(&path, &self.data).await?;
        Ok(path)
    }
}

/// A generated image paired with the prompt it came from
#[derive(Debug, Clone)]
pub struct GeneratedThumbnail {
    pub id: String,
    pub prompt: String,
    pub image: GeneratedImage,
}

/// Opaque AI service turning frames into metadata and prompts into images
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Analyze an ordered set of stills and describe the video in `language`
    async fn analyze(&self, images: &[StillImage], language: Language) -> Result<AnalysisReport>;

    /// Generate one image for `prompt` at the given aspect ratio (e.g. "16:9")
    async fn generate_image(&self, prompt: &str, aspect_ratio: &str) -> Result<GeneratedImage>;
}

/// Factory for analysis service instances
pub struct AnalysisFactory;

impl AnalysisFactory {
    pub fn create_service(config: AnalysisConfig) -> Result<Box<dyn AnalysisService>> {
        Ok(Box::new(GeminiClient::new(config)?))
    }
}

/// Strip a surrounding markdown code fence, if any
fn strip_code_fence(text: &str) -> &str {
    let text = text.trim();
    let Some(inner) = text.strip_prefix("```").and_then(|t| t.strip_suffix("```")) else {
        return text;
    };
    inner.strip_prefix("json").unwrap_or(inner).trim()
}

/// Parse a model reply into a report.
///
/// The reply must be a JSON object carrying every field with the right type;
/// anything else is an `Analysis` error, never a partially filled report.
pub fn parse_analysis_report(text: &str) -> Result<AnalysisReport> {
    let body = strip_code_fence(text);
    if body.is_empty() {
        return Err(VidioError::Analysis("Empty response from model".to_string()));
    }

    let value: serde_json::Value = serde_json::from_str(body)
        .map_err(|e| VidioError::Analysis(format!("Response is not valid JSON: {}", e)))?;
    if !value.is_object() {
        return Err(VidioError::Analysis("Response is not a JSON object".to_string()));
    }

    let report: AnalysisReport = serde_json::from_value(value)
        .map_err(|e| VidioError::Analysis(format!("Malformed analysis response: {}", e)))?;
    debug!(
        "Parsed analysis: {} titles, {} tags, {} thumbnail prompts",
        report.titles.len(),
        report.tags.len(),
        report.thumbnail_prompts.len()
    );
    Ok(report)
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted analysis service for workflow tests.

    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    use super::*;

    pub fn sample_report() -> AnalysisReport {
        AnalysisReport {
            titles: vec!["I tried this for 30 days".to_string()],
            description: "A month-long challenge.".to_string(),
            tags: vec!["challenge".to_string(), "vlog".to_string()],
            engagement_strategy: "Ask viewers to guess the ending.".to_string(),
            thumbnail_prompts: vec![
                "A calendar on fire".to_string(),
                "A runner at dawn".to_string(),
            ],
        }
    }

    #[derive(Default)]
    pub struct ScriptedAnalysis {
        pub delay: Option<Duration>,
        pub fail_analysis: bool,
        pub fail_generation: bool,
        pub received: Mutex<Vec<(usize, Language)>>,
        pub prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl AnalysisService for ScriptedAnalysis {
        async fn analyze(&self, images: &[StillImage], language: Language) -> Result<AnalysisReport> {
            self.received.lock().unwrap().push((images.len(), language));
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.fail_analysis {
                return parse_analysis_report(r#"{"description": "only this"}"#);
            }
            Ok(sample_report())
        }

        async fn generate_image(&self, prompt: &str, _aspect_ratio: &str) -> Result<GeneratedImage> {
            self.prompts.lock().unwrap().push(prompt.to_string());
            if self.fail_generation {
                return Err(VidioError::Generation("No image generated".to_string()));
            }
            Ok(GeneratedImage { mime_type: "image/png".to_string(), data: vec![0x89, b'P', b'N', b'G'] })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WELL_FORMED: &str = r#"{
        "viralTitles": ["Five tips", "You won't believe this"],
        "description": "An SEO friendly description.",
        "tags": ["tips", "howto"],
        "engagementStrategy": "Pin a question as the first comment.",
        "thumbnailPrompts": ["Neon city at night"]
    }"#;

    #[test]
    fn test_well_formed_report_accepted_unchanged() {
        let report = parse_analysis_report(WELL_FORMED).unwrap();
        assert_eq!(report.titles, vec!["Five tips", "You won't believe this"]);
        assert_eq!(report.description, "An SEO friendly description.");
        assert_eq!(report.tags, vec!["tips", "howto"]);
        assert_eq!(report.engagement_strategy, "Pin a question as the first comment.");
        assert_eq!(report.thumbnail_prompts, vec!["Neon city at night"]);

        // Serializes back to the same wire shape
        let original: serde_json::Value = serde_json::from_str(WELL_FORMED).unwrap();
        assert_eq!(serde_json::to_value(&report).unwrap(), original);
    }

    #[test]
    fn test_each_missing_field_rejected() {
        let fields = ["viralTitles", "description", "tags", "engagementStrategy", "thumbnailPrompts"];
        for field in fields {
            let mut value: serde_json::Value = serde_json::from_str(WELL_FORMED).unwrap();
            value.as_object_mut().unwrap().remove(field);
            let err = parse_analysis_report(&value.to_string()).unwrap_err();
            assert!(matches!(err, VidioError::Analysis(_)), "missing {}", field);
        }
    }

    #[test]
    fn test_wrong_field_type_rejected() {
        let text = WELL_FORMED.replace(r#"["tips", "howto"]"#, r#""tips, howto""#);
        assert!(matches!(parse_analysis_report(&text), Err(VidioError::Analysis(_))));
    }

    #[test]
    fn test_non_object_rejected() {
        for text in ["", "   ", "[]", "\"text\"", "{not json", "null"] {
            assert!(
                matches!(parse_analysis_report(text), Err(VidioError::Analysis(_))),
                "accepted {:?}",
                text
            );
        }
    }

    #[test]
    fn test_code_fence_tolerated() {
        let fenced = format!("```json\n{}\n```", WELL_FORMED);
        assert!(parse_analysis_report(&fenced).is_ok());
        let fenced = format!("```\n{}\n```", WELL_FORMED);
        assert!(parse_analysis_report(&fenced).is_ok());
    }

    #[tokio::test]
    async fn test_generated_image_saved_with_extension() {
        let dir = tempfile::tempdir().unwrap();
        let image = GeneratedImage { mime_type: "image/png".to_string(), data: vec![1, 2, 3] };
        let path = image.save_to_dir(dir.path(), "42").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "vidio-studio-thumbnail-42.png");
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }
}
