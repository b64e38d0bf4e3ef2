use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use crate::error::{Result, VidioError};
use crate::sampler::MAX_SAMPLE_COUNT;

fn default_max_images() -> usize {
    10
}

fn default_aspect_ratio() -> String {
    "16:9".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub sampler: SamplerConfig,
    pub media: MediaConfig,
    pub analysis: AnalysisConfig,
    pub app: AppConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplerConfig {
    /// Number of evenly spaced frames taken from each video
    pub sample_count: usize,
    /// JPEG quality (1-100) applied to every sampled frame
    pub jpeg_quality: u8,
    /// Maximum time to wait for a single seek to produce a frame
    pub seek_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Path to ffmpeg binary
    pub ffmpeg_path: String,
    /// Path to ffprobe binary
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisConfig {
    /// Gemini API base URL
    pub endpoint: String,
    /// Model used to analyze sampled frames
    pub model: String,
    /// Model used to generate thumbnail backgrounds
    pub image_model: String,
    /// API key; falls back to GEMINI_API_KEY / API_KEY when unset
    #[serde(default)]
    pub api_key: Option<String>,
    /// Overall timeout for a single analysis or generation request
    pub request_timeout_secs: u64,
    /// Upper bound on images sent in one analysis request
    #[serde(default = "default_max_images")]
    pub max_images: usize,
    /// Aspect ratio requested for generated thumbnails
    #[serde(default = "default_aspect_ratio")]
    pub aspect_ratio: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Where the session state (user, language, history) is persisted
    pub state_path: PathBuf,
    /// Default output directory for generated thumbnails
    pub thumbnails_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sampler: SamplerConfig {
                sample_count: 10,
                jpeg_quality: 70,
                seek_timeout_secs: 10,
            },
            media: MediaConfig {
                ffmpeg_path: "ffmpeg".to_string(),
                ffprobe_path: "ffprobe".to_string(),
            },
            analysis: AnalysisConfig {
                endpoint: "https://generativelanguage.googleapis.com".to_string(),
                model: "gemini-3-flash-preview".to_string(),
                image_model: "gemini-2.5-flash-image".to_string(),
                api_key: None,
                request_timeout_secs: 120,
                max_images: default_max_images(),
                aspect_ratio: default_aspect_ratio(),
            },
            app: AppConfig {
                state_path: PathBuf::from(".vidio/state.json"),
                thumbnails_dir: PathBuf::from("thumbnails"),
            },
        }
    }
}

impl SamplerConfig {
    pub fn seek_timeout(&self) -> Duration {
        Duration::from_secs(self.seek_timeout_secs)
    }
}

impl AnalysisConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Resolve the API key from the config file or the environment
    pub fn resolve_api_key(&self) -> Result<String> {
        if let Some(key) = self.api_key.as_ref().filter(|k| !k.trim().is_empty()) {
            return Ok(key.clone());
        }

        ["GEMINI_API_KEY", "API_KEY"]
            .iter()
            .find_map(|var| std::env::var(var).ok().filter(|k| !k.trim().is_empty()))
            .ok_or_else(|| VidioError::Config(
                "No API key configured. Set analysis.api_key or GEMINI_API_KEY".to_string()
            ))
    }
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| VidioError::Config(format!("Failed to read config file: {}", e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| VidioError::Config(format!("Failed to parse config file: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| VidioError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content)
            .map_err(|e| VidioError::Config(format!("Failed to write config file: {}", e)))?;

        Ok(())
    }

    /// Check value ranges that serde cannot express
    pub fn validate(&self) -> Result<()> {
        if self.sampler.sample_count == 0 {
            return Err(VidioError::Config("sampler.sample_count must be at least 1".to_string()));
        }
        if self.sampler.sample_count > MAX_SAMPLE_COUNT {
            return Err(VidioError::Config(format!(
                "sampler.sample_count must be at most {}, got {}",
                MAX_SAMPLE_COUNT, self.sampler.sample_count
            )));
        }
        if !(1..=100).contains(&self.sampler.jpeg_quality) {
            return Err(VidioError::Config(format!(
                "sampler.jpeg_quality must be between 1 and 100, got {}",
                self.sampler.jpeg_quality
            )));
        }
        if self.analysis.max_images == 0 {
            return Err(VidioError::Config("analysis.max_images must be at least 1".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.sampler.sample_count, 10);
        assert_eq!(config.sampler.jpeg_quality, 70);
    }

    #[test]
    fn test_config_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = Config::default();
        config.sampler.sample_count = 4;
        config.save_to_file(&path).unwrap();

        let loaded = Config::from_file(&path).unwrap();
        assert_eq!(loaded.sampler.sample_count, 4);
        assert_eq!(loaded.analysis.aspect_ratio, "16:9");
    }

    #[test]
    fn test_invalid_quality_rejected() {
        let mut config = Config::default();
        config.sampler.jpeg_quality = 0;
        assert!(matches!(config.validate(), Err(VidioError::Config(_))));
    }

    #[test]
    fn test_sample_count_bounds_enforced() {
        let mut config = Config::default();
        config.sampler.sample_count = MAX_SAMPLE_COUNT;
        assert!(config.validate().is_ok());
        config.sampler.sample_count = MAX_SAMPLE_COUNT + 1;
        assert!(matches!(config.validate(), Err(VidioError::Config(_))));
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = Config::default();
        config.analysis.api_key = Some("from-file".to_string());
        assert_eq!(config.analysis.resolve_api_key().unwrap(), "from-file");
    }
}
