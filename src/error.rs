use thiserror::Error;

use crate::state::Language;

#[derive(Error, Debug)]
pub enum VidioError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Seek error at {timestamp:.3}s: {reason}")]
    Seek { timestamp: f64, reason: String },

    #[error("Analysis error: {0}")]
    Analysis(String),

    #[error("Image generation error: {0}")]
    Generation(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Operation timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Image encoding error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Media processing error: {0}")]
    Media(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl VidioError {
    /// Single human-readable message shown to the user when an operation fails.
    pub fn user_message(&self, language: Language) -> String {
        match (self, language) {
            (VidioError::InvalidArgument(reason), _) => reason.clone(),
            (VidioError::Cancelled, Language::En) => "Processing was cancelled.".to_string(),
            (VidioError::Cancelled, Language::Fr) => "Le traitement a été annulé.".to_string(),
            (VidioError::Decode(_), Language::En) => "Please select a valid video file.".to_string(),
            (VidioError::Decode(_), Language::Fr) => "Fichier vidéo invalide.".to_string(),
            (_, Language::En) => "Processing failed.".to_string(),
            (_, Language::Fr) => "Le traitement a échoué.".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, VidioError>;
