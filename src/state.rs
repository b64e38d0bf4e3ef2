//! Session state for the command line client.
//!
//! Everything the client remembers between runs lives in [`AppState`], which
//! is loaded once at startup, passed by reference to the commands that need
//! it and saved explicitly before exit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

use crate::analysis::AnalysisReport;
use crate::error::{Result, VidioError};

/// Number of uploads a creator aims for each day
pub const DAILY_UPLOAD_GOAL: u32 = 50;

const MAX_USERNAME_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
}

impl Language {
    /// Tag used in prompts and file names
    pub fn tag(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
        }
    }

    /// English name of the language, as used in model prompts
    pub fn display_name(&self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "French",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl FromStr for Language {
    type Err = VidioError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "en" | "english" => Ok(Language::En),
            "fr" | "french" | "français" | "francais" => Ok(Language::Fr),
            _ => Err(VidioError::InvalidArgument(format!(
                "Invalid language '{}'. Valid languages: en, fr",
                s
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    pub avatar: String,
    pub subscribers: u64,
    pub is_monetized: bool,
    pub earnings: f64,
    pub phone_or_email: Option<String>,
    pub videos_uploaded_today: u32,
}

impl User {
    /// Create a local profile from an email address or phone number
    pub fn register(identity: &str) -> Result<Self> {
        let identity = identity.trim();
        if identity.is_empty() {
            return Err(VidioError::InvalidArgument(
                "Please enter your email or phone.".to_string(),
            ));
        }

        let username: String = identity
            .split('@')
            .next()
            .unwrap_or_default()
            .chars()
            .take(MAX_USERNAME_LEN)
            .collect();
        let username = if username.is_empty() {
            format!("User_{}", Uuid::new_v4().as_u128() % 1000)
        } else {
            username
        };

        Ok(Self {
            id: short_id(),
            username,
            avatar: format!("https://api.dicebear.com/7.x/avataaars/svg?seed={}", identity),
            subscribers: 0,
            is_monetized: false,
            earnings: 0.0,
            phone_or_email: Some(identity.to_string()),
            videos_uploaded_today: 0,
        })
    }
}

/// Nine random base-36 characters
fn short_id() -> String {
    let mut n = Uuid::new_v4().as_u128();
    (0..9)
        .map(|_| {
            let digit = (n % 36) as u32;
            n /= 36;
            std::char::from_digit(digit, 36).unwrap_or('0')
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectHistory {
    pub id: Uuid,
    pub video_name: String,
    pub date: DateTime<Utc>,
    pub result: AnalysisReport,
    pub language: Language,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum AnalysisPhase {
    #[default]
    Idle,
    Uploading,
    Analyzing,
    Completed,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppState {
    #[serde(default)]
    pub language: Language,
    #[serde(default)]
    pub user: Option<User>,
    #[serde(default)]
    pub phase: AnalysisPhase,
    #[serde(default)]
    pub history: Vec<ProjectHistory>,
    #[serde(default)]
    pub last_error: Option<String>,
}

impl AppState {
    /// Load state from `path`; a missing file yields a fresh state
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            debug!("No state file at {}, starting fresh", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)?;
        let mut state: AppState = serde_json::from_str(&content)?;
        // An interrupted run must not leave the next one mid-analysis
        state.phase = AnalysisPhase::Idle;
        Ok(state)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        debug!("Saved state to {}", path.display());
        Ok(())
    }

    pub fn register(&mut self, identity: &str) -> Result<&User> {
        let user = User::register(identity)?;
        info!("Registered user {}", user.username);
        self.last_error = None;
        Ok(self.user.insert(user))
    }

    pub fn logout(&mut self) {
        self.user = None;
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = language;
    }

    pub fn begin_upload(&mut self) {
        self.phase = AnalysisPhase::Uploading;
        self.last_error = None;
    }

    pub fn begin_analysis(&mut self) {
        self.phase = AnalysisPhase::Analyzing;
    }

    /// Record a successful analysis and count it towards today's uploads
    pub fn complete_analysis(&mut self, video_name: &str, result: AnalysisReport) -> &ProjectHistory {
        if let Some(user) = self.user.as_mut() {
            user.videos_uploaded_today = user.videos_uploaded_today.saturating_add(1);
        }
        self.phase = AnalysisPhase::Completed;
        self.history.push(ProjectHistory {
            id: Uuid::new_v4(),
            video_name: video_name.to_string(),
            date: Utc::now(),
            result,
            language: self.language,
        });
        &self.history[self.history.len() - 1]
    }

    pub fn fail(&mut self, message: String) {
        self.phase = AnalysisPhase::Idle;
        self.last_error = Some(message);
    }

    pub fn latest_project(&self) -> Option<&ProjectHistory> {
        self.history.last()
    }

    pub fn remaining_uploads(&self) -> u32 {
        let uploaded = self.user.as_ref().map_or(0, |u| u.videos_uploaded_today);
        DAILY_UPLOAD_GOAL.saturating_sub(uploaded)
    }

    pub fn upload_progress_percent(&self) -> u32 {
        let uploaded = self.user.as_ref().map_or(0, |u| u.videos_uploaded_today);
        (uploaded.saturating_mul(100) / DAILY_UPLOAD_GOAL).min(100)
    }
}
