//! Vidio - Frame Sampling and Video Analysis
//!
//! Samples evenly spaced frames from a video with ffmpeg and sends them to
//! Gemini to produce titles, descriptions, tags and thumbnail backgrounds.

pub mod cli;
pub mod config;
pub mod error;
pub mod progress;
pub mod media;
pub mod sampler;
pub mod analysis;
pub mod state;
pub mod workflow;
