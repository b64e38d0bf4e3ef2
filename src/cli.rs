use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract evenly spaced frames from a video as JPEG files
    Sample {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Directory the frames are written to
        #[arg(short, long)]
        output_dir: PathBuf,

        /// Number of frames (defaults to sampler.sample_count)
        #[arg(short = 'n', long)]
        count: Option<usize>,
    },

    /// Sample a video and generate titles, description, tags and thumbnail prompts
    Analyze {
        /// Input video file
        #[arg(short, long)]
        input: PathBuf,

        /// Output language (en, fr); also becomes the saved default
        #[arg(short, long)]
        language: Option<String>,

        /// Print the raw report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Generate thumbnail backgrounds from the latest analysis or a custom prompt
    Thumbnail {
        /// Thumbnail prompt numbers from the latest analysis (1-based)
        #[arg(short, long, value_delimiter = ',')]
        prompts: Vec<usize>,

        /// Use this prompt instead of the latest analysis
        #[arg(long, conflicts_with = "prompts")]
        custom: Option<String>,

        /// Output directory (defaults to app.thumbnails_dir)
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
    },

    /// Create a local profile from an email or phone number
    Login {
        /// Email address or phone number
        identity: String,
    },

    /// Forget the local profile
    Logout,

    /// Show or change the output language
    Language {
        /// New language (en, fr)
        language: Option<String>,
    },

    /// List previous analyses
    History {
        /// Show at most this many entries
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show profile and daily upload progress
    Status,

    /// Check that ffmpeg, ffprobe and the API key are available
    Check,
}
