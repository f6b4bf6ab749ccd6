use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "captcha-resolver", about = "Multi-strategy CAPTCHA resolver for the foreclosure scraper")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Resolve a single CAPTCHA image
    Solve {
        /// Image file (defaults to captcha_image.png, captcha.png or captcha.jpg in the working directory)
        image: Option<PathBuf>,

        /// Download the image from this URL instead
        #[arg(long, conflicts_with = "image")]
        url: Option<String>,

        /// Base URL for resolving a relative --url
        #[arg(long, requires = "url")]
        base: Option<String>,

        /// Strategies to try, in order (comma-separated)
        #[arg(short, long)]
        methods: Option<String>,

        /// Print the resolution or failure trace as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show which strategies and OCR tools are usable
    Check,
    /// Run the correction engine on a raw OCR reading
    Correct {
        text: String,

        /// Number of ranked candidates to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },
}
