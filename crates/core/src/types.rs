use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SolveError;

/// Every way of solving a CAPTCHA implements this
#[async_trait]
pub trait SolverStrategy: Send + Sync + 'static {
    fn id(&self) -> StrategyId;

    /// Precondition check (credential present, etc). Must be cheap and
    /// must not touch the network.
    fn check_available(&self) -> Result<(), SolveError>;

    fn is_available(&self) -> bool {
        self.check_available().is_ok()
    }

    /// Raw best guess. The resolver normalizes it before acceptance.
    async fn solve(&self, image: &CaptchaImage) -> Result<String, SolveError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StrategyId {
    #[serde(rename = "vision_llm_gpt")]
    VisionOpenAi,
    #[serde(rename = "vision_llm_claude")]
    VisionAnthropic,
    #[serde(rename = "capsolver")]
    CapSolver,
    #[serde(rename = "2captcha")]
    TwoCaptcha,
    #[serde(rename = "local_ocr")]
    LocalOcr,
}

impl StrategyId {
    /// Most accurate first, metered services before free local work.
    pub const DEFAULT_ORDER: [StrategyId; 5] = [
        StrategyId::VisionOpenAi,
        StrategyId::VisionAnthropic,
        StrategyId::CapSolver,
        StrategyId::TwoCaptcha,
        StrategyId::LocalOcr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            StrategyId::VisionOpenAi => "vision_llm_gpt",
            StrategyId::VisionAnthropic => "vision_llm_claude",
            StrategyId::CapSolver => "capsolver",
            StrategyId::TwoCaptcha => "2captcha",
            StrategyId::LocalOcr => "local_ocr",
        }
    }

    pub fn is_metered(&self) -> bool {
        !matches!(self, StrategyId::LocalOcr)
    }

    /// Parse a comma-separated list, e.g. from `--methods` or `CAPTCHA_ORDER`.
    pub fn parse_list(list: &str) -> Result<Vec<StrategyId>, String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(StrategyId::from_str)
            .collect()
    }
}

impl fmt::Display for StrategyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "vision_llm_gpt" | "openai" | "gpt" => Ok(StrategyId::VisionOpenAi),
            "vision_llm_claude" | "anthropic" | "claude" => Ok(StrategyId::VisionAnthropic),
            "capsolver" => Ok(StrategyId::CapSolver),
            "2captcha" | "twocaptcha" => Ok(StrategyId::TwoCaptcha),
            "local_ocr" | "local" | "ocr" => Ok(StrategyId::LocalOcr),
            other => Err(format!("unknown strategy: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    Png,
    Jpeg,
}

impl ImageFormat {
    pub fn media_type(&self) -> &'static str {
        match self {
            ImageFormat::Png => "image/png",
            ImageFormat::Jpeg => "image/jpeg",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ImageFormat::Png => "png",
            ImageFormat::Jpeg => "jpg",
        }
    }

    /// Identify by magic bytes.
    pub fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(&[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]) {
            Some(ImageFormat::Png)
        } else if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
            Some(ImageFormat::Jpeg)
        } else {
            None
        }
    }

    fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_lowercase().as_str() {
            "png" => Some(ImageFormat::Png),
            "jpg" | "jpeg" => Some(ImageFormat::Jpeg),
            _ => None,
        }
    }
}

/// A CAPTCHA image. Immutable once loaded; cloning shares the buffer.
#[derive(Debug, Clone)]
pub struct CaptchaImage {
    bytes: Arc<[u8]>,
    format: ImageFormat,
}

impl CaptchaImage {
    pub fn new(bytes: Vec<u8>, format: ImageFormat) -> Result<Self, SolveError> {
        if bytes.is_empty() {
            return Err(SolveError::InvalidImage("empty image".into()));
        }
        Ok(Self {
            bytes: bytes.into(),
            format,
        })
    }

    /// Load from a buffer, detecting PNG/JPEG from the content.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, SolveError> {
        let format = ImageFormat::sniff(&bytes)
            .ok_or_else(|| SolveError::InvalidImage("not a PNG or JPEG image".into()))?;
        Self::new(bytes, format)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, SolveError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| {
            SolveError::InvalidImage(format!("cannot read {}: {}", path.display(), e))
        })?;
        let format = ImageFormat::sniff(&bytes)
            .or_else(|| ImageFormat::from_extension(path))
            .ok_or_else(|| {
                SolveError::InvalidImage(format!("{} is not a PNG or JPEG image", path.display()))
            })?;
        Self::new(bytes, format)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn format(&self) -> ImageFormat {
        self.format
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    Success,
    Skipped,
    Failed,
    TimedOut,
}

/// One record per strategy tried, in order. Never mutated after creation.
#[derive(Debug, Clone, Serialize)]
pub struct SolveAttempt {
    pub strategy: StrategyId,
    pub status: AttemptStatus,
    pub result_text: Option<String>,
    pub started_at: DateTime<Utc>,
    pub elapsed_ms: u64,
    pub diagnostic: String,
}

impl SolveAttempt {
    pub fn skipped(strategy: StrategyId, reason: impl Into<String>) -> Self {
        Self {
            strategy,
            status: AttemptStatus::Skipped,
            result_text: None,
            started_at: Utc::now(),
            elapsed_ms: 0,
            diagnostic: reason.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == AttemptStatus::Success
    }
}

/// The accepted answer. `text` is never empty and purely alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedCode {
    text: String,
    pub source: StrategyId,
}

impl ResolvedCode {
    /// Normalizes `raw`; `None` when nothing alphanumeric remains.
    pub fn accept(raw: &str, source: StrategyId) -> Option<Self> {
        crate::text::accept_code(raw).map(|text| Self { text, source })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for ResolvedCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Successful resolution plus the trace that led to it.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub code: ResolvedCode,
    pub attempts: Vec<SolveAttempt>,
}
