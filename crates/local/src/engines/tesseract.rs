use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use captcha_resolver_core::{CaptchaImage, SolveError};

use super::{run_tool, stage_image, OcrEngine, RawReading};
use crate::preprocess::{render_variants, Variant};

/// Single line, single word, single char, raw line.
pub const PAGE_SEGMENTATION_MODES: [u8; 4] = [7, 8, 10, 13];

pub const TESSERACT_WHITELIST: &str =
    "abcdefghijklmnopqrstuvwxyzABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

pub struct TesseractEngine {
    bin: String,
}

impl TesseractEngine {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into() }
    }

    pub fn args(&self, image_path: &Path, psm: u8) -> Vec<String> {
        vec![
            image_path.display().to_string(),
            "stdout".to_string(),
            "--psm".to_string(),
            psm.to_string(),
            "-c".to_string(),
            format!("tessedit_char_whitelist={}", TESSERACT_WHITELIST),
        ]
    }

    pub fn label(variant: Variant, psm: u8) -> String {
        format!("Tesseract-{}-PSM{}", variant.label(), psm)
    }
}

#[async_trait]
impl OcrEngine for TesseractEngine {
    fn name(&self) -> &str {
        "tesseract"
    }

    async fn read(&self, image: &CaptchaImage, workdir: &Path) -> Result<Vec<RawReading>, SolveError> {
        let source = image.clone();
        let variants = tokio::task::spawn_blocking(move || render_variants(&source))
            .await
            .map_err(|e| SolveError::Transport(format!("variant rendering panicked: {}", e)))?;

        let mut readings = Vec::new();
        for (variant, rendered) in variants {
            let path = stage_image(&rendered, workdir, &format!("tesseract-{}", variant.label())).await?;
            for psm in PAGE_SEGMENTATION_MODES {
                let label = Self::label(variant, psm);
                match run_tool(&self.bin, self.args(&path, psm)).await {
                    Ok(stdout) => {
                        let text = stdout.trim().to_string();
                        debug!(label = %label, text = %text, "tesseract reading");
                        readings.push(RawReading::new(label, text));
                    }
                    Err(e @ SolveError::Unavailable(_)) => return Err(e),
                    Err(e) => warn!(label = %label, error = %e, "tesseract pass failed"),
                }
            }
        }

        Ok(readings)
    }
}
