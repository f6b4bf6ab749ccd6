//! External OCR engines driven as subprocesses.

mod easyocr;
mod tesseract;

use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use captcha_resolver_core::{CaptchaImage, SolveError};

pub use easyocr::{EasyOcrEngine, EasyOcrSettings, EASYOCR_SETTINGS};
pub use tesseract::{TesseractEngine, PAGE_SEGMENTATION_MODES, TESSERACT_WHITELIST};

/// One labelled OCR run, text exactly as the engine printed it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawReading {
    pub label: String,
    pub text: String,
}

impl RawReading {
    pub fn new(label: impl Into<String>, text: impl Into<String>) -> Self {
        Self { label: label.into(), text: text.into() }
    }
}

/// A text recognizer over a single image.
///
/// `Unavailable` means the engine itself cannot run and the caller should
/// move on to the next engine.
#[async_trait]
pub trait OcrEngine: Send + Sync {
    fn name(&self) -> &str;

    async fn read(&self, image: &CaptchaImage, workdir: &Path) -> Result<Vec<RawReading>, SolveError>;
}

/// Write the image into `workdir` under `stem` with its natural extension.
pub(crate) async fn stage_image(image: &CaptchaImage, workdir: &Path, stem: &str) -> Result<std::path::PathBuf, SolveError> {
    let path = workdir.join(format!("{}.{}", stem, image.format().extension()));
    tokio::fs::write(&path, image.bytes()).await?;
    Ok(path)
}

/// Run a binary to completion and return its stdout.
pub(crate) async fn run_tool<I, S>(bin: &str, args: I) -> Result<String, SolveError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<OsStr>,
{
    let output = Command::new(bin)
        .args(args)
        .kill_on_drop(true)
        .output()
        .await
        .map_err(|e| match e.kind() {
            ErrorKind::NotFound => SolveError::Unavailable(format!("{} not installed", bin)),
            _ => SolveError::Transport(format!("failed to run {}: {}", bin, e)),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        debug!(bin, status = %output.status, "ocr tool exited with failure");
        return Err(SolveError::Transport(format!(
            "{} exited with {}: {}",
            bin,
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Whether `bin` can be spawned and exits cleanly with `probe_arg`.
pub async fn tool_installed(bin: &str, probe_arg: &str) -> bool {
    run_tool(bin, [probe_arg]).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_binary_is_unavailable() {
        let err = run_tool("definitely-not-an-ocr-binary-xyz", ["--version"]).await.unwrap_err();
        assert!(matches!(err, SolveError::Unavailable(_)));
        assert!(!tool_installed("definitely-not-an-ocr-binary-xyz", "--help").await);
    }

    #[tokio::test]
    async fn test_stage_image_uses_format_extension() {
        let dir = tempfile::tempdir().unwrap();
        let image = CaptchaImage::new(vec![0xFF, 0xD8, 0xFF, 0x00], captcha_resolver_core::ImageFormat::Jpeg).unwrap();
        let path = stage_image(&image, dir.path(), "input").await.unwrap();
        assert_eq!(path.file_name().unwrap(), "input.jpg");
        assert_eq!(std::fs::read(&path).unwrap(), image.bytes());
    }
}
