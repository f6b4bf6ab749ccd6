use std::path::Path;

use async_trait::async_trait;
use tracing::{debug, warn};

use captcha_resolver_core::{CaptchaImage, SolveError};

use super::{run_tool, stage_image, OcrEngine, RawReading};

/// Reader parameters for one EasyOCR pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EasyOcrSettings {
    pub width_ths: Option<f32>,
    pub height_ths: Option<f32>,
    pub paragraph: Option<bool>,
}

pub const EASYOCR_SETTINGS: [EasyOcrSettings; 5] = [
    EasyOcrSettings { width_ths: Some(0.7), height_ths: Some(0.7), paragraph: None },
    EasyOcrSettings { width_ths: Some(0.5), height_ths: Some(0.5), paragraph: None },
    EasyOcrSettings { width_ths: Some(0.9), height_ths: Some(0.9), paragraph: None },
    EasyOcrSettings { width_ths: None, height_ths: None, paragraph: Some(false) },
    EasyOcrSettings { width_ths: None, height_ths: None, paragraph: Some(true) },
];

pub struct EasyOcrEngine {
    bin: String,
    settings: Vec<EasyOcrSettings>,
}

impl EasyOcrEngine {
    pub fn new(bin: impl Into<String>) -> Self {
        Self { bin: bin.into(), settings: EASYOCR_SETTINGS.to_vec() }
    }

    pub fn args(&self, image_path: &Path, settings: &EasyOcrSettings) -> Vec<String> {
        let mut args = vec![
            "-l".to_string(),
            "en".to_string(),
            "-f".to_string(),
            image_path.display().to_string(),
            "--detail".to_string(),
            "0".to_string(),
            // The CLI parses booleans with `type=bool`, so only an empty
            // value reads as false.
            "--gpu".to_string(),
            String::new(),
        ];
        if let Some(w) = settings.width_ths {
            args.push("--width_ths".to_string());
            args.push(w.to_string());
        }
        if let Some(h) = settings.height_ths {
            args.push("--height_ths".to_string());
            args.push(h.to_string());
        }
        // Paragraph mode is off unless the flag is given.
        if settings.paragraph == Some(true) {
            args.push("--paragraph".to_string());
            args.push("True".to_string());
        }
        args
    }
}

#[async_trait]
impl OcrEngine for EasyOcrEngine {
    fn name(&self) -> &str {
        "easyocr"
    }

    async fn read(&self, image: &CaptchaImage, workdir: &Path) -> Result<Vec<RawReading>, SolveError> {
        let path = stage_image(image, workdir, "easyocr-input").await?;
        let mut readings = Vec::new();

        for (i, settings) in self.settings.iter().enumerate() {
            let label = format!("EasyOCR-{}", i + 1);
            match run_tool(&self.bin, self.args(&path, settings)).await {
                // Each detected fragment is printed on its own line.
                Ok(stdout) => {
                    let text: String = stdout.lines().map(str::trim).collect();
                    debug!(label = %label, text = %text, "easyocr reading");
                    readings.push(RawReading::new(label, text));
                }
                Err(e @ SolveError::Unavailable(_)) => return Err(e),
                Err(e) => warn!(label = %label, error = %e, "easyocr pass failed"),
            }
        }

        Ok(readings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_for_threshold_config() {
        let engine = EasyOcrEngine::new("easyocr");
        let args = engine.args(Path::new("/tmp/x.png"), &EASYOCR_SETTINGS[1]);
        assert_eq!(
            args,
            ["-l", "en", "-f", "/tmp/x.png", "--detail", "0", "--gpu", "", "--width_ths", "0.5", "--height_ths", "0.5"]
        );
    }

    #[test]
    fn test_args_toggle_paragraph_mode() {
        let engine = EasyOcrEngine::new("easyocr");

        let off = engine.args(Path::new("in.png"), &EASYOCR_SETTINGS[3]);
        assert_eq!(off.len(), 8);
        assert!(!off.iter().any(|a| a == "--paragraph"));
        assert!(!off.iter().any(|a| a == "True"));

        let on = engine.args(Path::new("in.png"), &EASYOCR_SETTINGS[4]);
        assert_eq!(&on[8..], ["--paragraph", "True"]);
        assert_ne!(off, on);
    }

    #[test]
    fn test_gpu_disabled_with_empty_value() {
        let engine = EasyOcrEngine::new("easyocr");
        for settings in &EASYOCR_SETTINGS {
            let args = engine.args(Path::new("in.png"), settings);
            let gpu = args.iter().position(|a| a == "--gpu").unwrap();
            assert_eq!(args[gpu + 1], "");
            assert!(!args.iter().any(|a| a == "False"));
        }
    }

    #[tokio::test]
    async fn test_missing_binary_aborts_engine() {
        let dir = tempfile::tempdir().unwrap();
        let engine = EasyOcrEngine::new("no-such-easyocr-binary");
        let image = CaptchaImage::from_bytes(vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A]).unwrap();
        let err = engine.read(&image, dir.path()).await.unwrap_err();
        assert!(matches!(err, SolveError::Unavailable(_)));
    }
}
