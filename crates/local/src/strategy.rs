use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use captcha_resolver_core::config::LocalConfig;
use captcha_resolver_core::text::normalize_code;
use captcha_resolver_core::{CaptchaImage, SolveError, SolverStrategy, StrategyId};
use captcha_resolver_correction::CorrectionEngine;

use crate::engines::{EasyOcrEngine, OcrEngine, TesseractEngine};
use crate::preprocess::clean_for_ocr;

/// A reading that passed the length filter, before and after correction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalCandidate {
    pub label: String,
    pub raw: String,
    pub corrected: String,
}

/// Offline OCR over every configured engine, with correction and
/// length-based selection.
pub struct LocalRecognitionStrategy {
    engines: Vec<Arc<dyn OcrEngine>>,
    corrector: CorrectionEngine,
    preprocess: bool,
    min_len: usize,
    preferred_lengths: Vec<usize>,
}

impl LocalRecognitionStrategy {
    pub fn new(engines: Vec<Arc<dyn OcrEngine>>, corrector: CorrectionEngine) -> Self {
        let defaults = LocalConfig::default();
        Self {
            engines,
            corrector,
            preprocess: defaults.preprocess,
            min_len: defaults.min_candidate_len,
            preferred_lengths: defaults.preferred_lengths,
        }
    }

    /// EasyOCR then Tesseract, both driven through their CLIs.
    pub fn from_config(config: &LocalConfig) -> Self {
        let engines: Vec<Arc<dyn OcrEngine>> = vec![
            Arc::new(EasyOcrEngine::new(config.easyocr_bin.clone())),
            Arc::new(TesseractEngine::new(config.tesseract_bin.clone())),
        ];
        Self {
            engines,
            corrector: CorrectionEngine::default(),
            preprocess: config.preprocess,
            min_len: config.min_candidate_len,
            preferred_lengths: config.preferred_lengths.clone(),
        }
    }

    pub fn with_preprocessing(mut self, enabled: bool) -> Self {
        self.preprocess = enabled;
        self
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    pub fn with_preferred_lengths(mut self, lengths: Vec<usize>) -> Self {
        self.preferred_lengths = lengths;
        self
    }

    /// Run every engine and return the accepted, corrected readings in
    /// generation order.
    pub async fn candidates(&self, image: &CaptchaImage) -> Result<Vec<LocalCandidate>, SolveError> {
        let workdir = tempfile::Builder::new().prefix("captcha-ocr-").tempdir()?;

        let working = if self.preprocess {
            let source = image.clone();
            match tokio::task::spawn_blocking(move || clean_for_ocr(&source)).await {
                Ok(cleaned) => cleaned,
                Err(e) => {
                    warn!(error = %e, "preprocessing panicked, using original image");
                    image.clone()
                }
            }
        } else {
            image.clone()
        };

        let mut accepted = Vec::new();
        for engine in &self.engines {
            let readings = match engine.read(&working, workdir.path()).await {
                Ok(readings) => readings,
                Err(SolveError::Unavailable(reason)) => {
                    info!(engine = engine.name(), reason = %reason, "ocr engine unavailable");
                    continue;
                }
                Err(e) => {
                    warn!(engine = engine.name(), error = %e, "ocr engine failed");
                    continue;
                }
            };

            for reading in readings {
                let raw = normalize_code(&reading.text);
                if raw.chars().count() < self.min_len {
                    continue;
                }
                let corrected = match normalize_code(&self.corrector.correct(&raw)) {
                    c if c.is_empty() => raw.clone(),
                    c => c,
                };
                debug!(label = %reading.label, raw = %raw, corrected = %corrected, "candidate accepted");
                accepted.push(LocalCandidate { label: reading.label, raw, corrected });
            }
        }

        Ok(accepted)
    }
}

/// First candidate with a preferred length, else the first candidate.
pub fn select_best<'a>(candidates: &'a [LocalCandidate], preferred_lengths: &[usize]) -> Option<&'a LocalCandidate> {
    candidates
        .iter()
        .find(|c| preferred_lengths.contains(&c.corrected.chars().count()))
        .or_else(|| candidates.first())
}

#[async_trait]
impl SolverStrategy for LocalRecognitionStrategy {
    fn id(&self) -> StrategyId {
        StrategyId::LocalOcr
    }

    fn check_available(&self) -> Result<(), SolveError> {
        Ok(())
    }

    async fn solve(&self, image: &CaptchaImage) -> Result<String, SolveError> {
        let candidates = self.candidates(image).await?;
        let best = select_best(&candidates, &self.preferred_lengths).ok_or(SolveError::NoAcceptableCandidate)?;
        info!(
            label = %best.label,
            code = %best.corrected,
            candidates = candidates.len(),
            "local recognition selected candidate"
        );
        Ok(best.corrected.clone())
    }
}
