//! Remote multimodal models asked to read the code directly.

mod anthropic;
mod openai;

use std::time::Instant;

use async_trait::async_trait;
use tracing::{debug, info};

use captcha_resolver_core::config::VisionProviderConfig;
use captcha_resolver_core::text::normalize_code;
use captcha_resolver_core::{CaptchaImage, Credential, SolveError, SolverStrategy, StrategyId};

pub(crate) const INSTRUCTION: &str = "Extract ONLY the alphanumeric characters from this CAPTCHA image. \
Return ONLY the code with no explanation, no spaces, no punctuation. Just the characters you see.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisionProvider {
    OpenAi,
    Anthropic,
}

impl VisionProvider {
    fn name(&self) -> &'static str {
        match self {
            VisionProvider::OpenAi => "openai",
            VisionProvider::Anthropic => "anthropic",
        }
    }
}

pub struct VisionModelStrategy {
    provider: VisionProvider,
    config: VisionProviderConfig,
    credential: Credential,
    client: reqwest::Client,
}

impl VisionModelStrategy {
    pub fn new(provider: VisionProvider, config: VisionProviderConfig) -> Result<Self, SolveError> {
        let client = crate::build_client(config.request_timeout_seconds)?;
        Ok(Self {
            provider,
            credential: config.credential(),
            config,
            client,
        })
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }
}

#[async_trait]
impl SolverStrategy for VisionModelStrategy {
    fn id(&self) -> StrategyId {
        match self.provider {
            VisionProvider::OpenAi => StrategyId::VisionOpenAi,
            VisionProvider::Anthropic => StrategyId::VisionAnthropic,
        }
    }

    fn check_available(&self) -> Result<(), SolveError> {
        if self.credential.is_present() {
            Ok(())
        } else {
            Err(SolveError::Unavailable(format!("{} not set", self.credential.describe())))
        }
    }

    async fn solve(&self, image: &CaptchaImage) -> Result<String, SolveError> {
        let api_key = self
            .credential
            .resolve()
            .ok_or_else(|| SolveError::Unavailable(format!("{} not set", self.credential.describe())))?;

        let start = Instant::now();
        info!(provider = self.provider.name(), model = %self.config.model, "asking vision model");

        let encoded = crate::encode_image(image);
        let media_type = image.format().media_type();
        let raw = match self.provider {
            VisionProvider::OpenAi => {
                openai::complete(&self.client, &self.config, &api_key, &encoded, media_type).await?
            }
            VisionProvider::Anthropic => {
                anthropic::complete(&self.client, &self.config, &api_key, &encoded, media_type).await?
            }
        };

        let code = normalize_code(&raw);
        debug!(
            provider = self.provider.name(),
            raw = %raw,
            code = %code,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "vision model replied"
        );
        Ok(code)
    }
}
