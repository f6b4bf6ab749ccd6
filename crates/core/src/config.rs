use serde::{Deserialize, Deserializer};

use crate::credential::Credential;
use crate::types::StrategyId;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub resolver: ResolverConfig,
    #[serde(default)]
    pub vision: VisionConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub local: LocalConfig,
    #[serde(default)]
    pub workflow: WorkflowConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ResolverConfig {
    #[serde(default = "default_order")]
    pub order: Vec<StrategyId>,
    #[serde(default = "default_strategy_timeout")]
    pub strategy_timeout_seconds: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            order: default_order(),
            strategy_timeout_seconds: default_strategy_timeout(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct VisionConfig {
    #[serde(default = "default_openai", deserialize_with = "openai_section")]
    pub openai: VisionProviderConfig,
    #[serde(default = "default_anthropic", deserialize_with = "anthropic_section")]
    pub anthropic: VisionProviderConfig,
}

impl Default for VisionConfig {
    fn default() -> Self {
        Self {
            openai: default_openai(),
            anthropic: default_anthropic(),
        }
    }
}

/// Settings for one vision model. Keys missing from a TOML section fall back
/// to that provider's own defaults.
#[derive(Debug, Clone)]
pub struct VisionProviderConfig {
    pub api_key_env: String,
    pub model: String,
    pub base_url: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub request_timeout_seconds: u64,
}

#[derive(Deserialize)]
struct VisionProviderSection {
    api_key_env: Option<String>,
    model: Option<String>,
    base_url: Option<String>,
    max_tokens: Option<u32>,
    temperature: Option<f32>,
    request_timeout_seconds: Option<u64>,
}

impl VisionProviderSection {
    fn over(self, base: VisionProviderConfig) -> VisionProviderConfig {
        VisionProviderConfig {
            api_key_env: self.api_key_env.unwrap_or(base.api_key_env),
            model: self.model.unwrap_or(base.model),
            base_url: self.base_url.unwrap_or(base.base_url),
            max_tokens: self.max_tokens.unwrap_or(base.max_tokens),
            temperature: self.temperature.unwrap_or(base.temperature),
            request_timeout_seconds: self.request_timeout_seconds.unwrap_or(base.request_timeout_seconds),
        }
    }
}

fn openai_section<'de, D: Deserializer<'de>>(d: D) -> Result<VisionProviderConfig, D::Error> {
    Ok(VisionProviderSection::deserialize(d)?.over(default_openai()))
}

fn anthropic_section<'de, D: Deserializer<'de>>(d: D) -> Result<VisionProviderConfig, D::Error> {
    Ok(VisionProviderSection::deserialize(d)?.over(default_anthropic()))
}

impl VisionProviderConfig {
    pub fn credential(&self) -> Credential {
        Credential::env(&self.api_key_env)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RemoteConfig {
    #[serde(default = "default_capsolver", deserialize_with = "capsolver_section")]
    pub capsolver: RemoteServiceConfig,
    #[serde(default = "default_twocaptcha", deserialize_with = "twocaptcha_section")]
    pub twocaptcha: RemoteServiceConfig,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            capsolver: default_capsolver(),
            twocaptcha: default_twocaptcha(),
        }
    }
}

/// Settings for one solving service, merged over that service's defaults
/// like [`VisionProviderConfig`].
#[derive(Debug, Clone)]
pub struct RemoteServiceConfig {
    pub api_key_env: String,
    pub base_url: String,
    pub poll_interval_ms: u64,
    pub max_polls: u32,
    pub request_timeout_seconds: u64,
}

#[derive(Deserialize)]
struct RemoteServiceSection {
    api_key_env: Option<String>,
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    max_polls: Option<u32>,
    request_timeout_seconds: Option<u64>,
}

impl RemoteServiceSection {
    fn over(self, base: RemoteServiceConfig) -> RemoteServiceConfig {
        RemoteServiceConfig {
            api_key_env: self.api_key_env.unwrap_or(base.api_key_env),
            base_url: self.base_url.unwrap_or(base.base_url),
            poll_interval_ms: self.poll_interval_ms.unwrap_or(base.poll_interval_ms),
            max_polls: self.max_polls.unwrap_or(base.max_polls),
            request_timeout_seconds: self.request_timeout_seconds.unwrap_or(base.request_timeout_seconds),
        }
    }
}

fn capsolver_section<'de, D: Deserializer<'de>>(d: D) -> Result<RemoteServiceConfig, D::Error> {
    Ok(RemoteServiceSection::deserialize(d)?.over(default_capsolver()))
}

fn twocaptcha_section<'de, D: Deserializer<'de>>(d: D) -> Result<RemoteServiceConfig, D::Error> {
    Ok(RemoteServiceSection::deserialize(d)?.over(default_twocaptcha()))
}

impl RemoteServiceConfig {
    pub fn credential(&self) -> Credential {
        Credential::env(&self.api_key_env)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LocalConfig {
    #[serde(default = "default_true")]
    pub preprocess: bool,
    #[serde(default = "default_min_candidate_len")]
    pub min_candidate_len: usize,
    /// Code lengths the site is known to use; preferred during selection.
    #[serde(default = "default_preferred_lengths")]
    pub preferred_lengths: Vec<usize>,
    #[serde(default = "default_easyocr_bin")]
    pub easyocr_bin: String,
    #[serde(default = "default_tesseract_bin")]
    pub tesseract_bin: String,
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            preprocess: true,
            min_candidate_len: default_min_candidate_len(),
            preferred_lengths: default_preferred_lengths(),
            easyocr_bin: default_easyocr_bin(),
            tesseract_bin: default_tesseract_bin(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct WorkflowConfig {
    /// Run the scraper's deterministic rn/cl/ml/ij fix-ups on the final code.
    #[serde(default = "default_true")]
    pub apply_pattern_fixes: bool,
    #[serde(default = "default_request_timeout")]
    pub download_timeout_seconds: u64,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            apply_pattern_fixes: true,
            download_timeout_seconds: default_request_timeout(),
        }
    }
}

fn default_order() -> Vec<StrategyId> { StrategyId::DEFAULT_ORDER.to_vec() }
fn default_strategy_timeout() -> u64 { 120 }
fn default_max_tokens() -> u32 { 50 }
fn default_temperature() -> f32 { 0.1 }
fn default_request_timeout() -> u64 { 30 }
fn default_max_polls() -> u32 { 30 }
fn default_true() -> bool { true }
fn default_min_candidate_len() -> usize { 3 }
fn default_preferred_lengths() -> Vec<usize> { vec![4, 5, 6] }
fn default_easyocr_bin() -> String { "easyocr".to_string() }
fn default_tesseract_bin() -> String { "tesseract".to_string() }

fn default_openai() -> VisionProviderConfig {
    VisionProviderConfig {
        api_key_env: "OPENAI_API_KEY".to_string(),
        model: "gpt-4o".to_string(),
        base_url: "https://api.openai.com".to_string(),
        max_tokens: default_max_tokens(),
        temperature: default_temperature(),
        request_timeout_seconds: default_request_timeout(),
    }
}

fn default_anthropic() -> VisionProviderConfig {
    VisionProviderConfig {
        api_key_env: "ANTHROPIC_API_KEY".to_string(),
        model: "claude-3-5-sonnet-20241022".to_string(),
        base_url: "https://api.anthropic.com".to_string(),
        max_tokens: default_max_tokens(),
        temperature: default_temperature(),
        request_timeout_seconds: default_request_timeout(),
    }
}

fn default_capsolver() -> RemoteServiceConfig {
    RemoteServiceConfig {
        api_key_env: "CAPSOLVER_API_KEY".to_string(),
        base_url: "https://api.capsolver.com".to_string(),
        poll_interval_ms: 2_000,
        max_polls: default_max_polls(),
        request_timeout_seconds: default_request_timeout(),
    }
}

fn default_twocaptcha() -> RemoteServiceConfig {
    RemoteServiceConfig {
        api_key_env: "TWOCAPTCHA_API_KEY".to_string(),
        base_url: "http://2captcha.com".to_string(),
        poll_interval_ms: 3_000,
        max_polls: default_max_polls(),
        request_timeout_seconds: default_request_timeout(),
    }
}
