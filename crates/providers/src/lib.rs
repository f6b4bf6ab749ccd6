pub mod remote;
pub mod vision;

pub use self::remote::{RemoteService, RemoteSolvingServiceStrategy};
pub use self::vision::{VisionModelStrategy, VisionProvider};

use std::time::Duration;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

use captcha_resolver_core::{CaptchaImage, SolveError};

pub(crate) fn build_client(request_timeout_seconds: u64) -> Result<reqwest::Client, SolveError> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(request_timeout_seconds))
        .build()
        .map_err(|e| SolveError::Transport(format!("http client: {}", e)))
}

pub(crate) fn encode_image(image: &CaptchaImage) -> String {
    BASE64.encode(image.bytes())
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

pub(crate) fn transport_error(e: reqwest::Error) -> SolveError {
    if e.is_timeout() {
        SolveError::Timeout(e.to_string())
    } else {
        SolveError::Transport(e.to_string())
    }
}

/// Turn a non-2xx response into an error carrying a short body excerpt.
pub(crate) async fn http_error(provider: &str, resp: reqwest::Response) -> SolveError {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();
    let excerpt: String = body.chars().take(200).collect();
    SolveError::Transport(format!("{} HTTP {}: {}", provider, status.as_u16(), excerpt))
}
