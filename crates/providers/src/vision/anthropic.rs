use serde::Deserialize;
use serde_json::json;

use captcha_resolver_core::config::VisionProviderConfig;
use captcha_resolver_core::SolveError;

use super::INSTRUCTION;

const API_VERSION: &str = "2023-06-01";

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    text: Option<String>,
}

pub(super) async fn complete(
    client: &reqwest::Client,
    config: &VisionProviderConfig,
    api_key: &str,
    encoded_image: &str,
    media_type: &str,
) -> Result<String, SolveError> {
    let payload = json!({
        "model": config.model,
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
        "messages": [{
            "role": "user",
            "content": [
                {
                    "type": "image",
                    "source": { "type": "base64", "media_type": media_type, "data": encoded_image }
                },
                { "type": "text", "text": INSTRUCTION }
            ]
        }]
    });

    let resp = client
        .post(crate::endpoint(&config.base_url, "v1/messages"))
        .header("x-api-key", api_key)
        .header("anthropic-version", API_VERSION)
        .json(&payload)
        .send()
        .await
        .map_err(crate::transport_error)?;

    if !resp.status().is_success() {
        return Err(crate::http_error("anthropic", resp).await);
    }

    let body: MessagesResponse = resp
        .json()
        .await
        .map_err(|e| SolveError::Transport(format!("anthropic: malformed response: {}", e)))?;

    body.content
        .into_iter()
        .find(|block| block.kind == "text")
        .and_then(|block| block.text)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| SolveError::Transport("anthropic: response had no text block".into()))
}
