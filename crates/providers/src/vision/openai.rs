use serde::Deserialize;
use serde_json::json;

use captcha_resolver_core::config::VisionProviderConfig;
use captcha_resolver_core::SolveError;

use super::INSTRUCTION;

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
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
        "messages": [{
            "role": "user",
            "content": [
                { "type": "text", "text": INSTRUCTION },
                {
                    "type": "image_url",
                    "image_url": { "url": format!("data:{};base64,{}", media_type, encoded_image) }
                }
            ]
        }],
        "max_tokens": config.max_tokens,
        "temperature": config.temperature,
    });

    let resp = client
        .post(crate::endpoint(&config.base_url, "v1/chat/completions"))
        .bearer_auth(api_key)
        .json(&payload)
        .send()
        .await
        .map_err(crate::transport_error)?;

    if !resp.status().is_success() {
        return Err(crate::http_error("openai", resp).await);
    }

    let body: ChatResponse = resp
        .json()
        .await
        .map_err(|e| SolveError::Transport(format!("openai: malformed response: {}", e)))?;

    body.choices
        .into_iter()
        .next()
        .and_then(|c| c.message.content)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| SolveError::Transport("openai: response had no content".into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::{VisionModelStrategy, VisionProvider};
    use captcha_resolver_core::{CaptchaImage, Credential, ImageFormat, SolverStrategy, StrategyId};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String) -> VisionProviderConfig {
        VisionProviderConfig {
            api_key_env: "UNUSED".to_string(),
            model: "gpt-4o".to_string(),
            base_url,
            max_tokens: 50,
            temperature: 0.1,
            request_timeout_seconds: 5,
        }
    }

    fn image() -> CaptchaImage {
        CaptchaImage::new(vec![1, 2, 3, 4], ImageFormat::Png).unwrap()
    }

    #[tokio::test]
    async fn test_openai_reply_is_normalized() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_partial_json(json!({ "model": "gpt-4o", "max_tokens": 50 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "choices": [{ "message": { "role": "assistant", "content": " X7k-9Q. \n" } }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let strategy = VisionModelStrategy::new(VisionProvider::OpenAi, config(server.uri()))
            .unwrap()
            .with_credential(Credential::Static("sk-test".into()));

        assert_eq!(strategy.id(), StrategyId::VisionOpenAi);
        assert_eq!(strategy.solve(&image()).await.unwrap(), "X7k9Q");
    }

    #[tokio::test]
    async fn test_openai_server_error_is_transport_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
            .mount(&server)
            .await;

        let strategy = VisionModelStrategy::new(VisionProvider::OpenAi, config(server.uri()))
            .unwrap()
            .with_credential(Credential::Static("sk-test".into()));

        let err = strategy.solve(&image()).await.unwrap_err();
        match err {
            SolveError::Transport(msg) => assert!(msg.contains("500")),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_openai_without_key_is_unavailable() {
        let strategy = VisionModelStrategy::new(VisionProvider::OpenAi, config("http://127.0.0.1:1".into()))
            .unwrap()
            .with_credential(Credential::None);

        assert!(!strategy.is_available());
        assert!(matches!(
            strategy.solve(&image()).await,
            Err(SolveError::Unavailable(_))
        ));
    }
}
