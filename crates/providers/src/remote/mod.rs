//! Paid human/ML solving services with a submit-then-poll protocol.

mod capsolver;
mod poll;
mod twocaptcha;

pub use self::poll::{poll_until_ready, PollOutcome, PollSchedule};

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use captcha_resolver_core::config::RemoteServiceConfig;
use captcha_resolver_core::{CaptchaImage, Credential, SolveError, SolverStrategy, StrategyId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteService {
    CapSolver,
    TwoCaptcha,
}

impl RemoteService {
    fn name(&self) -> &'static str {
        match self {
            RemoteService::CapSolver => "capsolver",
            RemoteService::TwoCaptcha => "2captcha",
        }
    }
}

pub struct RemoteSolvingServiceStrategy {
    service: RemoteService,
    config: RemoteServiceConfig,
    credential: Credential,
    client: reqwest::Client,
}

impl RemoteSolvingServiceStrategy {
    pub fn new(service: RemoteService, config: RemoteServiceConfig) -> Result<Self, SolveError> {
        let client = crate::build_client(config.request_timeout_seconds)?;
        Ok(Self {
            service,
            credential: config.credential(),
            config,
            client,
        })
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = credential;
        self
    }

    pub fn schedule(&self) -> PollSchedule {
        PollSchedule::new(
            Duration::from_millis(self.config.poll_interval_ms),
            self.config.max_polls,
        )
    }
}

#[async_trait]
impl SolverStrategy for RemoteSolvingServiceStrategy {
    fn id(&self) -> StrategyId {
        match self.service {
            RemoteService::CapSolver => StrategyId::CapSolver,
            RemoteService::TwoCaptcha => StrategyId::TwoCaptcha,
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

        let encoded = crate::encode_image(image);
        let schedule = self.schedule();
        info!(
            service = self.service.name(),
            max_wait_secs = schedule.budget().as_secs(),
            "submitting to solving service"
        );

        match self.service {
            RemoteService::CapSolver => {
                capsolver::solve(&self.client, &self.config.base_url, &api_key, &encoded, schedule).await
            }
            RemoteService::TwoCaptcha => {
                twocaptcha::solve(&self.client, &self.config.base_url, &api_key, &encoded, schedule).await
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use captcha_resolver_core::ImageFormat;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(base_url: String, max_polls: u32) -> RemoteServiceConfig {
        RemoteServiceConfig {
            api_key_env: "CAPTCHA_RESOLVER_TEST_UNSET_REMOTE_KEY".to_string(),
            base_url,
            poll_interval_ms: 5,
            max_polls,
            request_timeout_seconds: 5,
        }
    }

    fn image() -> CaptchaImage {
        CaptchaImage::new(b"img".to_vec(), ImageFormat::Png).unwrap()
    }

    #[test]
    fn test_missing_or_blank_credential_is_unavailable() {
        for service in [RemoteService::CapSolver, RemoteService::TwoCaptcha] {
            let unset = RemoteSolvingServiceStrategy::new(service, config("http://localhost".into(), 3)).unwrap();
            assert!(matches!(unset.check_available(), Err(SolveError::Unavailable(_))));

            let none = RemoteSolvingServiceStrategy::new(service, config("http://localhost".into(), 3))
                .unwrap()
                .with_credential(Credential::None);
            assert!(!none.is_available());

            let blank = RemoteSolvingServiceStrategy::new(service, config("http://localhost".into(), 3))
                .unwrap()
                .with_credential(Credential::Static("   ".into()));
            assert!(!blank.is_available());
        }
    }

    #[test]
    fn test_ids_and_schedule_follow_config() {
        let capsolver = RemoteSolvingServiceStrategy::new(RemoteService::CapSolver, config("http://x".into(), 7))
            .unwrap()
            .with_credential(Credential::Static("cs-key".into()));
        let twocaptcha = RemoteSolvingServiceStrategy::new(RemoteService::TwoCaptcha, config("http://x".into(), 7)).unwrap();

        assert_eq!(capsolver.id(), StrategyId::CapSolver);
        assert_eq!(twocaptcha.id(), StrategyId::TwoCaptcha);
        assert!(capsolver.check_available().is_ok());

        let schedule = capsolver.schedule();
        assert_eq!(schedule.interval, Duration::from_millis(5));
        assert_eq!(schedule.max_attempts, 7);
    }

    #[tokio::test]
    async fn test_capsolver_strategy_solves_end_to_end() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createTask"))
            .and(body_partial_json(json!({ "clientKey": "cs-key", "task": { "body": "aW1n" } })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "errorId": 0, "taskId": "t-1" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/getTaskResult"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "errorId": 0, "status": "ready", "solution": { "text": "kemon" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let strategy = RemoteSolvingServiceStrategy::new(RemoteService::CapSolver, config(server.uri(), 3))
            .unwrap()
            .with_credential(Credential::Static("cs-key".into()));

        assert_eq!(strategy.solve(&image()).await.unwrap(), "kemon");
    }

    #[tokio::test]
    async fn test_twocaptcha_strategy_uses_configured_poll_budget() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/in.php"))
            .and(body_string_contains("key=tc-key"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 1, "request": "99" })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/res.php"))
            .and(query_param("id", "99"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0, "request": "CAPCHA_NOT_READY"
            })))
            .expect(2)
            .mount(&server)
            .await;

        let strategy = RemoteSolvingServiceStrategy::new(RemoteService::TwoCaptcha, config(server.uri(), 2))
            .unwrap()
            .with_credential(Credential::Static("tc-key".into()));

        let err = strategy.solve(&image()).await.unwrap_err();
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_solve_without_credential_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let strategy = RemoteSolvingServiceStrategy::new(RemoteService::CapSolver, config(server.uri(), 3))
            .unwrap()
            .with_credential(Credential::None);

        let err = strategy.solve(&image()).await.unwrap_err();
        assert!(matches!(err, SolveError::Unavailable(_)));
    }
}
