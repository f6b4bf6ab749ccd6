use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use captcha_resolver_core::{AppConfig, SolveError, SolverStrategy};
use captcha_resolver_local::LocalRecognitionStrategy;
use captcha_resolver_providers::{RemoteService, RemoteSolvingServiceStrategy, VisionModelStrategy, VisionProvider};

/// Every known strategy, built from configuration, in default order.
pub fn build_strategies(config: &AppConfig) -> Result<Vec<Arc<dyn SolverStrategy>>, SolveError> {
    let strategies: Vec<Arc<dyn SolverStrategy>> = vec![
        Arc::new(VisionModelStrategy::new(VisionProvider::OpenAi, config.vision.openai.clone())?),
        Arc::new(VisionModelStrategy::new(VisionProvider::Anthropic, config.vision.anthropic.clone())?),
        Arc::new(RemoteSolvingServiceStrategy::new(RemoteService::CapSolver, config.remote.capsolver.clone())?),
        Arc::new(RemoteSolvingServiceStrategy::new(RemoteService::TwoCaptcha, config.remote.twocaptcha.clone())?),
        Arc::new(LocalRecognitionStrategy::from_config(&config.local)),
    ];
    Ok(strategies)
}

pub fn build_resolver(config: &AppConfig) -> Result<crate::CaptchaResolver, SolveError> {
    let mut resolver = crate::CaptchaResolver::new(Duration::from_secs(config.resolver.strategy_timeout_seconds))
        .with_order(config.resolver.order.clone());
    for strategy in build_strategies(config)? {
        debug!(strategy = %strategy.id(), "registered strategy");
        resolver.register(strategy);
    }
    Ok(resolver)
}
