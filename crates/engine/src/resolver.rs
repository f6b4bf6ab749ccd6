use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{info, warn};

use captcha_resolver_core::{
    AttemptStatus, CaptchaImage, ResolveError, ResolvedCode, Resolution, SolveAttempt, SolveError,
    SolverStrategy, StrategyId,
};

/// Runs registered strategies in order until one produces an accepted code.
///
/// Each strategy runs on its own task under `strategy_timeout`; the task is
/// aborted when the budget expires. Strategy errors and panics are recorded
/// in the attempt trace and never escape `resolve`.
pub struct CaptchaResolver {
    strategies: HashMap<StrategyId, Arc<dyn SolverStrategy>>,
    order: Vec<StrategyId>,
    strategy_timeout: Duration,
}

impl CaptchaResolver {
    pub fn new(strategy_timeout: Duration) -> Self {
        Self {
            strategies: HashMap::new(),
            order: StrategyId::DEFAULT_ORDER.to_vec(),
            strategy_timeout,
        }
    }

    /// Replaces any strategy already registered under the same id.
    pub fn register(&mut self, strategy: Arc<dyn SolverStrategy>) -> &mut Self {
        self.strategies.insert(strategy.id(), strategy);
        self
    }

    pub fn with_strategy(mut self, strategy: Arc<dyn SolverStrategy>) -> Self {
        self.register(strategy);
        self
    }

    pub fn with_order(mut self, order: Vec<StrategyId>) -> Self {
        self.order = order;
        self
    }

    pub fn order(&self) -> &[StrategyId] {
        &self.order
    }

    pub fn strategy_timeout(&self) -> Duration {
        self.strategy_timeout
    }

    pub fn strategy(&self, id: StrategyId) -> Option<&Arc<dyn SolverStrategy>> {
        self.strategies.get(&id)
    }

    /// Resolve using the configured order.
    pub async fn resolve(&self, image: &CaptchaImage) -> Result<Resolution, ResolveError> {
        self.resolve_with_order(image, &self.order).await
    }

    pub async fn resolve_with_order(
        &self,
        image: &CaptchaImage,
        order: &[StrategyId],
    ) -> Result<Resolution, ResolveError> {
        let mut attempts = Vec::with_capacity(order.len());

        for (step, id) in order.iter().enumerate() {
            let Some(strategy) = self.strategies.get(id) else {
                warn!(strategy = %id, "strategy not registered");
                attempts.push(finished(*id, AttemptStatus::Failed, None, Utc::now(), Instant::now(), "not registered".into()));
                continue;
            };

            info!(strategy = %id, step = step + 1, of = order.len(), "trying captcha strategy");
            let (attempt, code) = self.attempt(strategy, image).await;
            attempts.push(attempt);

            if let Some(code) = code {
                info!(strategy = %id, code = %code, attempts = attempts.len(), "captcha resolved");
                return Ok(Resolution { code, attempts });
            }
        }

        warn!(attempts = attempts.len(), "all captcha strategies exhausted");
        Err(ResolveError::AllStrategiesExhausted { attempts })
    }

    async fn attempt(&self, strategy: &Arc<dyn SolverStrategy>, image: &CaptchaImage) -> (SolveAttempt, Option<ResolvedCode>) {
        let id = strategy.id();

        if let Err(e) = strategy.check_available() {
            info!(strategy = %id, reason = %e, "strategy skipped");
            return (SolveAttempt::skipped(id, e.to_string()), None);
        }

        let started_at = Utc::now();
        let clock = Instant::now();

        let task_strategy = Arc::clone(strategy);
        let task_image = image.clone();
        let mut handle = tokio::spawn(async move { task_strategy.solve(&task_image).await });

        let outcome = match tokio::time::timeout(self.strategy_timeout, &mut handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(SolveError::Transport(format!("strategy task failed: {}", join_err))),
            Err(_) => {
                handle.abort();
                Err(SolveError::Timeout(format!("exceeded {}s budget", self.strategy_timeout.as_secs_f32())))
            }
        };

        match outcome {
            Ok(raw) => match ResolvedCode::accept(&raw, id) {
                Some(code) => {
                    let attempt = finished(id, AttemptStatus::Success, Some(code.text().to_string()), started_at, clock, String::new());
                    (attempt, Some(code))
                }
                None => {
                    warn!(strategy = %id, "strategy returned no alphanumeric text");
                    let attempt = finished(id, AttemptStatus::Failed, None, started_at, clock, "empty result after normalization".into());
                    (attempt, None)
                }
            },
            Err(e) => {
                let status = if e.is_timeout() { AttemptStatus::TimedOut } else { AttemptStatus::Failed };
                warn!(strategy = %id, error = %e, "strategy failed");
                (finished(id, status, None, started_at, clock, e.to_string()), None)
            }
        }
    }
}

fn finished(
    strategy: StrategyId,
    status: AttemptStatus,
    result_text: Option<String>,
    started_at: chrono::DateTime<Utc>,
    clock: Instant,
    diagnostic: String,
) -> SolveAttempt {
    SolveAttempt {
        strategy,
        status,
        result_text,
        started_at,
        elapsed_ms: clock.elapsed().as_millis() as u64,
        diagnostic,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use captcha_resolver_correction::CorrectionEngine;
    use captcha_resolver_local::{LocalRecognitionStrategy, OcrEngine, RawReading};

    enum Reply {
        Text(&'static str),
        Error(SolveError),
        Panic,
        Hang(Arc<AtomicBool>),
    }

    struct StubStrategy {
        id: StrategyId,
        available: bool,
        reply: Reply,
        calls: AtomicUsize,
    }

    impl StubStrategy {
        fn new(id: StrategyId, reply: Reply) -> Arc<Self> {
            Arc::new(Self { id, available: true, reply, calls: AtomicUsize::new(0) })
        }

        fn unavailable(id: StrategyId) -> Arc<Self> {
            Arc::new(Self { id, available: false, reply: Reply::Text("never"), calls: AtomicUsize::new(0) })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    struct SetOnDrop(Arc<AtomicBool>);

    impl Drop for SetOnDrop {
        fn drop(&mut self) {
            self.0.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SolverStrategy for StubStrategy {
        fn id(&self) -> StrategyId {
            self.id
        }

        fn check_available(&self) -> Result<(), SolveError> {
            if self.available {
                Ok(())
            } else {
                Err(SolveError::Unavailable(format!("{} credential not set", self.id)))
            }
        }

        async fn solve(&self, _image: &CaptchaImage) -> Result<String, SolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.reply {
                Reply::Text(t) => Ok(t.to_string()),
                Reply::Error(e) => Err(e.clone()),
                Reply::Panic => panic!("provider blew up"),
                Reply::Hang(dropped) => {
                    let _guard = SetOnDrop(dropped.clone());
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Ok("late".into())
                }
            }
        }
    }

    struct FixedOcr(&'static str);

    #[async_trait]
    impl OcrEngine for FixedOcr {
        fn name(&self) -> &str {
            "fixed"
        }

        async fn read(&self, _image: &CaptchaImage, _workdir: &Path) -> Result<Vec<RawReading>, SolveError> {
            Ok(vec![RawReading::new("EasyOCR-1", self.0)])
        }
    }

    fn image() -> CaptchaImage {
        CaptchaImage::from_bytes(vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00]).unwrap()
    }

    fn resolver() -> CaptchaResolver {
        CaptchaResolver::new(Duration::from_secs(5))
    }

    fn local(reading: &'static str) -> Arc<LocalRecognitionStrategy> {
        Arc::new(
            LocalRecognitionStrategy::new(vec![Arc::new(FixedOcr(reading))], CorrectionEngine::default())
                .with_preprocessing(false),
        )
    }

    #[tokio::test]
    async fn test_first_success_short_circuits() {
        let a = StubStrategy::new(StrategyId::VisionOpenAi, Reply::Text("X7k9Q"));
        let b = StubStrategy::new(StrategyId::VisionAnthropic, Reply::Text("other"));
        let resolver = resolver().with_strategy(a.clone()).with_strategy(b.clone());

        let resolution = resolver
            .resolve_with_order(&image(), &[StrategyId::VisionOpenAi, StrategyId::VisionAnthropic])
            .await
            .unwrap();

        assert_eq!(resolution.code.text(), "X7k9Q");
        assert_eq!(resolution.code.source, StrategyId::VisionOpenAi);
        assert_eq!(resolution.attempts.len(), 1);
        assert_eq!(a.calls(), 1);
        assert_eq!(b.calls(), 0);
    }

    #[tokio::test]
    async fn test_unavailable_strategy_is_skipped_without_invocation() {
        let gpt = StubStrategy::unavailable(StrategyId::VisionOpenAi);
        let capsolver = StubStrategy::new(StrategyId::CapSolver, Reply::Text("abc12"));
        let resolver = resolver().with_strategy(gpt.clone()).with_strategy(capsolver.clone());

        let resolution = resolver
            .resolve_with_order(&image(), &[StrategyId::VisionOpenAi, StrategyId::CapSolver])
            .await
            .unwrap();

        assert_eq!(gpt.calls(), 0);
        assert_eq!(resolution.attempts[0].status, AttemptStatus::Skipped);
        assert!(resolution.attempts[0].diagnostic.contains("credential not set"));
        assert!(!resolution.attempts[0].is_success());
        assert!(resolution.attempts[1].is_success());
        assert_eq!(resolution.attempts[1].result_text.as_deref(), Some("abc12"));
    }

    #[tokio::test]
    async fn test_errors_and_panics_are_contained() {
        let failing = StubStrategy::new(StrategyId::CapSolver, Reply::Error(SolveError::Rejected("ERROR_ZERO_BALANCE".into())));
        let panicking = StubStrategy::new(StrategyId::TwoCaptcha, Reply::Panic);
        let local = local("kemon");
        let resolver = resolver()
            .with_strategy(failing)
            .with_strategy(panicking.clone())
            .with_strategy(local);

        let resolution = resolver
            .resolve_with_order(&image(), &[StrategyId::CapSolver, StrategyId::TwoCaptcha, StrategyId::LocalOcr])
            .await
            .unwrap();

        let statuses: Vec<AttemptStatus> = resolution.attempts.iter().map(|a| a.status).collect();
        assert_eq!(statuses, [AttemptStatus::Failed, AttemptStatus::Failed, AttemptStatus::Success]);
        assert!(resolution.attempts[0].diagnostic.contains("ERROR_ZERO_BALANCE"));
        assert_eq!(panicking.calls(), 1);
        assert_eq!(resolution.code.source, StrategyId::LocalOcr);
    }

    #[tokio::test]
    async fn test_timeout_aborts_strategy_task() {
        let dropped = Arc::new(AtomicBool::new(false));
        let slow = StubStrategy::new(StrategyId::CapSolver, Reply::Hang(dropped.clone()));
        let resolver = CaptchaResolver::new(Duration::from_millis(50)).with_strategy(slow);

        let err = resolver.resolve_with_order(&image(), &[StrategyId::CapSolver]).await.unwrap_err();
        assert_eq!(err.attempts()[0].status, AttemptStatus::TimedOut);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(dropped.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_provider_timeout_error_recorded_as_timed_out() {
        let s = StubStrategy::new(StrategyId::TwoCaptcha, Reply::Error(SolveError::Timeout("30 polls".into())));
        let resolver = resolver().with_strategy(s);
        let err = resolver.resolve_with_order(&image(), &[StrategyId::TwoCaptcha]).await.unwrap_err();
        assert_eq!(err.attempts()[0].status, AttemptStatus::TimedOut);
    }

    #[tokio::test]
    async fn test_exhaustion_trace_covers_every_configured_strategy() {
        let mut resolver = resolver();
        for id in [StrategyId::VisionOpenAi, StrategyId::VisionAnthropic, StrategyId::CapSolver, StrategyId::TwoCaptcha] {
            resolver.register(StubStrategy::unavailable(id));
        }
        resolver.register(local("x"));

        let err = resolver.resolve(&image()).await.unwrap_err();
        let attempts = err.attempts();
        assert_eq!(attempts.len(), StrategyId::DEFAULT_ORDER.len());
        assert!(attempts[..4].iter().all(|a| a.status == AttemptStatus::Skipped));
        assert_eq!(attempts[4].status, AttemptStatus::Failed);
        assert_eq!(attempts[4].diagnostic, SolveError::NoAcceptableCandidate.to_string());
    }

    #[tokio::test]
    async fn test_symbol_only_reply_is_not_accepted() {
        let noisy = StubStrategy::new(StrategyId::VisionOpenAi, Reply::Text(" -!- "));
        let fallback = StubStrategy::new(StrategyId::VisionAnthropic, Reply::Text("a-b c!"));
        let resolver = resolver().with_strategy(noisy).with_strategy(fallback);

        let resolution = resolver
            .resolve_with_order(&image(), &[StrategyId::VisionOpenAi, StrategyId::VisionAnthropic])
            .await
            .unwrap();
        assert_eq!(resolution.attempts[0].status, AttemptStatus::Failed);
        assert_eq!(resolution.code.text(), "abc");
    }

    #[tokio::test]
    async fn test_unregistered_strategy_recorded() {
        let resolver = resolver();
        let err = resolver.resolve_with_order(&image(), &[StrategyId::CapSolver]).await.unwrap_err();
        assert_eq!(err.attempts()[0].status, AttemptStatus::Failed);
        assert_eq!(err.attempts()[0].diagnostic, "not registered");
    }

    #[tokio::test]
    async fn test_local_digit_confusion_end_to_end() {
        let resolver = resolver().with_strategy(local("d0yoka"));
        let resolution = resolver.resolve_with_order(&image(), &[StrategyId::LocalOcr]).await.unwrap();
        let plausible = ["doyoka", "dayoka", "deyoka"];
        assert!(plausible.contains(&resolution.code.text()));
        assert_ne!(resolution.code.text(), "d0yoka");
    }
}
