use std::future::Future;
use std::time::Duration;

use tracing::debug;

use captcha_resolver_core::SolveError;

/// What one status query of a submitted task said.
#[derive(Debug, Clone, PartialEq)]
pub enum PollOutcome {
    Ready(String),
    Failed(String),
    Pending,
}

#[derive(Debug, Clone, Copy)]
pub struct PollSchedule {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl PollSchedule {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }

    /// Worst-case wait, excluding request latency.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Sleep, query, repeat until the task is ready, fails, or the attempt
/// budget runs out. Running out is a [`SolveError::Timeout`].
pub async fn poll_until_ready<F, Fut>(
    service: &str,
    schedule: PollSchedule,
    mut check: F,
) -> Result<String, SolveError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<PollOutcome, SolveError>>,
{
    for attempt in 1..=schedule.max_attempts {
        tokio::time::sleep(schedule.interval).await;

        match check(attempt).await? {
            PollOutcome::Ready(text) => return Ok(text),
            PollOutcome::Failed(reason) => return Err(SolveError::Rejected(reason)),
            PollOutcome::Pending => {
                debug!(service, attempt, max = schedule.max_attempts, "waiting for result");
            }
        }
    }

    Err(SolveError::Timeout(format!(
        "{} result not ready after {} polls",
        service, schedule.max_attempts
    )))
}
