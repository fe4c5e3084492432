use std::time::Duration;

use futures_util::future::BoxFuture;

use crate::Result;

/// Operator-configured pacing for job/poll providers. Fixed interval, no
/// backoff: one dispatch polls one job at a time.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            max_attempts: 60,
        }
    }
}

/// What one status fetch reported.
#[derive(Debug)]
pub(crate) enum PollState<T> {
    InProgress,
    Completed(T),
    Failed(String),
}

/// How the whole poll loop ended. `ExhaustedAttempts` bounds a stuck job.
#[derive(Debug)]
pub(crate) enum PollOutcome<T> {
    Completed(T),
    Failed(String),
    ExhaustedAttempts { attempts: u32 },
}

pub(crate) async fn poll_until_terminal<'a, T: Send>(
    config: PollConfig,
    mut probe: impl FnMut(u32) -> BoxFuture<'a, Result<PollState<T>>>,
) -> Result<PollOutcome<T>> {
    let max_attempts = config.max_attempts.max(1);
    for attempt in 1..=max_attempts {
        match probe(attempt).await? {
            PollState::Completed(value) => return Ok(PollOutcome::Completed(value)),
            PollState::Failed(message) => return Ok(PollOutcome::Failed(message)),
            PollState::InProgress => {
                tracing::debug!(attempt, max_attempts, "job still in progress");
                if attempt < max_attempts {
                    tokio::time::sleep(config.interval).await;
                }
            }
        }
    }
    Ok(PollOutcome::ExhaustedAttempts {
        attempts: max_attempts,
    })
}
