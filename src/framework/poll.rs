//! A bounded poll loop driven by a check function returning [`State`].

use super::{Attempts, State};

use std::time::Duration;

use tracing::debug;

/// When and how often to poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSchedule {
    /// The delay before the first attempt. Usually shorter than [`Self::interval`] so fast jobs are picked up early.
    pub first_delay: Duration,
    /// The delay before every later attempt.
    pub interval: Duration,
    /// The maximum number of attempts.
    pub max_attempts: u32,
}

impl PollSchedule {
    /// The delay to wait before the given 1-based attempt.
    pub fn delay_before(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            self.first_delay
        } else {
            self.interval
        }
    }
}

/// How a poll loop ended.
#[derive(Debug, PartialEq, Eq)]
pub enum PollOutcome<T, R> {
    /// The check returned [`State::Success`].
    Success {
        /// The value returned by the check.
        value: T,
        /// The attempt that produced the value.
        attempts: u32,
    },
    /// The check returned [`State::Stop`].
    Failure {
        /// Why the check stopped.
        reason: R,
        /// The attempt that stopped the loop.
        attempts: u32,
    },
    /// Every attempt returned [`State::Retry`].
    Exhausted {
        /// The number of attempts made.
        attempts: u32,
    },
}

/// Runs `check` until it returns a terminal [`State`] or the schedule runs out of attempts.
///
/// The loop sleeps before every attempt, including the first. The check receives the 1-based attempt number.
pub async fn poll<T, R, F, Fut>(schedule: &PollSchedule, mut check: F) -> PollOutcome<T, R>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = State<T, R>>,
{
    let mut attempts = Attempts::new(schedule.max_attempts);

    while let Some(attempt) = attempts.next_attempt() {
        tokio::time::sleep(schedule.delay_before(attempt)).await;

        match check(attempt).await {
            State::Success(value) => {
                return PollOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            State::Stop(reason) => {
                return PollOutcome::Failure {
                    reason,
                    attempts: attempt,
                };
            }
            State::Retry => debug!("attempt {attempt} is not conclusive yet"),
        }
    }

    PollOutcome::Exhausted {
        attempts: attempts.current(),
    }
}
