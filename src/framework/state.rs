use tracing::{error, warn};

/// A state that controls the flow of data.
#[non_exhaustive]
#[derive(Debug, PartialEq, Eq)]
pub enum State<T, R = String> {
    /// The control flow should exit with a value.
    Success(T),
    /// The control flow should retry if possible.
    ///
    /// See: [`Attempts`]
    Retry,
    /// The control flow should exit immediately with a reason.
    Stop(R),
}

impl<T, R> State<T, R> {
    /// Turns a fallible result into a [`State`], treating every error as retryable.
    pub fn retry_on_err<E>(result: Result<T, E>) -> Self
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(value) => State::Success(value),
            Err(err) => {
                warn!("{err}, will try again");
                State::Retry
            }
        }
    }
}

/// Counts attempts against a ceiling.
#[derive(Debug, Clone, Copy)]
pub struct Attempts {
    current: u32,
    max: u32,
}

impl Attempts {
    /// Creates a counter allowing at most `max` attempts.
    pub fn new(max: u32) -> Self {
        Self { current: 0, max }
    }

    /// The number of attempts started so far.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Starts the next attempt, returning its 1-based number, or [`None`] when the ceiling is reached.
    pub fn next_attempt(&mut self) -> Option<u32> {
        if self.current >= self.max {
            error!("attempted for too many times ({}), stopping!", self.max);
            return None;
        }

        self.current += 1;
        if self.current > 1 {
            warn!("retrying… ({} / {})", self.current, self.max);
        }
        Some(self.current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_stop_at_ceiling() {
        let mut attempts = Attempts::new(2);
        assert_eq!(attempts.next_attempt(), Some(1));
        assert_eq!(attempts.next_attempt(), Some(2));
        assert_eq!(attempts.next_attempt(), None);
        assert_eq!(attempts.current(), 2);
    }

    #[test]
    fn zero_ceiling_never_starts() {
        let mut attempts = Attempts::new(0);
        assert_eq!(attempts.next_attempt(), None);
    }

    #[test]
    fn errors_become_retries() {
        let state: State<u8> = State::retry_on_err(Err::<u8, _>("boom"));
        assert_eq!(state, State::Retry);
    }
}
