//! Human-readable progress notifications emitted at every stage boundary.

use std::{
    fmt,
    panic::{self, AssertUnwindSafe},
    sync::Arc,
};

use parking_lot::Mutex;
use tracing::{debug, info};

/// Receives progress messages from a running build.
///
/// Errors returned from [`ProgressSink::notify`] are logged and discarded; they never abort a build.
pub trait ProgressSink: Send + Sync {
    /// Handles one progress message.
    ///
    /// # Errors
    ///
    /// May return any error. The build ignores it.
    fn notify(&self, message: &str) -> anyhow::Result<()>;
}

/// A [`ProgressSink`] that forwards every message to a closure.
pub struct ProgressFn<F>(pub F);

impl<F> ProgressSink for ProgressFn<F>
where
    F: Fn(&str) + Send + Sync,
{
    fn notify(&self, message: &str) -> anyhow::Result<()> {
        (self.0)(message);
        Ok(())
    }
}

impl<F> fmt::Debug for ProgressFn<F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ProgressFn")
    }
}

/// A [`ProgressSink`] that keeps every message in memory.
#[derive(Debug, Default)]
pub struct CollectingSink {
    messages: Mutex<Vec<String>>,
}

impl CollectingSink {
    /// Creates an empty [`CollectingSink`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of the messages received so far.
    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

impl ProgressSink for CollectingSink {
    fn notify(&self, message: &str) -> anyhow::Result<()> {
        self.messages.lock().push(message.to_owned());
        Ok(())
    }
}

/// Reports progress to tracing and to an optional [`ProgressSink`].
#[derive(Clone, Default)]
pub struct Progress {
    sink: Option<Arc<dyn ProgressSink>>,
}

impl Progress {
    /// Creates a reporter forwarding to `sink`, if any.
    pub fn new(sink: Option<Arc<dyn ProgressSink>>) -> Self {
        Self { sink }
    }

    /// Logs a message and forwards it to the sink, discarding any sink error or panic.
    pub fn report(&self, message: &str) {
        info!("{message}");
        let Some(sink) = &self.sink else {
            return;
        };

        match panic::catch_unwind(AssertUnwindSafe(|| sink.notify(message))) {
            Ok(Ok(())) => {}
            Ok(Err(err)) => debug!("progress sink rejected a message: {err}"),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .copied()
                    .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
                    .unwrap_or("unknown panic");
                debug!("progress sink panicked: {reason}");
            }
        }
    }
}

impl fmt::Debug for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Progress")
            .field("sink", &self.sink.is_some())
            .finish()
    }
}
