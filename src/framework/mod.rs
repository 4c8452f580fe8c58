//! Flow control for retryable operations.
//!
//! See: [`State`], [`poll`], [`unwrap`]

mod poll;
mod state;

pub use poll::*;
pub use state::*;

/// Unwraps a [`State`], returning early from the enclosing function on [`State::Retry`] or [`State::Stop`].
///
/// The enclosing function must itself return a [`State`] with the same stop reason type.
#[macro_export]
macro_rules! unwrap {
    ($state:expr) => {
        match $state {
            $crate::framework::State::Success(value) => value,
            $crate::framework::State::Retry => return $crate::framework::State::Retry,
            $crate::framework::State::Stop(reason) => {
                return $crate::framework::State::Stop(reason);
            }
        }
    };
}

pub use unwrap;
