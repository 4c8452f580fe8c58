//! Builds artifacts through GitHub Actions in disposable scratch repositories.
//!
//! A build provisions a scratch repository from a template, uploads a binary into it, dispatches a workflow, waits
//! for the run to finish and hands back the first asset of the latest release.
//!
//! See: [`RemoteBuildOrchestrator`], [`BuildRequest`]

pub mod env;
pub mod error;
pub mod framework;
pub mod github;
pub mod orchestrator;
pub mod progress;
pub mod release;
pub mod repository;
pub mod request;
pub mod transactions;
pub mod workflow;

pub use error::{ApiError, BuildError};
pub use orchestrator::{AssetPayload, BuildOutcome, Cleanup, RemoteBuildOrchestrator};
pub use progress::{CollectingSink, ProgressFn, ProgressSink};
pub use request::{AssetMode, BuildRequest, BuildRequestBuilder};

/// A shorthand to define a statically allocated variable using a [`std::sync::LazyLock`].
///
/// # Examples
///
/// ```rust
/// use ci_relay::static_lazy_lock;
/// use std::sync::LazyLock;
///
/// static_lazy_lock! {
///     pub VAR_1: String = String::from("a static variable");
/// }
/// // ...equals to...
/// pub static VAR_2: LazyLock<String> = LazyLock::new(|| String::from("a static variable"));
///
/// assert_eq!(*VAR_1, *VAR_2);
/// ```
#[macro_export]
macro_rules! static_lazy_lock {
    ($(#[$meta:meta])* $vis:vis $name:ident: $type:ty = $expr:expr $(;)?) => {
        $(#[$meta])*
        $vis static $name: $crate::__priv_macro_use::LazyLock<$type> =
            $crate::__priv_macro_use::LazyLock::new(|| $expr);
    };
}

#[doc(hidden)]
pub mod __priv_macro_use {
    pub use std::sync::LazyLock;
}
