//! Pre-made transactions.

#![cfg(feature = "transactions")]

mod save_release_asset;

pub use save_release_asset::*;
