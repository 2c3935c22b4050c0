//! # Mocknest Data
//!
//! Word lists and derived fake data backing the template engine's domain
//! helpers (`{{name.full}}`, `{{city}}`, `{{email}}`, ...). Install with
//! [`install`] once at startup; the core falls back to a minimal built-in
//! provider when this crate is absent.

mod provider;

pub use provider::WordListProvider;

use std::sync::Arc;

/// Register the word-list provider as the process-wide template source.
/// First registration wins; calling twice is harmless.
pub fn install() {
    mocknest_core::register_word_provider(Arc::new(WordListProvider::new()));
}
