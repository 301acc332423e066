//! Language-model backend implementations for Second.
//!
//! All providers implement the `second_core::Provider` trait and the
//! `second_core::HealthProbe` trait used by diagnostics.

pub mod ollama;

pub use ollama::OllamaProvider;
