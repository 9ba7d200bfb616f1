//! LLM provider implementations for Slo.
//!
//! All providers implement the `slo_core::Provider` trait.

pub mod anthropic;

pub use anthropic::AnthropicProvider;
