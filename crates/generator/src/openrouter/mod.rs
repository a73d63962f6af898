//! OpenRouter-compatible chat completions generator

pub mod client;
pub mod types;

pub use client::{OpenRouterConfig, OpenRouterGenerator};
pub use types::*;
