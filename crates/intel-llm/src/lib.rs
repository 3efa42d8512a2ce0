//! LLM provider abstraction layer for intel-rs
//!
//! This crate provides provider-agnostic abstractions for chat completions:
//!
//! - Message types for LLM communication
//! - Completion request/response types, including JSON response mode
//! - Provider trait for LLM implementations
//! - A retry policy with clamped exponential backoff
//! - Helpers for pulling a JSON object out of model output
//! - An OpenAI-compatible provider (behind the `openai` feature)

pub mod completion;
pub mod error;
pub mod json;
pub mod messages;
pub mod provider;
pub mod retry;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, ResponseFormat, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use json::extract_json_object;
pub use messages::{Message, Role};
pub use provider::LLMProvider;
pub use retry::RetryPolicy;

// Provider implementations (feature-gated)
#[cfg(feature = "openai")]
pub mod providers;
