//! LLM provider abstraction and reliable structured invocation
//!
//! This crate provides provider-agnostic abstractions for interacting with
//! Large Language Models (LLMs). It includes:
//!
//! - Message and completion types shared by all backends
//! - The [`LLMProvider`] trait and concrete providers (behind feature flags)
//! - A model catalog ([`available_models`], [`ModelDescriptor`])
//! - [`LlmInvoker`], which retries, coerces answers into a
//!   [`StructuredOutput`] type and falls back to a default when every
//!   attempt fails

pub mod completion;
pub mod error;
pub mod invoke;
pub mod messages;
pub mod models;
pub mod prompt;
pub mod provider;
pub mod retry;
pub mod schema;
pub mod structured;

// Re-export main types
pub use completion::{
    CompletionRequest, CompletionResponse, ResponseFormat, StopReason, TokenUsage,
};
pub use error::{LLMError, Result};
pub use invoke::{CallLabel, LlmInvoker, StatusCallback};
pub use messages::{ContentBlock, Message, MessageContent, Role};
pub use models::{
    ModelDescriptor, ModelProvider, available_models, find_model, resolve_descriptor,
};
pub use prompt::{ChatTemplate, Prompt};
pub use provider::LLMProvider;
pub use retry::RetryPolicy;
pub use schema::{FieldKind, FieldSpec, Schema, StructuredOutput};
pub use structured::{ResponseMode, extract_json_block};

pub mod providers;
