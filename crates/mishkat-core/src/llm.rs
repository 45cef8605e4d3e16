//! Chat-completion gateway trait.
//!
//! A [`LanguageModel`] is stateless: the system prompt travels inside each
//! [`CompletionRequest`], so one client can serve concurrent requests in
//! different languages.

use std::pin::Pin;

use async_trait::async_trait;
use futures::Stream;

use crate::error::Result;
use crate::models::ChatMessage;

/// Ordered text fragments from a streaming completion.
///
/// Ends after the last fragment, or after yielding a single error.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>, temperature: f32) -> Self {
        Self {
            messages,
            temperature,
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_name(&self) -> &str;

    /// Run the request to completion and return the whole answer.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Start the request and return its fragments as they arrive.
    ///
    /// Concatenating every fragment gives the same text `complete` would
    /// return for the same request.
    async fn stream(&self, request: &CompletionRequest) -> Result<FragmentStream>;
}
