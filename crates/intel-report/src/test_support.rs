//! Scripted LLM provider for unit tests

use async_trait::async_trait;
use intel_llm::{
    CompletionRequest, CompletionResponse, LLMError, LLMProvider, Message, StopReason,
    TokenUsage,
};
use std::collections::VecDeque;
use std::sync::Mutex;

type Responder = Box<dyn Fn(&CompletionRequest) -> intel_llm::Result<String> + Send + Sync>;

/// Provider answering from a closure and recording every request
pub struct ScriptedProvider {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedProvider {
    /// Answer every request with `f(request)`
    pub fn from_fn<F>(f: F) -> Self
    where
        F: Fn(&CompletionRequest) -> intel_llm::Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(f),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Answer requests with queued texts in order
    pub fn queued<I, S>(responses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(responses.into_iter().map(Into::into).collect());
        Self::from_fn(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| LLMError::RequestFailed("script exhausted".to_string()))
        })
    }

    /// Requests seen so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// Number of requests seen so far
    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl LLMProvider for ScriptedProvider {
    async fn complete(&self, request: CompletionRequest) -> intel_llm::Result<CompletionResponse> {
        self.requests.lock().unwrap().push(request.clone());
        let text = (self.responder)(&request)?;

        Ok(CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 10,
                output_tokens: 5,
            },
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
