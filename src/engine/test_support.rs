//! Scripted completion client for engine tests.

use std::cell::RefCell;
use std::collections::VecDeque;

use crate::engine::llm_client::{CompletionClient, CompletionError, CompletionRequest};

/// Replays queued replies in order and records every request it sees.
/// Runs out with [`CompletionError::EmptyResponse`].
#[derive(Debug, Default)]
pub struct ScriptedClient {
    replies: RefCell<VecDeque<Result<String, CompletionError>>>,
    requests: RefCell<Vec<CompletionRequest>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(self, text: impl Into<String>) -> Self {
        self.replies.borrow_mut().push_back(Ok(text.into()));
        self
    }

    pub fn fail(self, status: u16) -> Self {
        self.replies.borrow_mut().push_back(Err(CompletionError::Status {
            status,
            body: "model not loaded".into(),
        }));
        self
    }

    /// A reply with no content, as the HTTP client reports it.
    pub fn blank(self) -> Self {
        self.replies
            .borrow_mut()
            .push_back(Err(CompletionError::EmptyResponse));
        self
    }

    pub fn calls(&self) -> usize {
        self.requests.borrow().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.borrow().clone()
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.requests.borrow().last().map(CompletionRequest::prompt_text)
    }
}

impl CompletionClient for ScriptedClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, CompletionError> {
        self.requests.borrow_mut().push(request.clone());
        self.replies
            .borrow_mut()
            .pop_front()
            .unwrap_or(Err(CompletionError::EmptyResponse))
    }
}
