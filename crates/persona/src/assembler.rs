//! Conversation assembly — system prompt first, caller history after.
//!
//! The assembled list is always `history.len() + 1` long and index 0 is the
//! generated system prompt. History entries are copied in order, reduced to
//! `{role, content}`; roles are not checked here (the HTTP boundary and the
//! upstream API do that).

use agora_core::message::Message;
use agora_core::selector::{ConversationRequest, PromptSelector};
use tracing::debug;

use crate::catalog::PromptCatalog;

/// Builds outbound message lists from a [`PromptCatalog`].
#[derive(Debug, Clone, Copy)]
pub struct ConversationAssembler<'a> {
    catalog: &'a PromptCatalog,
}

impl Default for ConversationAssembler<'static> {
    fn default() -> Self {
        Self::new(PromptCatalog::global())
    }
}

impl<'a> ConversationAssembler<'a> {
    pub fn new(catalog: &'a PromptCatalog) -> Self {
        Self { catalog }
    }

    /// Resolve the selector and prepend it to `history`.
    pub fn assemble(&self, selector: &PromptSelector, history: &[Message]) -> Vec<Message> {
        debug!(
            figure = %selector.figure,
            mode = %selector.mode,
            template = self.catalog.kind(selector).as_str(),
            history_len = history.len(),
            "Assembling conversation"
        );
        let system_prompt = self.catalog.resolve_selector(selector);
        Self::with_system_prompt(system_prompt, history)
    }

    pub fn assemble_request(&self, request: &ConversationRequest) -> Vec<Message> {
        self.assemble(&request.selector, &request.history)
    }

    /// Prepend an already-resolved system prompt to `history`.
    pub fn with_system_prompt(system_prompt: impl Into<String>, history: &[Message]) -> Vec<Message> {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend(history.iter().map(Message::projected));
        messages
    }
}
