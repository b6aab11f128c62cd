//! Prompt selection inputs.

use crate::message::Message;
use serde::{Deserialize, Serialize};

/// Mode identifier reserved for the scenario-advice fallback.
pub const SCENARIO_MODE: &str = "scenario";

/// Which persona prompt to generate: a figure, a conversation mode, and an
/// optional free-text topic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptSelector {
    pub figure: String,
    pub mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub topic: Option<String>,
}

impl PromptSelector {
    pub fn new(figure: impl Into<String>, mode: impl Into<String>) -> Self {
        Self {
            figure: figure.into(),
            mode: mode.into(),
            topic: None,
        }
    }

    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        self.topic = Some(topic.into());
        self
    }

    /// Topic text for literal substitution; absent topics embed as "".
    pub fn topic_or_empty(&self) -> &str {
        self.topic.as_deref().unwrap_or("")
    }

    pub fn is_scenario(&self) -> bool {
        self.mode == SCENARIO_MODE
    }
}

/// One inbound chat call: the selector plus the caller's full history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationRequest {
    pub selector: PromptSelector,
    #[serde(default)]
    pub history: Vec<Message>,
}

impl ConversationRequest {
    pub fn new(selector: PromptSelector, history: Vec<Message>) -> Self {
        Self { selector, history }
    }

    /// A request that opens a dialogue with no prior turns.
    pub fn opening(selector: PromptSelector) -> Self {
        Self::new(selector, Vec::new())
    }
}
