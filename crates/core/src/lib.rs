//! # Agora Core
//!
//! Domain types, traits, and error definitions for the Agora persona chat relay.
//! This crate has **zero framework dependencies** — it defines the domain model
//! that the other crates implement against.
//!
//! - [`message`]: chat turns and roles
//! - [`selector`]: the (figure, mode, topic) triple that picks a system prompt
//! - [`provider`]: the trait every upstream completion backend implements
//! - [`error`]: error types shared across the workspace

pub mod error;
pub mod message;
pub mod provider;
pub mod selector;

// Re-export key types at crate root for ergonomics
pub use error::{Error, ProviderError, Result};
pub use message::{Message, Role};
pub use provider::{ChunkReceiver, Provider, ProviderRequest, ProviderResponse, StreamChunk, Usage};
pub use selector::{ConversationRequest, PromptSelector, SCENARIO_MODE};
