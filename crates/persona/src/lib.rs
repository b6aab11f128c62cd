//! Persona prompts for Agora.
//!
//! Maps a (figure, mode, topic) selector to a system prompt and prepends it to
//! the caller's history. Everything here is pure: no I/O, no randomness, no
//! failure paths. Unknown inputs fall back to generic templates.

pub mod assembler;
pub mod catalog;
mod templates;

pub use assembler::ConversationAssembler;
pub use catalog::{FigureSummary, PromptCatalog, TemplateKind, CLOSING_INSTRUCTIONS, resolve};
