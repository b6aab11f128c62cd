//! Prompt catalog — the (figure, mode, topic) → system prompt lookup.
//!
//! Resolution is a two-level table lookup: figure first, then mode within
//! that figure. Anything the table does not cover lands on a single fallback
//! policy:
//!
//! - mode `"scenario"` → scenario-advice template for the figure
//! - otherwise → generic conversation template for the figure
//!
//! Topics are substituted literally; no escaping is applied. Every prompt
//! ends with [`CLOSING_INSTRUCTIONS`].

use std::collections::HashMap;
use std::sync::LazyLock;

use agora_core::selector::PromptSelector;
use serde::Serialize;

use crate::templates::{self, FIGURE, TOPIC};

/// Fixed block appended to every resolved prompt.
pub const CLOSING_INSTRUCTIONS: &str = templates::CLOSING;

static BUILTIN: LazyLock<PromptCatalog> = LazyLock::new(PromptCatalog::new);

/// Which template a selector resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateKind {
    /// A figure-specific template from the catalog
    Catalog,
    /// Reserved `"scenario"` mode on an uncatalogued pair
    Scenario,
    /// Generic per-figure conversation
    Generic,
}

impl TemplateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TemplateKind::Catalog => "catalog",
            TemplateKind::Scenario => "scenario",
            TemplateKind::Generic => "generic",
        }
    }
}

/// A figure and the modes it supports, for listing endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FigureSummary {
    pub name: String,
    pub modes: Vec<String>,
}

/// Immutable lookup table of persona templates.
///
/// Cheap to share: build once and hand out `&PromptCatalog` or use
/// [`PromptCatalog::global`].
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    figures: HashMap<&'static str, HashMap<&'static str, &'static str>>,
}

impl Default for PromptCatalog {
    fn default() -> Self {
        Self::new()
    }
}

impl PromptCatalog {
    /// Build the catalog from the built-in templates.
    pub fn new() -> Self {
        let figures = templates::FIGURES
            .iter()
            .map(|figure| (figure.name, figure.modes.iter().copied().collect()))
            .collect();
        Self { figures }
    }

    /// The process-wide built-in catalog.
    pub fn global() -> &'static PromptCatalog {
        &BUILTIN
    }

    /// Resolve a system prompt. Never fails; see module docs for fallbacks.
    pub fn resolve_selector(&self, selector: &PromptSelector) -> String {
        let figure = selector.figure.as_str();
        let body = match self.template(figure, &selector.mode) {
            Some(template) => template.replace(TOPIC, selector.topic_or_empty()),
            None if selector.is_scenario() => templates::SCENARIO.replace(FIGURE, figure),
            None => templates::GENERIC.replace(FIGURE, figure),
        };
        with_closing(body)
    }

    pub fn resolve(&self, figure: &str, mode: &str, topic: Option<&str>) -> String {
        let mut selector = PromptSelector::new(figure, mode);
        selector.topic = topic.map(str::to_string);
        self.resolve_selector(&selector)
    }

    /// Report which template `resolve_selector` would use, without building it.
    pub fn kind(&self, selector: &PromptSelector) -> TemplateKind {
        match self.template(&selector.figure, &selector.mode) {
            Some(_) => TemplateKind::Catalog,
            None if selector.is_scenario() => TemplateKind::Scenario,
            None => TemplateKind::Generic,
        }
    }

    /// Multi-perspective exploration of a theme, used by the thematic opener.
    pub fn thematic(&self, topic: &str) -> String {
        with_closing(templates::THEMATIC.replace(TOPIC, topic))
    }

    /// Debate opener where the philosopher throws down the gauntlet.
    pub fn battle(&self, philosopher: &str) -> String {
        with_closing(templates::BATTLE.replace(FIGURE, philosopher))
    }

    /// Figures in catalog order, each with its modes in catalog order.
    pub fn figures(&self) -> Vec<FigureSummary> {
        templates::FIGURES
            .iter()
            .filter(|figure| self.figures.contains_key(figure.name))
            .map(|figure| FigureSummary {
                name: figure.name.to_string(),
                modes: figure.modes.iter().map(|(mode, _)| mode.to_string()).collect(),
            })
            .collect()
    }

    fn template(&self, figure: &str, mode: &str) -> Option<&'static str> {
        self.figures.get(figure)?.get(mode).copied()
    }
}

fn with_closing(mut body: String) -> String {
    body.push_str(CLOSING_INSTRUCTIONS);
    body
}

/// Resolve against the built-in catalog.
pub fn resolve(figure: &str, mode: &str, topic: Option<&str>) -> String {
    PromptCatalog::global().resolve(figure, mode, topic)
}
