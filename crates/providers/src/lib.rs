//! Upstream LLM access for Agora.
//!
//! The provider implements `agora_core::Provider`; the completion gateway
//! wraps it with the configured model settings.

pub mod completion;
pub mod openai_compat;

use std::sync::Arc;

use agora_config::AppConfig;
use agora_core::error::ProviderError;
use agora_core::provider::Provider;
use tracing::info;

pub use completion::{CompletionGateway, FragmentStream};
pub use openai_compat::OpenAiCompatProvider;

/// Build the process-wide provider handle from configuration.
///
/// Fails when no API key is configured.
pub fn build_from_config(config: &AppConfig) -> Result<Arc<dyn Provider>, ProviderError> {
    let api_key = config
        .api_key
        .clone()
        .filter(|key| !key.is_empty())
        .ok_or_else(|| {
            ProviderError::NotConfigured(
                "no API key — set api_key in config.toml or OPENAI_API_KEY".into(),
            )
        })?;

    let provider =
        OpenAiCompatProvider::new("openai", &config.base_url, api_key, config.request_timeout())?;

    info!(base_url = %config.base_url, model = %config.model, "Upstream provider ready");

    Ok(Arc::new(provider))
}
