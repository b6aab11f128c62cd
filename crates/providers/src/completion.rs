//! Completion gateway — the single seam between Agora and the upstream model.
//!
//! Wraps a shared [`Provider`] with the fixed model settings and offers two
//! call shapes:
//!
//! - [`CompletionGateway::complete`]: one call, whole answer
//! - [`CompletionGateway::stream_complete`]: one call, answer as a
//!   [`FragmentStream`] of non-empty text fragments
//!
//! No retries happen here. Every failure is a [`ProviderError`].

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll, ready};

use agora_config::AppConfig;
use agora_core::error::ProviderError;
use agora_core::message::Message;
use agora_core::provider::{ChunkReceiver, Provider, ProviderRequest, Usage};
use futures::Stream;
use tracing::debug;

/// Fixed-model front for the upstream provider.
#[derive(Clone)]
pub struct CompletionGateway {
    provider: Arc<dyn Provider>,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
}

impl CompletionGateway {
    pub fn new(provider: Arc<dyn Provider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
            temperature: 0.7,
            max_tokens: None,
        }
    }

    /// Gateway with model, temperature and token limit taken from config.
    pub fn from_config(provider: Arc<dyn Provider>, config: &AppConfig) -> Self {
        Self::new(provider, &config.model)
            .with_temperature(config.temperature)
            .with_max_tokens(config.max_tokens)
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    fn request(&self, messages: Vec<Message>, stream: bool) -> ProviderRequest {
        ProviderRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            stream,
        }
    }

    /// Single-shot completion. An empty or whitespace-only answer is an error.
    pub async fn complete(&self, messages: Vec<Message>) -> Result<String, ProviderError> {
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "Requesting completion"
        );

        let response = self.provider.complete(self.request(messages, false)).await?;
        match &response.usage {
            Some(usage) => debug!(
                model = %response.model,
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                total_tokens = usage.total_tokens,
                "Completion received"
            ),
            None => debug!(model = %response.model, "Completion received"),
        }
        let content = response.message.content;

        if content.trim().is_empty() {
            return Err(ProviderError::EmptyResponse);
        }

        Ok(content)
    }

    /// Incremental completion. Each call opens a fresh upstream stream.
    pub async fn stream_complete(
        &self,
        messages: Vec<Message>,
    ) -> Result<FragmentStream, ProviderError> {
        debug!(
            provider = self.provider.name(),
            model = %self.model,
            messages = messages.len(),
            "Requesting streamed completion"
        );

        let rx = self.provider.stream(self.request(messages, true)).await?;
        Ok(FragmentStream::new(rx))
    }
}

/// Finite, single-use sequence of text fragments from one upstream call.
///
/// Yields `Ok(fragment)` for every chunk with non-empty content, in upstream
/// order. Ends after the upstream's final chunk, or after the first `Err`.
/// Token usage reported along the way is kept and readable via [`usage`].
///
/// [`usage`]: FragmentStream::usage
pub struct FragmentStream {
    rx: ChunkReceiver,
    finished: bool,
    usage: Option<Usage>,
}

impl FragmentStream {
    pub fn new(rx: ChunkReceiver) -> Self {
        Self {
            rx,
            finished: false,
            usage: None,
        }
    }

    /// Usage reported by the upstream so far, if any.
    pub fn usage(&self) -> Option<&Usage> {
        self.usage.as_ref()
    }
}

impl Stream for FragmentStream {
    type Item = Result<String, ProviderError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        loop {
            if self.finished {
                return Poll::Ready(None);
            }

            match ready!(self.rx.poll_recv(cx)) {
                None => {
                    self.finished = true;
                    return Poll::Ready(None);
                }
                Some(Err(e)) => {
                    self.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
                Some(Ok(chunk)) => {
                    if chunk.done {
                        self.finished = true;
                    }
                    if let Some(usage) = chunk.usage {
                        self.usage = Some(usage);
                    }
                    match chunk.content {
                        Some(content) if !content.is_empty() => {
                            return Poll::Ready(Some(Ok(content)));
                        }
                        // heartbeat / role-only / usage-only chunk
                        _ => continue,
                    }
                }
            }
        }
    }
}
