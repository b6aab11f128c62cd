//! Response delivery — buffered JSON or paced SSE frames.
//!
//! Streaming delivery follows a fixed state machine:
//!
//! ```text
//! Init → HeadersSent → (FrameSent)* → TerminalSent → Closed
//!                                   ↘ Aborted      → Closed
//! ```
//!
//! A completed stream ends with exactly one `data: [DONE]` frame. An upstream
//! failure after headers are out cannot change the status code, so the stream
//! is cut without a terminal frame (or, when `error_frame` is enabled, after a
//! single `event: error` frame).

use std::time::Duration;

use agora_config::StreamingConfig;
use agora_core::error::ProviderError;
use agora_core::message::Message;
use agora_core::provider::Usage;
use agora_providers::CompletionGateway;
use async_trait::async_trait;
use axum::response::sse::{Event as SseEvent, Sse};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{Instrument, debug, error, info, trace, warn};

/// Data payload of the terminal frame.
pub const DONE_MARKER: &str = "[DONE]";

/// Body of a successful buffered delivery.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BufferedResponse {
    pub response: String,
}

/// One unit written to a streaming response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    Fragment(String),
    /// Terminal marker
    Done,
    /// Structured failure notice, only sent when error frames are enabled
    Error(String),
}

impl StreamFrame {
    /// Render as an SSE event: fragments as JSON strings, the terminal frame
    /// as a bare `[DONE]`.
    pub fn to_event(&self) -> SseEvent {
        match self {
            StreamFrame::Fragment(text) => {
                SseEvent::default().data(serde_json::Value::String(text.clone()).to_string())
            }
            StreamFrame::Done => SseEvent::default().data(DONE_MARKER),
            StreamFrame::Error(message) => SseEvent::default()
                .event("error")
                .data(serde_json::json!({ "error": message }).to_string()),
        }
    }
}

/// Streaming delivery states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryState {
    Init,
    HeadersSent,
    FrameSent,
    TerminalSent,
    Aborted,
    Closed,
}

impl DeliveryState {
    pub fn can_advance_to(self, next: DeliveryState) -> bool {
        use DeliveryState::*;
        matches!(
            (self, next),
            (Init, HeadersSent)
                | (HeadersSent | FrameSent, FrameSent)
                | (HeadersSent | FrameSent, TerminalSent)
                | (Init | HeadersSent | FrameSent, Aborted)
                | (TerminalSent | Aborted, Closed)
                | (Closed, Closed)
        )
    }
}

/// How a sink should end the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Closure {
    /// Finish the body normally
    Graceful,
    /// Cut the connection; the client sees a truncated stream
    Abrupt,
}

/// The client is gone; nothing more can be written.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("client disconnected")]
pub struct SinkClosed;

/// Error injected into the SSE body to reset the connection.
#[derive(Debug, Clone, Copy, thiserror::Error)]
#[error("upstream stream aborted")]
pub struct StreamAborted;

/// Transport that receives stream frames.
#[async_trait]
pub trait FrameSink: Send {
    /// Make the response framing visible to the client before any fragment.
    async fn open(&mut self) -> Result<(), SinkClosed>;

    async fn send(&mut self, frame: StreamFrame) -> Result<(), SinkClosed>;

    /// End the response. Must be idempotent.
    async fn close(&mut self, closure: Closure);
}

/// SSE body stream produced by [`ChannelSink`].
pub type EventStream = ReceiverStream<Result<SseEvent, StreamAborted>>;

/// [`FrameSink`] feeding an axum [`Sse`] body through a bounded channel.
///
/// Dropping the sender ends the body; an `Err` item aborts it.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Result<SseEvent, StreamAborted>>>,
}

impl ChannelSink {
    pub fn channel(capacity: usize) -> (Self, EventStream) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx: Some(tx) }, ReceiverStream::new(rx))
    }
}

#[async_trait]
impl FrameSink for ChannelSink {
    async fn open(&mut self) -> Result<(), SinkClosed> {
        // axum writes status and headers as soon as the handler returns the
        // Sse response; the body is only polled afterwards.
        match &self.tx {
            Some(tx) if !tx.is_closed() => Ok(()),
            _ => Err(SinkClosed),
        }
    }

    async fn send(&mut self, frame: StreamFrame) -> Result<(), SinkClosed> {
        let tx = self.tx.as_ref().ok_or(SinkClosed)?;
        tx.send(Ok(frame.to_event())).await.map_err(|_| SinkClosed)
    }

    async fn close(&mut self, closure: Closure) {
        let Some(tx) = self.tx.take() else {
            return;
        };
        if closure == Closure::Abrupt {
            let _ = tx.send(Err(StreamAborted)).await;
        }
    }
}

/// What a streaming delivery did.
#[derive(Debug, Clone)]
pub struct DeliveryOutcome {
    /// Last state before `Closed`
    pub last_state: DeliveryState,
    pub state: DeliveryState,
    pub fragments: usize,
    /// Token usage, when the upstream reported it
    pub usage: Option<Usage>,
}

impl DeliveryOutcome {
    pub fn completed(&self) -> bool {
        self.last_state == DeliveryState::TerminalSent
    }
}

struct StreamRun {
    state: DeliveryState,
    last_state: DeliveryState,
    fragments: usize,
    usage: Option<Usage>,
}

impl StreamRun {
    fn new() -> Self {
        Self {
            state: DeliveryState::Init,
            last_state: DeliveryState::Init,
            fragments: 0,
            usage: None,
        }
    }

    fn advance(&mut self, next: DeliveryState) {
        debug_assert!(
            self.state.can_advance_to(next),
            "illegal delivery transition {:?} -> {next:?}",
            self.state
        );
        trace!(from = ?self.state, to = ?next, "Delivery transition");
        if next != DeliveryState::Closed {
            self.last_state = next;
        }
        self.state = next;
    }

    fn outcome(self) -> DeliveryOutcome {
        DeliveryOutcome {
            last_state: self.last_state,
            state: self.state,
            fragments: self.fragments,
            usage: self.usage,
        }
    }
}

/// Drains the completion gateway to the client.
#[derive(Clone)]
pub struct ResponseDeliverer {
    gateway: CompletionGateway,
    frame_delay: Duration,
    error_frame: bool,
}

impl ResponseDeliverer {
    pub fn new(gateway: CompletionGateway) -> Self {
        Self {
            gateway,
            frame_delay: Duration::from_millis(100),
            error_frame: false,
        }
    }

    pub fn from_config(gateway: CompletionGateway, config: &StreamingConfig) -> Self {
        Self::new(gateway)
            .with_frame_delay(config.frame_delay())
            .with_error_frame(config.error_frame)
    }

    /// Pause inserted after every fragment frame.
    pub fn with_frame_delay(mut self, delay: Duration) -> Self {
        self.frame_delay = delay;
        self
    }

    pub fn with_error_frame(mut self, enabled: bool) -> Self {
        self.error_frame = enabled;
        self
    }

    /// Buffered delivery: the whole answer or the upstream error, never both.
    pub async fn buffered(&self, messages: Vec<Message>) -> Result<BufferedResponse, ProviderError> {
        let response = self.gateway.complete(messages).await?;
        debug!(chars = response.len(), "Buffered completion ready");
        Ok(BufferedResponse { response })
    }

    /// Streaming delivery over SSE.
    ///
    /// Returns immediately so axum can send headers; the upstream call runs
    /// in a spawned task that feeds the body.
    pub fn sse(&self, messages: Vec<Message>) -> Sse<EventStream> {
        let (mut sink, events) = ChannelSink::channel(16);
        let deliverer = self.clone();

        tokio::spawn(
            async move {
                let outcome = deliverer.stream(messages, &mut sink).await;
                let total_tokens = outcome.usage.as_ref().map(|u| u.total_tokens);
                if outcome.completed() {
                    info!(fragments = outcome.fragments, total_tokens, "Stream completed");
                } else {
                    warn!(
                        fragments = outcome.fragments,
                        last_state = ?outcome.last_state,
                        total_tokens,
                        "Stream ended without terminal frame"
                    );
                }
            }
            .in_current_span(),
        );

        Sse::new(events)
    }

    /// Run one streaming delivery into `sink`.
    pub async fn stream<S>(&self, messages: Vec<Message>, sink: &mut S) -> DeliveryOutcome
    where
        S: FrameSink + ?Sized,
    {
        let mut run = StreamRun::new();

        if sink.open().await.is_err() {
            info!("Client gone before stream opened");
            return Self::close(sink, run, DeliveryState::Aborted, Closure::Abrupt).await;
        }
        run.advance(DeliveryState::HeadersSent);

        let mut fragments = match self.gateway.stream_complete(messages).await {
            Ok(fragments) => fragments,
            Err(e) => return self.abort(sink, run, e).await,
        };

        while let Some(item) = fragments.next().await {
            let text = match item {
                Ok(text) => text,
                Err(e) => {
                    run.usage = fragments.usage().cloned();
                    return self.abort(sink, run, e).await;
                }
            };

            if sink.send(StreamFrame::Fragment(text)).await.is_err() {
                info!(fragments = run.fragments, "Client disconnected mid-stream");
                return Self::close(sink, run, DeliveryState::Aborted, Closure::Abrupt).await;
            }
            run.fragments += 1;
            run.advance(DeliveryState::FrameSent);

            if !self.frame_delay.is_zero() {
                tokio::time::sleep(self.frame_delay).await;
            }
        }

        run.usage = fragments.usage().cloned();

        if sink.send(StreamFrame::Done).await.is_err() {
            info!(fragments = run.fragments, "Client disconnected before terminal frame");
            return Self::close(sink, run, DeliveryState::Aborted, Closure::Abrupt).await;
        }

        debug!(fragments = run.fragments, usage = ?run.usage, "Stream delivered");
        Self::close(sink, run, DeliveryState::TerminalSent, Closure::Graceful).await
    }

    async fn abort<S>(&self, sink: &mut S, run: StreamRun, err: ProviderError) -> DeliveryOutcome
    where
        S: FrameSink + ?Sized,
    {
        error!(error = %err, fragments = run.fragments, "Upstream failed during streaming");

        if self.error_frame {
            let notice = StreamFrame::Error("An error occurred while streaming the response.".into());
            let closure = match sink.send(notice).await {
                Ok(()) => Closure::Graceful,
                Err(SinkClosed) => Closure::Abrupt,
            };
            return Self::close(sink, run, DeliveryState::Aborted, closure).await;
        }

        Self::close(sink, run, DeliveryState::Aborted, Closure::Abrupt).await
    }

    async fn close<S>(
        sink: &mut S,
        mut run: StreamRun,
        end: DeliveryState,
        closure: Closure,
    ) -> DeliveryOutcome
    where
        S: FrameSink + ?Sized,
    {
        run.advance(end);
        sink.close(closure).await;
        run.advance(DeliveryState::Closed);
        run.outcome()
    }
}
