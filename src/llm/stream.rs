use futures::future::{AbortHandle, Abortable};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::llm::message::GenerationRequest;
use crate::providers::traits::GenerationProvider;

/// What the consumer of a relayed generation sees.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationStreamEvent {
    Delta(String),
    Completed,
    Failed(String),
}

impl GenerationStreamEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, GenerationStreamEvent::Delta(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayOutcome {
    Success,
    Error(String),
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelayState {
    Idle,
    Requesting,
    Streaming,
    Closed(RelayOutcome),
}

/// Forwards a provider's streamed answer to a consumer as it arrives.
#[derive(Clone)]
pub struct StreamingRelay {
    provider: Arc<dyn GenerationProvider>,
    buffer: usize,
}

impl StreamingRelay {
    pub fn new(provider: Arc<dyn GenerationProvider>, buffer: usize) -> Self {
        Self {
            provider,
            buffer: buffer.max(1),
        }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Submit `request` and return the consumer side of the relay.
    ///
    /// Must be called inside a tokio runtime. Dropping the returned stream aborts
    /// the upstream call.
    pub fn start(&self, request: GenerationRequest) -> RelayStream {
        let (tx, rx) = mpsc::channel(self.buffer);
        let state = Arc::new(watch::Sender::new(RelayState::Idle));
        let (abort, registration) = AbortHandle::new_pair();

        let task = relay(Arc::clone(&self.provider), request, tx, Arc::clone(&state));
        tokio::spawn(Abortable::new(task, registration));

        RelayStream {
            events: rx,
            state,
            abort,
            finished: false,
        }
    }
}

async fn relay(
    provider: Arc<dyn GenerationProvider>,
    request: GenerationRequest,
    tx: mpsc::Sender<GenerationStreamEvent>,
    state: Arc<watch::Sender<RelayState>>,
) {
    advance(&state, RelayState::Requesting);
    debug!(provider = provider.name(), model = %request.model, "relay requesting");

    let mut forwarded = 0usize;
    let outcome = match provider.stream(request).await {
        Ok(mut upstream) => {
            advance(&state, RelayState::Streaming);
            loop {
                match upstream.next().await {
                    Some(Ok(delta)) => {
                        if delta.is_empty() {
                            continue;
                        }
                        if tx.send(GenerationStreamEvent::Delta(delta)).await.is_err() {
                            debug!(forwarded, "consumer disconnected, dropping upstream");
                            advance(&state, RelayState::Closed(RelayOutcome::Cancelled));
                            return;
                        }
                        forwarded += 1;
                    }
                    Some(Err(e)) => break Err(e),
                    None => break Ok(()),
                }
            }
        }
        Err(e) => Err(e),
    };

    let terminal = match outcome {
        Ok(()) => {
            info!(provider = provider.name(), forwarded, "relay completed");
            advance(&state, RelayState::Closed(RelayOutcome::Success));
            GenerationStreamEvent::Completed
        }
        Err(e) => {
            warn!(provider = provider.name(), forwarded, error = %e, "relay failed");
            advance(&state, RelayState::Closed(RelayOutcome::Error(e.to_string())));
            GenerationStreamEvent::Failed(e.to_string())
        }
    };
    let _ = tx.send(terminal).await;
}

/// Move to `next` unless the relay is already closed. The first close wins.
fn advance(state: &watch::Sender<RelayState>, next: RelayState) {
    state.send_if_modified(|current| {
        if matches!(current, RelayState::Closed(_)) {
            return false;
        }
        *current = next;
        true
    });
}

/// Consumer side of a relay.
///
/// Yields deltas in arrival order followed by exactly one terminal event, then ends.
#[derive(Debug)]
pub struct RelayStream {
    events: mpsc::Receiver<GenerationStreamEvent>,
    state: Arc<watch::Sender<RelayState>>,
    abort: AbortHandle,
    finished: bool,
}

impl RelayStream {
    pub fn state(&self) -> RelayState {
        self.state.borrow().clone()
    }

    /// Abort the upstream call. The stream then ends without further deltas.
    pub fn cancel(&self) {
        advance(&self.state, RelayState::Closed(RelayOutcome::Cancelled));
        self.abort.abort();
    }
}

impl Stream for RelayStream {
    type Item = GenerationStreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.events.poll_recv(cx) {
            Poll::Ready(Some(event)) => {
                if event.is_terminal() {
                    self.finished = true;
                }
                Poll::Ready(Some(event))
            }
            // The task went away without a terminal event (aborted or panicked).
            Poll::Ready(None) => {
                self.finished = true;
                advance(&self.state, RelayState::Closed(RelayOutcome::Cancelled));
                Poll::Ready(Some(GenerationStreamEvent::Failed(
                    "relay ended without completing".to_string(),
                )))
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        self.cancel();
    }
}
