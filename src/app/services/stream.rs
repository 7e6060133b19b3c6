#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;

use std::sync::Arc;

use futures::StreamExt;
use tokio::task::JoinHandle;

use crate::backend::{ApiError, ArcBackend};
use crate::models::{ArcEventTx, Event, Exchange};

/// Runs exchanges against the backend, one task per exchange, and forwards
/// everything they produce into the app event queue.
pub struct StreamService {
    backend: ArcBackend,
    event_tx: ArcEventTx,
    worker: Option<JoinHandle<()>>,
}

impl StreamService {
    pub fn new(backend: ArcBackend, event_tx: ArcEventTx) -> Self {
        Self {
            backend,
            event_tx,
            worker: None,
        }
    }

    pub fn backend(&self) -> &ArcBackend {
        &self.backend
    }

    pub fn spawn(&mut self, exchange: Exchange) {
        let backend = Arc::clone(&self.backend);
        let event_tx = Arc::clone(&self.event_tx);
        self.worker = Some(tokio::spawn(async move {
            run_exchange(backend, exchange, event_tx).await;
        }));
    }

    /// Abort the worker without waiting for it.
    pub fn abort(&mut self) {
        if let Some(worker) = self.worker.take() {
            worker.abort();
        }
    }
}

async fn run_exchange(backend: ArcBackend, exchange: Exchange, event_tx: ArcEventTx) {
    let Exchange {
        ticket,
        request,
        cancel_token,
    } = exchange;

    let stream = tokio::select! {
        _ = cancel_token.cancelled() => return,
        stream = backend.chat_stream(request, cancel_token.clone()) => stream,
    };
    let mut stream = match stream {
        Ok(stream) => stream,
        Err(err) => {
            if !cancel_token.is_cancelled() {
                send(&event_tx, Event::StreamFailed(ticket, failure_detail(&err))).await;
            }
            return;
        }
    };

    loop {
        let item = tokio::select! {
            _ = cancel_token.cancelled() => {
                log::debug!("Worker of epoch {} cancelled", ticket.epoch);
                return;
            }
            item = stream.next() => item,
        };

        match item {
            Some(Ok(event)) => send(&event_tx, Event::Stream(ticket.clone(), event)).await,
            Some(Err(err)) => {
                send(&event_tx, Event::StreamFailed(ticket, failure_detail(&err))).await;
                return;
            }
            None => {
                send(&event_tx, Event::StreamFinished(ticket)).await;
                return;
            }
        }
    }
}

/// The server's own detail when it sent one, else the whole error chain.
fn failure_detail(err: &eyre::Report) -> String {
    match err.downcast_ref::<ApiError>() {
        Some(api) if !api.detail.is_empty() => api.detail.clone(),
        _ => format!("{:#}", err),
    }
}

async fn send(event_tx: &ArcEventTx, event: Event) {
    if let Err(err) = event_tx.send(event).await {
        log::error!("Failed to forward stream event: {}", err);
    }
}
