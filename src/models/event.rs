use std::sync::Arc;

use tokio::sync::mpsc;

use super::{NoticeMessage, Ticket, WireEvent};

#[derive(Debug)]
pub enum Event {
    Notice(NoticeMessage),

    /// A decoded frame of the exchange identified by the ticket.
    Stream(Ticket, WireEvent),
    StreamFinished(Ticket),
    StreamFailed(Ticket, String),

    Input(String),
    Interrupt,
    Quit,
}

#[async_trait::async_trait]
pub trait EventTx {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>>;
}

#[async_trait::async_trait]
impl EventTx for mpsc::Sender<Event> {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.send(event).await
    }
}

#[async_trait::async_trait]
impl EventTx for mpsc::UnboundedSender<Event> {
    async fn send(&self, event: Event) -> Result<(), mpsc::error::SendError<Event>> {
        self.send(event)
    }
}

pub type ArcEventTx = Arc<dyn EventTx + Send + Sync>;
