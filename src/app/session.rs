#[cfg(test)]
#[path = "session_test.rs"]
mod tests;

use tokio_util::sync::CancellationToken;

use crate::config::Language;
use crate::config::constants::{ERROR_NOTICE_PREFIX, STOPPED_NOTICE};
use crate::models::{
    ChatMessage, ChatRequest, Exchange, Message, NoticeMessage, Ticket, WireEvent, preview,
};
use crate::store::ConversationStore;
use crate::{error_notice, info_notice};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    #[default]
    Idle,
    Composing,
    Streaming,
    Completed,
    Cancelled,
    Failed,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Completed | Phase::Cancelled | Phase::Failed)
    }
}

/// What applying a stream event did.
#[derive(Debug)]
pub enum Applied {
    /// Old epoch, no exchange in flight, or its target is gone.
    Stale,
    Updated,
    Failed(NoticeMessage),
}

#[derive(Debug)]
struct InFlight {
    ticket: Ticket,
    cancel_token: CancellationToken,
}

/// Drives one exchange at a time against the store. Every stream event is
/// checked against the ticket of the exchange in flight before it mutates
/// anything.
#[derive(Debug, Default)]
pub struct Session {
    phase: Phase,
    epoch: u64,
    in_flight: Option<InFlight>,
    language: Option<Language>,
}

impl Session {
    pub fn new(language: Option<Language>) -> Self {
        Self {
            language,
            ..Default::default()
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn is_streaming(&self) -> bool {
        self.phase == Phase::Streaming
    }

    pub fn ticket(&self) -> Option<&Ticket> {
        self.in_flight.as_ref().map(|f| &f.ticket)
    }

    /// Start an exchange in the active conversation. Returns `None` when an
    /// exchange is already streaming or the input is blank.
    pub fn submit(&mut self, store: &mut ConversationStore, input: &str) -> Option<Exchange> {
        if self.is_streaming() {
            log::debug!("Rejecting input while epoch {} is streaming", self.epoch);
            return None;
        }
        let text = input.trim();
        if text.is_empty() {
            return None;
        }

        self.phase = Phase::Composing;
        let conversation_id = store.active_id().to_string();
        let placeholder = Message::new_assistant("");
        let message_id = placeholder.id().to_string();
        let lang = self.language;

        let request = store.update(&conversation_id, |c| {
            c.append_message(Message::new_user(text));
            if c.has_default_title() {
                c.set_title(preview(text));
            }
            let request = ChatRequest {
                model: c.model_id().to_string(),
                mode: c.mode_id().to_string(),
                messages: c.messages().iter().map(ChatMessage::from).collect(),
                options: c.settings().into(),
                lang,
            };
            c.append_message(placeholder);
            request
        });
        let Some(request) = request else {
            log::error!("Active conversation {} is missing", conversation_id);
            self.phase = Phase::Idle;
            return None;
        };

        self.epoch += 1;
        let ticket = Ticket {
            epoch: self.epoch,
            conversation_id,
            message_id,
        };
        let cancel_token = CancellationToken::new();
        self.in_flight = Some(InFlight {
            ticket: ticket.clone(),
            cancel_token: cancel_token.clone(),
        });
        self.phase = Phase::Streaming;
        log::debug!(
            "Exchange {} started in conversation {}",
            ticket.epoch,
            ticket.conversation_id
        );

        Some(Exchange {
            ticket,
            request,
            cancel_token,
        })
    }

    pub fn apply(
        &mut self,
        store: &mut ConversationStore,
        ticket: &Ticket,
        event: WireEvent,
    ) -> Applied {
        if !self.is_current(ticket) {
            log::debug!("Discarding stale event of epoch {}", ticket.epoch);
            return Applied::Stale;
        }

        match event {
            WireEvent::Chunk { delta } => {
                let exists = store
                    .get(&ticket.conversation_id)
                    .and_then(|c| c.message(&ticket.message_id))
                    .is_some();
                if !exists {
                    return Applied::Stale;
                }
                store.update(&ticket.conversation_id, |c| {
                    if let Some(msg) = c.message_mut(&ticket.message_id) {
                        msg.append(&delta);
                    }
                });
                Applied::Updated
            }
            WireEvent::Tools { tool_events } => {
                log::debug!("Epoch {}: {} tool events", ticket.epoch, tool_events.len());
                match store.update(&ticket.conversation_id, |c| c.append_tool_events(tool_events)) {
                    Some(_) => Applied::Updated,
                    None => Applied::Stale,
                }
            }
            WireEvent::Error { detail } => match self.fail(store, ticket, &detail) {
                Some(notice) => Applied::Failed(notice),
                None => Applied::Stale,
            },
        }
    }

    /// The stream ended normally. Returns false for stale tickets.
    pub fn complete(&mut self, ticket: &Ticket) -> bool {
        if !self.is_current(ticket) {
            return false;
        }
        self.in_flight = None;
        self.phase = Phase::Completed;
        log::debug!("Exchange {} completed", ticket.epoch);
        true
    }

    /// Cancel the exchange in flight and replace its placeholder with the stop
    /// notice.
    pub fn stop(&mut self, store: &mut ConversationStore) -> Option<NoticeMessage> {
        if !self.is_streaming() {
            return None;
        }
        let in_flight = self.in_flight.take()?;
        in_flight.cancel_token.cancel();
        self.phase = Phase::Cancelled;
        overwrite(store, &in_flight.ticket, STOPPED_NOTICE);
        log::debug!("Exchange {} stopped", in_flight.ticket.epoch);
        Some(info_notice!("Generation stopped"))
    }

    pub fn fail(
        &mut self,
        store: &mut ConversationStore,
        ticket: &Ticket,
        detail: &str,
    ) -> Option<NoticeMessage> {
        if !self.is_current(ticket) {
            return None;
        }
        if let Some(in_flight) = self.in_flight.take() {
            in_flight.cancel_token.cancel();
        }
        self.phase = Phase::Failed;
        overwrite(store, ticket, &format!("{} {}", ERROR_NOTICE_PREFIX, detail));
        log::error!("Exchange {} failed: {}", ticket.epoch, detail);
        Some(error_notice!(format!("Generation failed: {}", detail)))
    }

    fn is_current(&self, ticket: &Ticket) -> bool {
        self.is_streaming()
            && self
                .in_flight
                .as_ref()
                .is_some_and(|f| f.ticket.epoch == ticket.epoch)
    }
}

fn overwrite(store: &mut ConversationStore, ticket: &Ticket, content: &str) {
    store.update(&ticket.conversation_id, |c| {
        if let Some(msg) = c.message_mut(&ticket.message_id) {
            msg.set_content(content);
        }
    });
}
