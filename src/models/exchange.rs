use tokio_util::sync::CancellationToken;

use super::ChatRequest;

/// Identifies the exchange a stream event belongs to. Events are only applied
/// while their epoch is the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ticket {
    pub epoch: u64,
    pub conversation_id: String,
    pub message_id: String,
}

/// Everything a stream worker needs to run one exchange.
#[derive(Debug, Clone)]
pub struct Exchange {
    pub ticket: Ticket,
    pub request: ChatRequest,
    pub cancel_token: CancellationToken,
}
