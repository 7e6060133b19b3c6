pub mod backend;
pub mod catalog;
pub mod conversation;
pub mod event;
pub mod exchange;
pub mod message;
pub mod notice;

pub use backend::*;
pub use catalog::{Catalog, Mode, Model, builtin_models, find_mode};
pub use conversation::{Conversation, ConversationSettings, ToolEvent, preview};
pub use event::{ArcEventTx, Event, EventTx};
pub use exchange::{Exchange, Ticket};
pub use message::{Message, Role};
pub use notice::*;
