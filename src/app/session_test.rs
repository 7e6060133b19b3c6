use super::*;
use crate::config::constants::DEFAULT_TITLE;
use crate::models::{Catalog, Role, ToolEvent};
use crate::store::Seed;

fn chunk(delta: &str) -> WireEvent {
    WireEvent::Chunk {
        delta: delta.to_string(),
    }
}

fn placeholder<'a>(store: &'a ConversationStore, ticket: &Ticket) -> &'a str {
    store
        .get(&ticket.conversation_id)
        .and_then(|c| c.message(&ticket.message_id))
        .map(|m| m.content())
        .unwrap()
}

#[test]
fn test_submit_builds_request() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::new(Some(Language::En));

    let exchange = session.submit(&mut store, "  hello  ").unwrap();
    assert_eq!(session.phase(), Phase::Streaming);
    assert_eq!(exchange.ticket.epoch, 1);
    assert_eq!(exchange.ticket.conversation_id, store.active_id());

    let request = &exchange.request;
    assert_eq!(request.model, "qwen3");
    assert_eq!(request.mode, "assistant");
    assert_eq!(request.lang, Some(Language::En));
    assert_eq!(request.messages.len(), 1);
    assert_eq!(request.messages[0].role, Role::User);
    assert_eq!(request.messages[0].content, "hello");
    assert!(request.options.allow_web_search);
    assert!(!request.options.deep_thinking);

    let convo = store.active();
    assert_eq!(convo.title(), "hello");
    assert_eq!(convo.messages().len(), 2);
    assert!(convo.messages()[1].is_assistant());
    assert_eq!(convo.messages()[1].id(), exchange.ticket.message_id);
    assert_eq!(convo.messages()[1].content(), "");
}

#[test]
fn test_submit_sends_full_history() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let first = session.submit(&mut store, "first").unwrap();
    session.apply(&mut store, &first.ticket, chunk("answer"));
    assert!(session.complete(&first.ticket));

    let second = session.submit(&mut store, "second").unwrap();
    assert_eq!(second.ticket.epoch, 2);
    let contents = second
        .request
        .messages
        .iter()
        .map(|m| m.content.as_str())
        .collect::<Vec<_>>();
    assert_eq!(contents, vec!["first", "answer", "second"]);
    assert_eq!(store.active().title(), "first");
}

#[test]
fn test_submit_rejections() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    assert!(session.submit(&mut store, " \n\t").is_none());
    assert_eq!(session.phase(), Phase::Idle);
    assert!(store.active().messages().is_empty());
    assert_eq!(store.active().title(), DEFAULT_TITLE);

    session.submit(&mut store, "one").unwrap();
    assert!(session.submit(&mut store, "two").is_none());
    assert_eq!(store.active().messages().len(), 2);
}

#[test]
fn test_long_message_title() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();
    let text = "帮我写一段产品更新公告".repeat(4);

    session.submit(&mut store, &text).unwrap();
    let title = store.active().title();
    assert_eq!(title.chars().count(), 37);
    assert!(title.ends_with('…'));
}

#[test]
fn test_end_to_end_exchange() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();
    let created_at = store.active().created_at();

    let exchange = session.submit(&mut store, "hello").unwrap();
    let ticket = exchange.ticket;

    assert!(matches!(
        session.apply(&mut store, &ticket, chunk("Thought: thinking")),
        Applied::Updated
    ));
    assert!(matches!(
        session.apply(&mut store, &ticket, chunk(" more")),
        Applied::Updated
    ));
    let tools = WireEvent::Tools {
        tool_events: vec![ToolEvent {
            tool_name: "search".to_string(),
            arguments: serde_json::json!({"q": "x"}),
            result: serde_json::json!("y"),
        }],
    };
    assert!(matches!(
        session.apply(&mut store, &ticket, tools),
        Applied::Updated
    ));
    assert!(session.complete(&ticket));

    assert_eq!(session.phase(), Phase::Completed);
    assert_eq!(placeholder(&store, &ticket), "Thought: thinking more");
    let convo = store.active();
    assert_eq!(convo.tool_events().len(), 1);
    assert_eq!(convo.tool_events()[0].tool_name, "search");
    assert!(convo.updated_at() > created_at);
}

#[test]
fn test_stop_replaces_partial_content() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let exchange = session.submit(&mut store, "hello").unwrap();
    let ticket = exchange.ticket;
    session.apply(&mut store, &ticket, chunk("Thought: partial"));

    assert!(session.stop(&mut store).is_some());
    assert!(exchange.cancel_token.is_cancelled());
    assert_eq!(session.phase(), Phase::Cancelled);
    assert_eq!(placeholder(&store, &ticket), STOPPED_NOTICE);

    // Late frames of the stopped exchange are ignored.
    assert!(matches!(
        session.apply(&mut store, &ticket, chunk(" late")),
        Applied::Stale
    ));
    assert!(!session.complete(&ticket));
    assert!(session.fail(&mut store, &ticket, "late").is_none());
    assert_eq!(placeholder(&store, &ticket), STOPPED_NOTICE);

    assert!(session.stop(&mut store).is_none());
}

#[test]
fn test_error_event_fails_exchange() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let exchange = session.submit(&mut store, "hello").unwrap();
    let ticket = exchange.ticket;
    session.apply(&mut store, &ticket, chunk("Thought: "));

    let applied = session.apply(
        &mut store,
        &ticket,
        WireEvent::Error {
            detail: "model overloaded".to_string(),
        },
    );
    let Applied::Failed(notice) = applied else {
        panic!("expected failure, got {:?}", applied);
    };
    assert!(notice.message().contains("model overloaded"));
    assert_eq!(session.phase(), Phase::Failed);
    assert!(exchange.cancel_token.is_cancelled());
    assert_eq!(placeholder(&store, &ticket), "[Error] model overloaded");
    assert!(session.stop(&mut store).is_none());
}

#[test]
fn test_transport_failure() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let ticket = session.submit(&mut store, "hello").unwrap().ticket;
    assert!(session.fail(&mut store, &ticket, "connection refused").is_some());
    assert_eq!(placeholder(&store, &ticket), "[Error] connection refused");
    assert!(session.fail(&mut store, &ticket, "again").is_none());
}

#[test]
fn test_stale_epoch_is_discarded() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let old = session.submit(&mut store, "one").unwrap().ticket;
    session.stop(&mut store);
    let new = session.submit(&mut store, "two").unwrap().ticket;

    assert!(matches!(
        session.apply(&mut store, &old, chunk("stale")),
        Applied::Stale
    ));
    assert!(matches!(
        session.apply(&mut store, &new, chunk("fresh")),
        Applied::Updated
    ));
    assert_eq!(placeholder(&store, &old), STOPPED_NOTICE);
    assert_eq!(placeholder(&store, &new), "fresh");
}

#[test]
fn test_deltas_follow_ticket_after_switch() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let ticket = session.submit(&mut store, "hello").unwrap().ticket;
    let other = store.create(Seed::default());
    assert_eq!(store.active_id(), other);

    session.apply(&mut store, &ticket, chunk("answer"));
    assert_eq!(placeholder(&store, &ticket), "answer");
    assert!(store.get(&other).unwrap().messages().is_empty());
}

#[test]
fn test_deltas_for_deleted_conversation_are_dropped() {
    let mut store = ConversationStore::new(Catalog::default());
    let mut session = Session::default();

    let ticket = session.submit(&mut store, "hello").unwrap().ticket;
    store.delete(&ticket.conversation_id).unwrap();

    assert!(matches!(
        session.apply(&mut store, &ticket, chunk("lost")),
        Applied::Stale
    ));
    assert!(session.stop(&mut store).is_some());
    assert_eq!(store.len(), 1);
}
