use super::*;
use crate::models::find_mode;

#[test]
fn test_preview_collapses_whitespace() {
    assert_eq!(preview("  hello \n\t world  "), "hello world");
    assert_eq!(preview(""), "");
}

#[test]
fn test_preview_truncates_long_text() {
    let text = "帮我写一段产品更新公告".repeat(4);
    let ret = preview(&text);
    assert_eq!(ret.chars().count(), 37);
    assert!(ret.ends_with('…'));
    assert_eq!(
        ret.chars().take(36).collect::<String>(),
        text.chars().take(36).collect::<String>()
    );

    let short = "帮我写一段产品更新公告".repeat(3);
    assert_eq!(preview(&short), short);

    let exact = "a".repeat(36);
    assert_eq!(preview(&exact), exact);
}

#[test]
fn test_touch_strictly_advances() {
    let mut convo = Conversation::default();
    let created_at = convo.created_at();
    assert_eq!(convo.updated_at(), created_at);

    convo.touch();
    let first = convo.updated_at();
    assert!(first > created_at);

    convo.touch();
    assert!(convo.updated_at() > first);
}

#[test]
fn test_with_updated_at_is_clamped() {
    let created_at = Utc::now();
    let convo = Conversation::default()
        .with_created_at(created_at)
        .with_updated_at(created_at - TimeDelta::seconds(10));
    assert_eq!(convo.updated_at(), created_at);
}

#[test]
fn test_duplicate_regenerates_ids() {
    let mut convo = Conversation::default()
        .with_title("Release notes")
        .with_pinned(true)
        .with_tool_events(vec![ToolEvent {
            tool_name: "search".to_string(),
            arguments: serde_json::json!({"q": "x"}),
            result: serde_json::json!("y"),
        }]);
    convo.append_message(Message::new_user("hi"));
    convo.append_message(Message::new_assistant("hello"));
    convo.settings_mut().deep_thinking = true;

    let copy = convo.duplicate();
    assert_ne!(copy.id(), convo.id());
    assert_eq!(copy.title(), "Release notes (copy)");
    assert!(!copy.pinned());
    assert_eq!(copy.messages().len(), 2);
    for (a, b) in copy.messages().iter().zip(convo.messages()) {
        assert_ne!(a.id(), b.id());
        assert_eq!(a.content(), b.content());
        assert_eq!(a.role(), b.role());
    }
    assert_eq!(copy.tool_events(), convo.tool_events());
    assert_eq!(copy.settings(), convo.settings());
    assert!(copy.created_at() >= convo.created_at());
}

#[test]
fn test_set_mode_resets_settings() {
    let mut convo = Conversation::default();
    convo.settings_mut().allow_web_search = false;

    let reasoning = find_mode("reasoning").unwrap();
    convo.set_mode(reasoning);
    assert_eq!(convo.mode_id(), "reasoning");
    assert_eq!(convo.settings(), &reasoning.defaults);
}

#[test]
fn test_serialize_uses_camel_case() {
    let convo = Conversation::default().with_id("c1");
    let value = serde_json::to_value(&convo).unwrap();
    assert_eq!(value["id"], "c1");
    assert_eq!(value["modeId"], "assistant");
    assert_eq!(value["modelId"], "qwen3");
    assert_eq!(value["settings"]["allowWebSearch"], true);
    assert!(value["createdAt"].is_i64());
    assert!(value["toolEvents"].as_array().unwrap().is_empty());
}
