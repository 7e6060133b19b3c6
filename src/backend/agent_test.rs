use futures::StreamExt;

use super::*;
use crate::backend::{MockBackend, fetch_models};
use crate::config::Language;
use crate::models::{ChatMessage, ChatOptions, Role};

fn chat_request() -> ChatRequest {
    ChatRequest {
        model: "qwen3".to_string(),
        mode: "assistant".to_string(),
        messages: vec![ChatMessage {
            role: Role::User,
            content: "hello".to_string(),
        }],
        options: ChatOptions {
            deep_thinking: false,
            allow_web_search: true,
            allow_image_tool: true,
        },
        lang: Some(Language::Zh),
    }
}

#[tokio::test]
async fn test_list_models() {
    let mut server = mockito::Server::new_async().await;
    let handler = server
        .mock("GET", "/api/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"models":[{"id":"qwen3","name":"Qwen3","tags":["default"]},{"id":"qwen-max"}]}"#,
        )
        .expect(1)
        .create_async()
        .await;

    let agent = AgentServer::default().with_endpoint(&server.url());
    let models = agent.list_models().await.expect("Failed to list models");

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].id(), "qwen3");
    assert_eq!(models[0].name(), "Qwen3");
    assert_eq!(models[0].tags(), &["default".to_string()]);
    assert_eq!(models[1].name(), "qwen-max");
    handler.assert_async().await;
}

#[tokio::test]
async fn test_list_models_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/api/models")
        .with_status(503)
        .with_body(r#"{"detail":"model registry offline"}"#)
        .create_async()
        .await;

    let agent = AgentServer::default().with_endpoint(&server.url());
    let err = agent.list_models().await.unwrap_err();
    let err = err.downcast_ref::<ApiError>().expect("expected ApiError");
    assert_eq!(err.http_code, 503);
    assert_eq!(err.detail, "model registry offline");
}

#[tokio::test]
async fn test_health() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("GET", "/health")
        .with_status(200)
        .with_body(r#"{"status":"ok"}"#)
        .create_async()
        .await;

    let agent = AgentServer::default().with_endpoint(&format!("{}/", server.url()));
    assert_eq!(agent.health().await.unwrap(), "ok");
}

#[tokio::test]
async fn test_chat_stream() {
    let body = concat!(
        "data: {\"type\":\"chunk\",\"delta\":\"Thought: thinking\"}\n\n",
        "data: {\"type\":\"chunk\",\"delta\":\" more\"}\n\n",
        "data: {\"type\":\"tools\",\"tool_events\":[{\"tool_name\":\"search\",\"arguments\":{\"q\":\"x\"},\"result\":\"y\"}]}\n\n",
        "data: [DONE]\n\n",
    );

    let mut server = mockito::Server::new_async().await;
    let handler = server
        .mock("POST", "/api/chat/stream")
        .match_header("content-type", "application/json")
        .match_body(mockito::Matcher::Json(serde_json::json!({
            "model": "qwen3",
            "mode": "assistant",
            "messages": [{"role": "user", "content": "hello"}],
            "options": {
                "deep_thinking": false,
                "allow_web_search": true,
                "allow_image_tool": true
            },
            "lang": "zh"
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(body)
        .expect(1)
        .create_async()
        .await;

    let agent = AgentServer::default().with_endpoint(&server.url());
    let events = agent
        .chat_stream(chat_request(), CancellationToken::new())
        .await
        .expect("Failed to open chat stream")
        .map(|e| e.unwrap())
        .collect::<Vec<_>>()
        .await;

    assert_eq!(events.len(), 3);
    assert_eq!(
        events[0],
        WireEvent::Chunk {
            delta: "Thought: thinking".to_string()
        }
    );
    assert!(matches!(&events[2], WireEvent::Tools { tool_events } if tool_events.len() == 1));
    handler.assert_async().await;
}

#[tokio::test]
async fn test_chat_stream_http_error() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/api/chat/stream")
        .with_status(422)
        .with_body(r#"{"detail":[{"loc":["body","model"],"msg":"field required"}]}"#)
        .create_async()
        .await;

    let agent = AgentServer::default().with_endpoint(&server.url());
    let err = match agent
        .chat_stream(chat_request(), CancellationToken::new())
        .await
    {
        Ok(_) => panic!("expected an error"),
        Err(err) => err,
    };
    let err = err.downcast_ref::<ApiError>().expect("expected ApiError");
    assert_eq!(err.http_code, 422);
    assert!(err.detail.contains("field required"));
}

#[tokio::test]
async fn test_chat_stream_requires_model() {
    let mut request = chat_request();
    request.model.clear();
    let agent = AgentServer::default();
    assert!(agent.chat_stream(request, CancellationToken::new()).await.is_err());
}

#[test]
fn test_api_error_from_body() {
    let err = ApiError::from_body(500, r#"{"detail":"boom"}"#);
    assert_eq!(err.detail, "boom");
    assert_eq!(err.to_string(), "agent error (500): boom");

    let err = ApiError::from_body(502, "Bad Gateway\n");
    assert_eq!(err.detail, "Bad Gateway");

    let err = ApiError::from_body(500, "");
    assert_eq!(err.to_string(), "agent error (500)");
}

#[test]
fn test_from_backend_config() {
    let config = BackendConfig {
        endpoint: "http://agent.internal:8000/".to_string(),
        timeout_secs: Some(30),
        ..Default::default()
    };
    let agent = AgentServer::from(&config);
    assert_eq!(agent.endpoint(), "http://agent.internal:8000");
    assert_eq!(agent.timeout(), Some(time::Duration::from_secs(30)));
}

#[tokio::test]
async fn test_fetch_models_falls_back_to_builtin() {
    let mut backend = MockBackend::new();
    backend.expect_name().return_const("mock".to_string());
    backend
        .expect_list_models()
        .returning(|| Err(eyre::eyre!("connection refused")));
    let backend: ArcBackend = Arc::new(backend);

    let models = fetch_models(&backend).await;
    assert_eq!(
        models.iter().map(|m| m.id()).collect::<Vec<_>>(),
        vec!["qwen3", "qwen-plus", "qwen-max"]
    );

    let mut backend = MockBackend::new();
    backend.expect_name().return_const("mock".to_string());
    backend.expect_list_models().returning(|| Ok(vec![]));
    let backend: ArcBackend = Arc::new(backend);
    assert_eq!(fetch_models(&backend).await.len(), 3);
}

#[tokio::test]
async fn test_fetch_models_keeps_served_list() {
    let mut backend = MockBackend::new();
    backend.expect_name().return_const("mock".to_string());
    backend
        .expect_list_models()
        .returning(|| Ok(vec![Model::new("llama3")]));
    let backend: ArcBackend = Arc::new(backend);

    let models = fetch_models(&backend).await;
    assert_eq!(models, vec![Model::new("llama3")]);
}
