use futures_util::StreamExt;
use mockito::Matcher;
use serde_json::json;

use runpad::assistant::{
    extract_code_blocks, AssistantClient, ChatMessage, ChatOptions, Role, StreamEvent,
};
use runpad::config::Config;

fn client_for(url: &str) -> (AssistantClient, ChatOptions) {
    let cfg = Config::from_pairs([
        ("ASSISTANT_API_BASE", url),
        ("GROQ_API_KEY", "test-key"),
        ("ASSISTANT_MODEL", "test-model"),
    ]);
    let client = AssistantClient::from_config(&cfg).expect("client");
    let opts = ChatOptions::from_config(&cfg, None, 0.2);
    (client, opts)
}

const SSE_BODY: &str = concat!(
    "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"Use \"}}]}\n\n",
    ": keep-alive\n\n",
    "data: {\"choices\":[{\"delta\":{\"content\":\"```python\\nprint(int(input()))\\n```\"}}]}\n\n",
    "data: [DONE]\n\n",
);

#[tokio::test]
async fn streams_content_until_done() {
    let mut server = mockito::Server::new_async().await;
    let m = server
        .mock("POST", "/chat/completions")
        .match_header("authorization", "Bearer test-key")
        .match_body(Matcher::PartialJson(json!({ "model": "test-model", "stream": true })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(SSE_BODY)
        .create_async()
        .await;

    let (client, opts) = client_for(&server.url());
    let mut stream = client.chat_stream(vec![ChatMessage::new(Role::User, "how?")], opts);
    let mut events = Vec::new();
    while let Some(ev) = stream.next().await {
        events.push(ev.unwrap());
    }

    m.assert_async().await;
    assert_eq!(events.len(), 3);
    assert_eq!(events[0], StreamEvent::Content("Use ".to_string()));
    assert_eq!(events[2], StreamEvent::Done);
}

#[tokio::test]
async fn complete_collects_answer_with_code_block() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(SSE_BODY)
        .create_async()
        .await;

    let (client, opts) = client_for(&server.url());
    let answer = client
        .complete(vec![ChatMessage::new(Role::User, "how?")], opts)
        .await
        .unwrap();

    assert!(answer.starts_with("Use ```python"));
    let blocks = extract_code_blocks(&answer);
    assert_eq!(blocks.len(), 1);
    assert_eq!(blocks[0].language.as_deref(), Some("python"));
    assert_eq!(blocks[0].code, "print(int(input()))");
}

#[tokio::test]
async fn missing_done_sentinel_still_finishes() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/chat/completions")
        .with_status(200)
        .with_body("data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n")
        .create_async()
        .await;

    let (client, opts) = client_for(&server.url());
    let answer = client
        .complete(vec![ChatMessage::new(Role::User, "ping")], opts)
        .await
        .unwrap();
    assert_eq!(answer, "ok");
}

#[tokio::test]
async fn error_status_surfaces_as_stream_error() {
    let mut server = mockito::Server::new_async().await;
    let _m = server
        .mock("POST", "/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Invalid API Key"}}"#)
        .create_async()
        .await;

    let (client, opts) = client_for(&server.url());
    let err = client
        .complete(vec![ChatMessage::new(Role::User, "ping")], opts)
        .await
        .unwrap_err();
    let text = err.to_string();
    assert!(text.contains("401"), "{}", text);
    assert!(text.contains("Invalid API Key"), "{}", text);
}
