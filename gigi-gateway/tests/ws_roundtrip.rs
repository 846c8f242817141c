//! WebSocket round trip over a real TCP listener: `chat.send` drives a turn
//! through a canned `MockLlm` response and the client should see
//! `agent_start` → `text_chunk` → `agent_done` on the wire, envelope fields
//! included.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use gigi_agent::{LlmResponse, LlmUsage, MockLlm, TurnRuntime};
use gigi_eventbus::EventBus;
use gigi_gateway::GatewayState;
use gigi_router::{Router, StandardPolicy};
use gigi_store::Store;
use gigi_tools::{AllowAll, AskUserBroker, ToolRegistry};
use tokio::net::TcpListener;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

async fn spawn_gateway() -> String {
    let store = Arc::new(Store::in_memory().unwrap());
    let bus = Arc::new(EventBus::new());
    let tools = Arc::new(ToolRegistry::new(Arc::new(AllowAll)));
    let llm: Arc<dyn gigi_agent::LlmClient> = Arc::new(MockLlm::new(vec![LlmResponse {
        content: "hello there".into(),
        tool_calls: vec![],
        usage: LlmUsage::default(),
    }]));
    let runtime = Arc::new(TurnRuntime::new(store.clone(), bus.clone(), tools, llm.clone(), 100.0));
    let broker = Arc::new(AskUserBroker::new());
    let router = Arc::new(Router::new(store.clone(), runtime, Box::new(StandardPolicy), broker));
    let state = GatewayState::new(store, bus, router, b"unused".to_vec(), llm, 100.0);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let app = gigi_gateway::router(state);
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("ws://{addr}/ws")
}

async fn recv_text(read: &mut (impl StreamExt<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin)) -> String {
    let opt = timeout(Duration::from_secs(5), read.next()).await.expect("timed out waiting for a frame");
    let msg = opt.expect("socket closed").expect("read error");
    msg.into_text().expect("non-text frame")
}

#[tokio::test]
async fn chat_send_streams_agent_start_text_chunk_and_done() {
    let url = spawn_gateway().await;
    let (ws, _) = connect_async(&url).await.unwrap();
    let (mut write, mut read) = ws.split();

    write
        .send(Message::Text(r#"{"type":"chat.send","message":"hi"}"#.to_string()))
        .await
        .unwrap();

    let mut saw_start = false;
    let mut saw_text_chunk = false;
    let mut saw_done = false;
    let mut thread_id: Option<String> = None;

    loop {
        let text = recv_text(&mut read).await;
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        match value["type"].as_str().unwrap() {
            "agent_start" => {
                saw_start = true;
                assert!(value.get("thread_id").is_some(), "agent_start should carry envelope thread_id: {text}");
                thread_id = value["thread_id"].as_str().map(str::to_string);
            }
            "text_chunk" => {
                saw_text_chunk = true;
                assert_eq!(value["content"], "hello there");
                assert!(value.get("seq").is_none(), "text_chunk is transient and carries no seq: {text}");
            }
            "agent_done" => {
                saw_done = true;
                assert!(value.get("seq").is_some(), "agent_done is a persisted segment and carries a seq: {text}");
                break;
            }
            other => panic!("unexpected frame type {other}: {text}"),
        }
    }

    assert!(saw_start && saw_text_chunk && saw_done, "expected the full agent_start/text_chunk/agent_done sequence");
    assert!(thread_id.is_some(), "agent_start should have resolved a thread id");
}
