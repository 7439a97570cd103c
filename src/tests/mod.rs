//! End-to-end tests for the MCP server.
//!
//! An `rmcp` client talks to a [`Session`] over an in-memory pipe; AnkiConnect is
//! replaced by [`MockAnki`].


use crate::{Config, Server, Session};
use axum::{Json, Router, extract::State, routing::post};
use rmcp::{
    RoleClient, ServiceError, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, ListResourcesResult, ListToolsResult,
        ReadResourceRequestParam, ReadResourceResult, ResourceContents,
    },
    service::RunningService,
};
use serde_json::{Value, json};
use std::{
    collections::{HashMap, HashSet},
    io,
    net::SocketAddr,
    sync::{Arc, Mutex},
};
use tokio::{net::TcpListener, task::JoinHandle};
use tokio_util::sync::CancellationToken;
use url::Url;

/// A deck served by [`MockAnki`]
#[derive(Clone, Debug)]
pub struct MockDeck {
    pub name: &'static str,
    pub id: i64,
    pub cards: usize,
    pub new_count: u32,
    pub review_count: u32,
}

impl MockDeck {
    pub fn new(name: &'static str, id: i64, cards: usize) -> Self {
        Self {
            name,
            id,
            cards,
            new_count: 0,
            review_count: 0,
        }
    }

    pub fn due(mut self, new_count: u32, review_count: u32) -> Self {
        self.new_count = new_count;
        self.review_count = review_count;
        self
    }
}

#[derive(Default)]
struct MockState {
    decks: Vec<MockDeck>,
    /// action -> error message returned instead of a result
    failures: HashMap<&'static str, &'static str>,
    /// every request body received, in order
    requests: Mutex<Vec<Value>>,
}

/// A fake AnkiConnect endpoint on an ephemeral localhost port
pub struct MockAnki {
    addr: SocketAddr,
    state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl MockAnki {
    pub async fn start(decks: Vec<MockDeck>) -> io::Result<Self> {
        Self::start_with_failures(decks, &[]).await
    }

    pub async fn start_with_failures(
        decks: Vec<MockDeck>,
        failures: &[(&'static str, &'static str)],
    ) -> io::Result<Self> {
        let state = Arc::new(MockState {
            decks,
            failures: failures.iter().copied().collect(),
            requests: Mutex::default(),
        });

        let router = Router::new()
            .route("/", post(anki_connect))
            .with_state(state.clone());
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });

        Ok(Self {
            addr,
            state,
            handle,
        })
    }

    pub fn url(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    pub fn config(&self) -> Config {
        Config::new().with_anki_url(self.url())
    }

    /// Actions received so far, in order
    pub fn actions(&self) -> Vec<String> {
        self.requests()
            .iter()
            .filter_map(|request| request["action"].as_str().map(String::from))
            .collect()
    }

    pub fn requests(&self) -> Vec<Value> {
        self.state.requests.lock().unwrap().clone()
    }
}

impl Drop for MockAnki {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn anki_connect(State(state): State<Arc<MockState>>, Json(request): Json<Value>) -> Json<Value> {
    state.requests.lock().unwrap().push(request.clone());

    let action = request["action"].as_str().unwrap_or_default();
    if let Some(message) = state.failures.get(action) {
        return Json(json!({ "result": null, "error": message }));
    }

    let result = match action {
        "version" => json!(6),
        "deckNamesAndIds" => {
            let decks: serde_json::Map<String, Value> = state
                .decks
                .iter()
                .map(|deck| (deck.name.to_string(), json!(deck.id)))
                .collect();
            Value::Object(decks)
        }
        "getDeckStats" => {
            let requested: HashSet<&str> = request["params"]["decks"]
                .as_array()
                .map(|names| names.iter().filter_map(Value::as_str).collect())
                .unwrap_or_default();
            let stats: serde_json::Map<String, Value> = state
                .decks
                .iter()
                .filter(|deck| requested.contains(deck.name))
                .map(|deck| {
                    (
                        deck.id.to_string(),
                        json!({
                            "deck_id": deck.id,
                            "name": deck.name,
                            "new_count": deck.new_count,
                            "learn_count": 0,
                            "review_count": deck.review_count,
                            "total_in_deck": deck.cards,
                        }),
                    )
                })
                .collect();
            Value::Object(stats)
        }
        "findCards" => {
            let query = request["params"]["query"].as_str().unwrap_or_default();
            let cards = state
                .decks
                .iter()
                .find(|deck| query == crate::providers::anki_connect::deck_query(deck.name))
                .map(|deck| deck.cards)
                .unwrap_or_default();
            json!((0..cards as i64).map(|n| 1_000 + n).collect::<Vec<_>>())
        }
        other => return Json(json!({ "result": null, "error": format!("unsupported action {other}") })),
    };

    Json(json!({ "result": result, "error": null }))
}

/// Config pointing at a localhost port with nothing listening
pub async fn unreachable_config() -> Config {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    Config::new().with_anki_url(Url::parse(&format!("http://{addr}")).unwrap())
}

/// Manages communication with an MCP server
pub struct Test {
    /// The client side of the connection
    client: RunningService<RoleClient, ()>,
    shutdown: CancellationToken,
    session: JoinHandle<crate::Result<()>>,
}

impl Test {
    /// Starts a session with a duplex connection and performs the MCP handshake
    pub async fn start(config: Config) -> io::Result<Self> {
        let (client, stream) = tokio::io::duplex(1 << 17);

        let server = Server::new(&config).map_err(io::Error::other)?;
        let shutdown = CancellationToken::new();

        let session = tokio::spawn({
            let shutdown = shutdown.clone();
            async move {
                let (reader, writer) = tokio::io::split(stream);
                Session::new(server).serve(reader, writer, shutdown).await
            }
        });

        let client = ServiceExt::serve((), client)
            .await
            .map_err(io::Error::other)?;

        Ok(Self {
            client,
            shutdown,
            session,
        })
    }

    /// Stops the session and returns how it ended
    pub async fn stop(self) -> crate::Result<()> {
        self.shutdown.cancel();
        let result = self.session.await.unwrap();
        drop(self.client);
        result
    }

    pub fn server_info(&self) -> &rmcp::model::ServerInfo {
        self.client.peer_info().unwrap()
    }

    pub async fn list_tools(&self) -> Result<ListToolsResult, ServiceError> {
        self.client.list_tools(Default::default()).await
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: Vec<(&str, Value)>,
    ) -> Result<CallToolResult, ServiceError> {
        let arguments = arguments
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect();

        self.client
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(arguments),
            })
            .await
    }

    pub async fn list_resources(&self) -> Result<ListResourcesResult, ServiceError> {
        self.client.list_resources(Default::default()).await
    }

    pub async fn read_resource(
        &self,
        uri: impl Into<String>,
    ) -> Result<ReadResourceResult, ServiceError> {
        self.client
            .read_resource(ReadResourceRequestParam { uri: uri.into() })
            .await
    }
}

/// Text of the first content item of a tool result
pub fn tool_text(result: &CallToolResult) -> String {
    result.content[0].as_text().unwrap().text.clone()
}

pub trait ResourceContentsExt {
    fn as_text(&self) -> Option<&str>;
    fn mime_type(&self) -> Option<&str>;
}

impl ResourceContentsExt for ResourceContents {
    fn as_text(&self) -> Option<&str> {
        match self {
            ResourceContents::TextResourceContents { text, .. } => Some(text),
            _ => None,
        }
    }

    fn mime_type(&self) -> Option<&str> {
        match self {
            ResourceContents::TextResourceContents { mime_type, .. } => mime_type.as_deref(),
            _ => None,
        }
    }
}

/// Feeds raw lines to a session, bypassing any client library
pub struct RawSession(Session);

impl RawSession {
    pub fn new(config: Config) -> Self {
        Self(Session::new(Server::new(&config).unwrap()))
    }

    pub async fn initialized(config: Config) -> Self {
        let mut session = Self::new(config);
        let reply = session
            .request(json!({
                "jsonrpc": "2.0",
                "id": 0,
                "method": "initialize",
                "params": {
                    "protocolVersion": "2024-11-05",
                    "capabilities": {},
                    "clientInfo": {"name": "raw", "version": "0.0.1"}
                }
            }))
            .await;
        assert!(reply.get("result").is_some(), "initialize failed: {reply}");
        session
    }

    /// Sends a line and expects exactly one JSON response
    pub async fn line(&mut self, line: &str) -> Value {
        let reply = self.0.handle_line(line).await.expect("expected a response");
        serde_json::from_str(&reply).unwrap()
    }

    pub async fn request(&mut self, message: Value) -> Value {
        self.line(&message.to_string()).await
    }

    /// Sends a line that must not be answered
    pub async fn notify(&mut self, message: Value) {
        let reply = self.0.handle_line(&message.to_string()).await;
        assert_eq!(reply, None);
    }

    pub fn is_initialized(&self) -> bool {
        self.0.is_initialized()
    }
}
