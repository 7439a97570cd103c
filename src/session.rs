//! Newline-delimited JSON-RPC 2.0 loop driving a [`Server`].
//!
//! One message per line in, one response per line out. Requests are handled one at a
//! time in arrival order.

use crate::{Error, Result, Server};
use rmcp::model::{ErrorCode, ReadResourceRequestParam};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio_util::sync::CancellationToken;

type McpResult<T = (), E = rmcp::ErrorData> = core::result::Result<T, E>;

const JSONRPC_VERSION: &str = "2.0";

/// Any incoming message before it is classified
#[derive(Debug, Deserialize)]
struct Incoming {
    #[serde(default)]
    jsonrpc: String,
    #[serde(default)]
    method: Option<String>,
    #[serde(default)]
    params: Option<Value>,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Outgoing {
    jsonrpc: &'static str,
    id: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<rmcp::ErrorData>,
}

impl Outgoing {
    fn new(id: Value, result: McpResult<Value>) -> Self {
        match result {
            Ok(result) => Self {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: Some(result),
                error: None,
            },
            Err(error) => Self {
                jsonrpc: JSONRPC_VERSION,
                id,
                result: None,
                error: Some(error),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InitializeParams {
    protocol_version: String,
    #[serde(default)]
    client_info: Option<ClientInfo>,
}

#[derive(Debug, Deserialize)]
struct ClientInfo {
    name: String,
    #[serde(default)]
    version: String,
}

pub struct Session {
    server: Server,
    initialized: bool,
}

impl Session {
    pub fn new(server: Server) -> Self {
        Self {
            server,
            initialized: false,
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Serves requests until the reader hits EOF or `shutdown` is cancelled.
    pub async fn serve<R, W>(mut self, reader: R, mut writer: W, shutdown: CancellationToken) -> Result<()>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        tracing::info!("Starting MCP session");
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();

        loop {
            buf.clear();
            // Invalid UTF-8 surfaces as a parse error, not an io error
            let read = tokio::select! {
                _ = shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, closing session");
                    break;
                }
                read = reader.read_until(b'\n', &mut buf) => read?,
            };

            if read == 0 {
                tracing::info!("Input closed, ending session");
                break;
            }

            let line = buf.trim_ascii();
            if line.is_empty() {
                continue;
            }

            tracing::debug!("Received: {}", String::from_utf8_lossy(line));
            if let Some(reply) = self.handle_bytes(line).await {
                tracing::debug!("Sending: {reply}");
                writer.write_all(reply.as_bytes()).await?;
                writer.write_all(b"\n").await?;
                writer.flush().await?;
            }
        }

        Ok(())
    }

    /// Handles one line of input, returning the serialized response if one is due.
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        self.handle_bytes(line.as_bytes()).await
    }

    /// Like [`Session::handle_line`] for input that may not be valid UTF-8.
    pub async fn handle_bytes(&mut self, line: &[u8]) -> Option<String> {
        let reply = match serde_json::from_slice::<Value>(line) {
            Ok(Value::Array(_)) => Some(Outgoing::new(
                Value::Null,
                Err(invalid_request("batch requests are not supported")),
            )),
            Ok(value) => self.handle_message(value).await,
            Err(err) => Some(Outgoing::new(
                Value::Null,
                Err(rmcp::ErrorData::new(
                    ErrorCode::PARSE_ERROR,
                    format!("Parse error: {err}"),
                    None,
                )),
            )),
        }?;

        match serde_json::to_string(&reply) {
            Ok(reply) => Some(reply),
            Err(err) => {
                tracing::error!("Failed to serialize response: {err}");
                None
            }
        }
    }

    async fn handle_message(&mut self, value: Value) -> Option<Outgoing> {
        // `"id": null` is still a request; only a missing id makes a notification
        let id = value.get("id").cloned();
        let message: Incoming = match serde_json::from_value(value) {
            Ok(message) => message,
            Err(err) => {
                return Some(Outgoing::new(
                    Value::Null,
                    Err(invalid_request(format!("malformed message: {err}"))),
                ));
            }
        };

        if message.jsonrpc != JSONRPC_VERSION {
            let id = id.unwrap_or(Value::Null);
            return Some(Outgoing::new(
                id,
                Err(invalid_request("jsonrpc must be \"2.0\"")),
            ));
        }

        match (message.method, id) {
            (Some(method), Some(id)) => {
                let result = self.handle_request(&method, message.params).await;
                Some(Outgoing::new(id, result))
            }
            (Some(method), None) => {
                self.handle_notification(&method);
                None
            }
            (None, id) if message.result.is_some() || message.error.is_some() => {
                tracing::warn!("Received unexpected response message (id {id:?})");
                None
            }
            (None, id) => Some(Outgoing::new(
                id.unwrap_or(Value::Null),
                Err(invalid_request("message has no method")),
            )),
        }
    }

    async fn handle_request(&mut self, method: &str, params: Option<Value>) -> McpResult<Value> {
        match method {
            "initialize" => return self.initialize(params),
            "ping" => return Ok(json!({})),
            "tools/list" | "tools/call" | "resources/list" | "resources/read" => {}
            _ => {
                return Err(rmcp::ErrorData::new(
                    ErrorCode::METHOD_NOT_FOUND,
                    format!("Method not found: {method}"),
                    None,
                ));
            }
        }

        if !self.initialized {
            return Err(invalid_request("Server not initialized"));
        }

        match method {
            "tools/list" => to_value(self.server.list_tools()),
            "tools/call" => {
                let request = parse_params(params)?;
                to_value(self.server.call_tool(request).await?)
            }
            "resources/list" => to_value(self.server.list_resources()),
            _ => {
                let request: ReadResourceRequestParam = parse_params(params)?;
                to_value(self.server.read_resource(request)?)
            }
        }
    }

    fn initialize(&mut self, params: Option<Value>) -> McpResult<Value> {
        let params: InitializeParams = parse_params(params)?;
        if let Some(client) = &params.client_info {
            tracing::info!(
                client = %client.name,
                version = %client.version,
                protocol = %params.protocol_version,
                "Client initializing"
            );
        }

        let result = self.server.initialize(&params.protocol_version);
        self.initialized = true;
        to_value(result)
    }

    fn handle_notification(&self, method: &str) {
        match method {
            "notifications/initialized" | "initialized" => {
                tracing::info!("Client sent initialized notification");
            }
            "notifications/cancelled" => {
                tracing::debug!("Ignoring cancellation; requests complete before the next is read");
            }
            _ => {
                tracing::warn!("Unknown notification method: {method}");
            }
        }
    }
}

fn parse_params<T: serde::de::DeserializeOwned>(params: Option<Value>) -> Result<T> {
    let params = params.ok_or_else(|| Error::InvalidParams("missing params".into()))?;
    serde_json::from_value(params).map_err(|err| Error::InvalidParams(err.to_string()))
}

fn to_value<T: Serialize>(result: T) -> McpResult<Value> {
    serde_json::to_value(result).map_err(|err| Error::JsonError(err).into())
}

fn invalid_request(message: impl Into<String>) -> rmcp::ErrorData {
    rmcp::ErrorData::new(ErrorCode::INVALID_REQUEST, message.into(), None)
}
