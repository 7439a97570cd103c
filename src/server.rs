use crate::{Config, Error, Result, providers::Providers, resources};
use rmcp::model::{
    CallToolRequestParam, CallToolResult, Content, Implementation, InitializeResult, JsonObject,
    ListResourcesResult, ListToolsResult, ProtocolVersion, ReadResourceRequestParam,
    ReadResourceResult, ServerCapabilities, Tool,
};
use std::sync::Arc;

type McpResult<T = (), E = rmcp::ErrorData> = core::result::Result<T, E>;

pub const SERVER_NAME: &str = "ankiconnect-mcp";

const LIST_DECKS: &str = "list_decks";

/// Parameters of `list_decks`; the tool takes none
#[derive(Debug, serde::Deserialize, schemars::JsonSchema)]
struct ListDecksParams {}

/// The MCP operations of the server, independent of the transport.
#[derive(Clone)]
pub struct Server {
    state: Arc<State>,
}

struct State {
    providers: Providers,
}

impl Server {
    pub fn new(config: &Config) -> Result<Self> {
        let providers = Providers::new(config)?;
        let state = State { providers };
        Ok(Self {
            state: Arc::new(state),
        })
    }

    pub fn initialize(&self, requested_version: &str) -> InitializeResult {
        let protocol_version = match requested_version {
            "2024-11-05" => ProtocolVersion::V_2024_11_05,
            _ => ProtocolVersion::V_2025_03_26,
        };

        InitializeResult {
            protocol_version,
            capabilities: ServerCapabilities::builder()
                .enable_resources()
                .enable_tools()
                .build(),
            server_info: Implementation {
                name: SERVER_NAME.into(),
                version: env!("CARGO_PKG_VERSION").into(),
            },
            instructions: Some(include_str!("./instructions.md").into()),
        }
    }

    pub fn list_tools(&self) -> ListToolsResult {
        ListToolsResult {
            tools: vec![list_decks_tool()],
            next_cursor: None,
        }
    }

    pub async fn call_tool(&self, request: CallToolRequestParam) -> McpResult<CallToolResult> {
        match &*request.name {
            LIST_DECKS => {
                let _params: ListDecksParams = parse_arguments(request.arguments)?;
                self.list_decks().await
            }
            other => Err(Error::ToolNotFound(other.to_string()).into()),
        }
    }

    /// Runs `list_decks`. Failing to reach Anki is reported in the tool result, not as
    /// a protocol error, so the client can show the troubleshooting steps.
    pub async fn list_decks(&self) -> McpResult<CallToolResult> {
        match self.state.providers.anki.deck_listing().await {
            Ok(listing) => Ok(CallToolResult::success(vec![Content::json(listing)?])),
            Err(err) => {
                tracing::warn!("list_decks failed: {err}");
                Ok(CallToolResult::error(vec![Content::text(
                    self.connection_error_text(&err),
                )]))
            }
        }
    }

    fn connection_error_text(&self, err: &Error) -> String {
        let endpoint = self.state.providers.anki.endpoint();
        format!(
            "Error connecting to Anki: {err}\n\nTroubleshooting:\n1. Ensure Anki is running\n2. Install AnkiConnect plugin (code: 2055492159)\n3. Verify AnkiConnect is accessible on {endpoint}\n4. Restart Anki if the plugin was just installed"
        )
    }

    pub fn list_resources(&self) -> ListResourcesResult {
        ListResourcesResult {
            resources: resources::CATALOG
                .iter()
                .map(|resource| resource.descriptor())
                .collect(),
            next_cursor: None,
        }
    }

    pub fn read_resource(&self, request: ReadResourceRequestParam) -> McpResult<ReadResourceResult> {
        let resource =
            resources::find(&request.uri).ok_or_else(|| Error::ResourceNotFound(request.uri))?;

        Ok(ReadResourceResult {
            contents: vec![resource.contents()],
        })
    }
}

fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: Option<JsonObject>) -> Result<T> {
    let arguments = serde_json::Value::Object(arguments.unwrap_or_default());
    serde_json::from_value(arguments).map_err(|err| Error::InvalidParams(err.to_string()))
}

fn list_decks_tool() -> Tool {
    let schema = schemars::schema_for!(ListDecksParams);
    let input_schema: JsonObject = match serde_json::to_value(schema) {
        Ok(serde_json::Value::Object(object)) => object,
        _ => JsonObject::new(),
    };

    Tool::new(
        LIST_DECKS,
        "Lists all Anki decks with statistics, hierarchy, and card information",
        Arc::new(input_schema),
    )
}
