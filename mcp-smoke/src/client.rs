use anyhow::{Context, Result, bail};
use rmcp::{
    RoleClient, ServiceExt,
    model::{
        CallToolRequestParam, CallToolResult, ClientCapabilities, ClientInfo, Implementation,
        ReadResourceRequestParam, Resource, ResourceContents, Tool,
    },
    service::RunningService,
    transport::TokioChildProcess,
};
use tokio::process::Command;

/// MCP client talking to a server subprocess over stdio
pub struct McpClient {
    client: RunningService<RoleClient, ClientInfo>,
}

impl McpClient {
    /// Spawns `command` and performs the MCP handshake
    pub async fn spawn(command: &[String]) -> Result<Self> {
        let Some((program, args)) = command.split_first() else {
            bail!("No MCP server command given");
        };

        let mut cmd = Command::new(program);
        cmd.args(args);

        let client_info = ClientInfo {
            protocol_version: Default::default(),
            capabilities: ClientCapabilities::default(),
            client_info: Implementation {
                name: "mcp-smoke".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        let transport = TokioChildProcess::new(cmd)
            .with_context(|| format!("failed to start {program}"))?;
        let client = client_info.serve(transport).await?;
        Ok(Self { client })
    }

    pub fn server_info(&self) -> &rmcp::model::ServerInfo {
        self.client.peer_info().unwrap()
    }

    pub async fn tools(&self) -> Result<Vec<Tool>> {
        Ok(self.client.list_all_tools().await?)
    }

    pub async fn resources(&self) -> Result<Vec<Resource>> {
        Ok(self.client.list_all_resources().await?)
    }

    pub async fn call_tool(&self, name: &str) -> Result<CallToolResult> {
        Ok(self
            .client
            .call_tool(CallToolRequestParam {
                name: name.to_string().into(),
                arguments: Some(Default::default()),
            })
            .await?)
    }

    /// Reads a resource and returns its text
    pub async fn read_text(&self, uri: &str) -> Result<String> {
        let result = self
            .client
            .read_resource(ReadResourceRequestParam {
                uri: uri.to_string(),
            })
            .await?;

        match result.contents.into_iter().next() {
            Some(ResourceContents::TextResourceContents { text, .. }) => Ok(text),
            Some(_) => bail!("{uri} returned binary contents"),
            None => bail!("{uri} returned no contents"),
        }
    }

    pub async fn close(self) -> Result<()> {
        self.client.cancel().await?;
        Ok(())
    }
}
