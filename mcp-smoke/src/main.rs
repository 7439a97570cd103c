mod client;
mod term;

use anyhow::{Result, bail, ensure};
use clap::Parser;
use client::McpClient;

/// Runs a short MCP session against an AnkiConnect MCP server and checks each reply.
#[derive(Parser, Debug)]
#[command(name = "mcp-smoke", version, about)]
struct Args {
    /// Server command and its arguments
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, default_value = "ankiconnect-mcp")]
    command: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    term::heading(&format!("Testing `{}`", args.command.join(" ")));
    let client = McpClient::spawn(&args.command).await?;

    let outcome = run_checks(&client).await;
    match &outcome {
        Ok(()) => term::heading("All checks passed"),
        Err(err) => term::fail("smoke test failed:", &format!("{err:#}")),
    }

    let closed = client.close().await;
    if let Err(err) = &closed {
        term::fail("closing the server failed:", &format!("{err:#}"));
    }
    finish(outcome, closed)
}

/// A failed check is reported ahead of a failed shutdown.
fn finish(outcome: Result<()>, closed: Result<()>) -> Result<()> {
    outcome.and(closed)
}

async fn run_checks(client: &McpClient) -> Result<()> {
    let info = client.server_info();
    term::pass(
        "initialize",
        &format!(
            "{} v{} (protocol {})",
            info.server_info.name, info.server_info.version, info.protocol_version
        ),
    );

    let tools = client.tools().await?;
    let names: Vec<&str> = tools.iter().map(|tool| &*tool.name).collect();
    ensure!(names == ["list_decks"], "unexpected tools: {names:?}");
    term::pass("tools/list", &names.join(", "));

    let result = client.call_tool("list_decks").await?;
    let text = result
        .content
        .first()
        .and_then(|content| content.as_text())
        .map(|text| text.text.clone())
        .unwrap_or_default();
    if result.is_error == Some(true) {
        // Anki not running is a valid outcome as long as the error is explained
        ensure!(
            text.contains("Error connecting to Anki"),
            "unexpected tool error: {text}"
        );
        term::pass("tools/call list_decks", "Anki unreachable, troubleshooting returned");
    } else {
        let listing: serde_json::Value = serde_json::from_str(&text)?;
        let Some(decks) = listing["decks"].as_array() else {
            bail!("list_decks returned no decks array: {text}");
        };
        term::pass("tools/call list_decks", &format!("{} decks", decks.len()));
    }

    let resources = client.resources().await?;
    ensure!(resources.len() == 2, "expected 2 resources, got {}", resources.len());
    term::pass("resources/list", &format!("{} resources", resources.len()));

    for (uri, expected) in [
        ("anki://connection-help", "AnkiConnect Setup Instructions"),
        ("anki://about", "AnkiConnect MCP Server"),
    ] {
        let text = client.read_text(uri).await?;
        ensure!(text.contains(expected), "{uri} is missing {expected:?}");
        term::pass("resources/read", uri);
    }

    Ok(())
}
