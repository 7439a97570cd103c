use ankiconnect_mcp::{Config, DEFAULT_ANKI_URL, DEFAULT_API_VERSION, Server, Session};
use clap::Parser;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use url::Url;

/// MCP server exposing Anki decks through AnkiConnect.
#[derive(Parser, Debug)]
#[command(name = "ankiconnect-mcp")]
#[command(version, about, long_about = None)]
struct Args {
    /// AnkiConnect endpoint
    #[arg(long, env = "ANKICONNECT_URL", default_value = DEFAULT_ANKI_URL)]
    anki_url: Url,

    /// AnkiConnect API version sent with each action
    #[arg(long, default_value_t = DEFAULT_API_VERSION)]
    api_version: u8,

    /// Timeout for each AnkiConnect request, in seconds
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,

    /// Enable verbose logging (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.verbose);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let result = runtime.block_on(run(args));

    // A pending stdin read sits on a blocking thread until the client closes the pipe
    runtime.shutdown_background();
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = Config::new()
        .with_anki_url(args.anki_url)
        .with_api_version(args.api_version)
        .with_request_timeout(Duration::from_secs(args.timeout_secs));
    tracing::info!("Starting ankiconnect-mcp with config: {config:?}");

    let server = Server::new(&config)?;

    let shutdown = CancellationToken::new();
    cancel_on_signal(shutdown.clone())?;

    Session::new(server)
        .serve(tokio::io::stdin(), tokio::io::stdout(), shutdown)
        .await?;
    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| format!("{default_level},hyper=warn,reqwest=warn").into());

    // stdout carries the protocol
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Cancels `shutdown` on SIGINT, or SIGTERM on unix.
fn cancel_on_signal(shutdown: CancellationToken) -> anyhow::Result<()> {
    // Registered before serving starts
    #[cfg(unix)]
    let mut terminate =
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

    tokio::spawn(async move {
        #[cfg(unix)]
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
        #[cfg(not(unix))]
        let _ = tokio::signal::ctrl_c().await;

        tracing::info!("Received termination signal");
        shutdown.cancel();
    });
    Ok(())
}
