use std::net::SocketAddr;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use github_mcp::credentials::CredentialProvider;
use github_mcp::server::{self, McpGithubServer};
use github_mcp::transport;
use rmcp::{transport::stdio, ServiceExt};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TransportKind {
    /// Streamable HTTP on --bind
    Http,
    /// Standard input/output, for local MCP clients
    Stdio,
}

/// MCP server for GitHub: read files and list directories in repositories.
///
/// The access token is read from MY_GITHUB_TOKEN, or GITHUB_TOKEN when that is unset.
#[derive(Parser)]
#[command(name = "github-mcp", version, about)]
struct Cli {
    /// Transport to serve the MCP protocol on
    #[arg(long, value_enum, default_value = "http")]
    transport: TransportKind,

    /// Address for the HTTP transport
    #[arg(long, default_value = "0.0.0.0:3000")]
    bind: SocketAddr,

    /// GitHub API base URL (change for GitHub Enterprise Server)
    #[arg(long, default_value = server::DEFAULT_API_BASE)]
    api_base: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let credentials = CredentialProvider::from_env();
    match credentials.source() {
        Some(env) => tracing::info!(env, "Read GitHub token from environment variable"),
        None => tracing::warn!("No GitHub token set: tool calls will fail until one is provided"),
    }

    tracing::info!(
        transport = ?cli.transport,
        api_base = %cli.api_base,
        "Starting github-mcp server"
    );

    let service = McpGithubServer::new(credentials, cli.api_base);
    match cli.transport {
        TransportKind::Http => transport::serve(service, cli.bind).await?,
        TransportKind::Stdio => {
            let running = service.serve(stdio()).await?;
            running.waiting().await?;
        }
    }

    Ok(())
}
