use std::sync::Arc;

use healthmate_core::config::Config;
use healthmate_core::sqlite_store::SqliteHealthStore;
use healthmate_mcp::HealthMcpHandler;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Configure logging from env var `HEALTHMATE_LOG_LEVEL` (or fallback to `RUST_LOG`, default `info`).
    let log_env = std::env::var("HEALTHMATE_LOG_LEVEL")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| "info".to_string());

    // Append per-target overrides to keep rmcp internals quiet by default
    let combined_filter = format!("{},rmcp=warn,serve_inner=warn", log_env);
    let env_filter = tracing_subscriber::EnvFilter::try_new(combined_filter)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,rmcp=warn,serve_inner=warn"));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
    tracing::info!("healthmate_mcp: log filter: {}", log_env);

    let config = Config::from_env()?;
    let store = SqliteHealthStore::connect(&config.database_url).await?;
    let handler = HealthMcpHandler::new(Arc::new(store), &config);

    tracing::info!(
        "healthmate_mcp: registered {} tools, owner phone {}",
        handler.tool_count(),
        config.owner_phone
    );

    // Start RMCP server over stdio transport so it's immediately usable with MCP clients
    tracing::info!("healthmate_mcp: starting stdio MCP server...");

    use rmcp::serve_server;
    let transport = (tokio::io::stdin(), tokio::io::stdout());
    let server = serve_server(handler, transport).await?;

    tracing::info!("healthmate_mcp: service initialized as server");

    server.waiting().await?;

    Ok(())
}
