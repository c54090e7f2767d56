use std::time::Duration;

use clap::Parser;
use tracing_subscriber::{Layer, layer::SubscriberExt, util::SubscriberInitExt};

use esview_mcp_runtime::{ConnectionConfig, McpCommands, parse_hosts, run as run_mcp};

#[derive(Parser)]
#[command(
    name = "esview-mcp",
    version,
    about = "Read-only Elasticsearch diagnostics exposed as MCP tools over stdio"
)]
struct Cli {
    /// Comma-separated Elasticsearch base URLs
    #[arg(long, env = "ELASTICSEARCH_HOSTS", default_value = "http://localhost:9200")]
    hosts: String,

    /// Basic-auth user ("EMPTY" disables auth)
    #[arg(long, env = "ELASTICSEARCH_USERNAME")]
    username: Option<String>,

    /// Basic-auth password ("EMPTY" disables auth)
    #[arg(long, env = "ELASTICSEARCH_PASSWORD", hide_env_values = true)]
    password: Option<String>,

    /// Per-request timeout in seconds
    #[arg(long, env = "ELASTICSEARCH_TIMEOUT_SECS", default_value_t = 30)]
    timeout_secs: u64,

    /// Emit logs as JSON lines on stderr
    #[arg(long, env = "ESVIEW_LOG_JSON")]
    log_json: bool,

    #[command(subcommand)]
    command: McpCommands,
}

fn init_tracing(json: bool) {
    // stdout carries the protocol, so logs always go to stderr.
    let fmt = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);
    let fmt = if json { fmt.json().boxed() } else { fmt.boxed() };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "esview_mcp=info,esview_mcp_runtime=info".into()),
        )
        .with(fmt)
        .init();
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    let connection = ConnectionConfig {
        hosts: parse_hosts(&cli.hosts),
        username: cli.username,
        password: cli.password,
        timeout: Duration::from_secs(cli.timeout_secs),
    };

    let code = run_mcp(connection, cli.command).await;
    std::process::exit(code);
}
