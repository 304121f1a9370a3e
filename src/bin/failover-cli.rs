use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

use endpoint_failover::config::load_config;
use endpoint_failover::{Endpoint, Probe, TcpProbe};

#[derive(Parser)]
#[command(name = "failover-cli")]
#[command(about = "Management CLI for the endpoint failover daemon", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API bearer token; required by the admin commands
    #[arg(short, long, env = "FAILOVER_ADMIN_KEY")]
    key: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the active endpoint and probe state
    Status,
    /// List endpoints in priority order
    Endpoints,
    /// Switch back to the primary endpoint
    Failback,
    /// Probe an endpoint once from this machine
    Probe {
        /// Endpoint as host:port
        endpoint: Endpoint,
        #[arg(long, default_value_t = 3000)]
        connect_timeout_ms: u64,
        #[arg(long, default_value_t = 2000)]
        read_timeout_ms: u64,
        /// Only check that a TCP connection can be opened
        #[arg(long)]
        tcp_only: bool,
    },
    /// Validate a configuration file
    CheckConfig { path: PathBuf },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Probe {
            endpoint,
            connect_timeout_ms,
            read_timeout_ms,
            tcp_only,
        } => {
            let probe = TcpProbe::new(
                Duration::from_millis(connect_timeout_ms),
                Duration::from_millis(read_timeout_ms),
                !tcp_only,
            );
            if probe.probe(&endpoint).await {
                println!("{endpoint}: healthy");
                Ok(ExitCode::SUCCESS)
            } else {
                println!("{endpoint}: unhealthy");
                Ok(ExitCode::FAILURE)
            }
        }
        Commands::CheckConfig { path } => match load_config(&path) {
            Ok(config) => {
                println!("{}: ok ({} endpoints)", path.display(), config.endpoints.len());
                Ok(ExitCode::SUCCESS)
            }
            Err(e) => {
                eprintln!("{}: {}", path.display(), e);
                Ok(ExitCode::FAILURE)
            }
        },
        Commands::Status => {
            admin_request(&cli.url, cli.key.as_deref(), reqwest::Method::GET, "status").await
        }
        Commands::Endpoints => {
            admin_request(&cli.url, cli.key.as_deref(), reqwest::Method::GET, "endpoints").await
        }
        Commands::Failback => {
            admin_request(&cli.url, cli.key.as_deref(), reqwest::Method::POST, "failback").await
        }
    }
}

async fn admin_request(
    url: &str,
    key: Option<&str>,
    method: reqwest::Method,
    path: &str,
) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let Some(key) = key else {
        eprintln!("Error: admin commands need --key or FAILOVER_ADMIN_KEY");
        return Ok(ExitCode::FAILURE);
    };
    let mut headers = HeaderMap::new();
    headers.insert(AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {key}"))?);

    let res = reqwest::Client::new()
        .request(method, format!("{url}/admin/{path}"))
        .headers(headers)
        .send()
        .await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {status}");
        if let Ok(text) = res.text().await {
            eprintln!("Response: {text}");
        }
        return Ok(ExitCode::FAILURE);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(ExitCode::SUCCESS)
}
