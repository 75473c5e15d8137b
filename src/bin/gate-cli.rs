use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator CLI for the voidspace gate admin API", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    /// Admin API key. Falls back to GATE_ADMIN_API_KEY.
    #[arg(short, long, env = "GATE_ADMIN_API_KEY")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gate status
    Status,
    /// Summarize abuse events in the current window
    Abuse,
    /// List rate limiters and their tracked keys
    Limits,
}

impl Commands {
    fn path(&self) -> &'static str {
        match self {
            Commands::Status => "/admin/status",
            Commands::Abuse => "/admin/abuse",
            Commands::Limits => "/admin/limits",
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let url = format!("{}{}", cli.url.trim_end_matches('/'), cli.command.path());
    let res = client.get(url).headers(headers).send().await?;
    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
