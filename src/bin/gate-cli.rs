use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gate-cli")]
#[command(about = "Operator CLI for the access gate", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8000")]
    url: String,

    /// Admin API key, required for status, pending and reconcile.
    #[arg(short, long, env = "GATE_ADMIN_API_KEY", default_value = "")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Public health probe
    Health,
    /// Gate status: custody account, payment terms, counts
    Status,
    /// List payments submitted but not yet recorded
    Pending,
    /// Settle a wallet against an earlier transfer
    Reconcile {
        #[arg(short, long)]
        wallet: String,
        #[arg(short, long)]
        tx_hash: Option<String>,
    },
    /// Check whether a wallet has access
    Verify {
        #[arg(short, long)]
        wallet: String,
    },
    /// Pay for a wallet's access
    Pay {
        #[arg(short, long)]
        wallet: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.url.trim_end_matches('/');

    let mut headers = HeaderMap::new();
    if !cli.key.is_empty() {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
        );
    }

    let res = match cli.command {
        Commands::Health => client.get(format!("{}/", base)).send().await?,
        Commands::Status => {
            client
                .get(format!("{}/admin/status", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Pending => {
            client
                .get(format!("{}/admin/pending", base))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Reconcile { wallet, tx_hash } => {
            client
                .post(format!("{}/admin/reconcile", base))
                .headers(headers)
                .json(&json!({ "wallet_address": wallet, "tx_hash": tx_hash }))
                .send()
                .await?
        }
        Commands::Verify { wallet } => {
            client
                .post(format!("{}/verify-access", base))
                .json(&json!({ "wallet_address": wallet }))
                .send()
                .await?
        }
        Commands::Pay { wallet } => {
            client
                .post(format!("{}/execute-payment", base))
                .json(&json!({ "wallet_address": wallet }))
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    if !status.is_success() {
        eprintln!("Error: gate returned status {}", status);
    }

    match serde_json::from_str::<Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) if !text.is_empty() => println!("{}", text),
        Err(_) => {}
    }

    if !status.is_success() {
        std::process::exit(1);
    }
    Ok(())
}
