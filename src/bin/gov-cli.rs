use std::path::PathBuf;

use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

use governance_gateway::config::loader::load_document;

#[derive(Parser)]
#[command(name = "gov-cli")]
#[command(about = "Management CLI for the API governance gateway", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8081")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check gateway status and rule counts
    Status,
    /// List the active rules
    Rules,
    /// Validate a rules document locally and install it
    Load {
        /// Path to a JSON or TOML rules document
        file: PathBuf,
    },
    /// Dry-run a request against the active rules
    Evaluate {
        /// Request path, e.g. /api/orders
        route: String,
        #[arg(short, long, default_value = "GET")]
        method: String,
        #[arg(long)]
        user: Option<String>,
        #[arg(long)]
        company: Option<String>,
    },
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

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Rules => {
            client
                .get(format!("{}/admin/rules", cli.url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Load { file } => {
            let document = load_document(&file)?;
            println!("Validated {} rules from {}", document.rules.len(), file.display());
            client
                .put(format!("{}/admin/rules", cli.url))
                .headers(headers)
                .json(&document)
                .send()
                .await?
        }
        Commands::Evaluate {
            route,
            method,
            user,
            company,
        } => {
            let body = json!({
                "user_id": user,
                "company_id": company,
                "request": { "verb": method, "route": route },
            });
            client
                .post(format!("{}/admin/evaluate", cli.url))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if status.is_success() {
        let json: Value = res.json().await?;
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("Error: {} - {}", status, res.text().await?);
    }
    Ok(())
}
