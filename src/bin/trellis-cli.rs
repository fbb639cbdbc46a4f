use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "trellis-cli")]
#[command(about = "Management CLI for the trellis server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3000")]
    url: String,

    #[arg(short, long, default_value = "admin-secret-key")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check server status
    Status,
    /// Show the compiled route table
    Routes,
    /// Inspect the response cache and dynamic settings
    Cache,
    /// Clear the response cache
    ClearCache,
    /// List active control rules
    Control,
    /// Disable a route or subtree (e.g. "/blog/*")
    Disable {
        /// Route pattern or ancestor wildcard
        path: String,

        /// Message returned to callers
        #[arg(short, long, default_value = "Route is temporarily disabled.")]
        message: String,

        /// Status code for blocked requests
        #[arg(short, long)]
        status: Option<u16>,

        /// Operator-provided reason
        #[arg(short, long)]
        reason: Option<String>,
    },
    /// Remove a control rule
    Enable {
        /// Route pattern the rule was registered under
        path: String,
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

    match cli.command {
        Commands::Status => {
            let res = client
                .get(format!("{}/admin/status", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Routes => {
            let res = client
                .get(format!("{}/admin/routes", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Cache => {
            let res = client
                .get(format!("{}/admin/cache", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::ClearCache => {
            let res = client
                .delete(format!("{}/admin/cache", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_status(res).await;
        }
        Commands::Control => {
            let res = client
                .get(format!("{}/admin/control", cli.url))
                .headers(headers)
                .send()
                .await?;
            print_response(res).await?;
        }
        Commands::Disable {
            path,
            message,
            status,
            reason,
        } => {
            let rule = json!({
                "path": path,
                "message": message,
                "status_code": status,
                "reason": reason,
            });
            let res = client
                .post(format!("{}/admin/control", cli.url))
                .headers(headers)
                .json(&rule)
                .send()
                .await?;
            print_status(res).await;
        }
        Commands::Enable { path } => {
            let res = client
                .delete(format!("{}/admin/control", cli.url))
                .query(&[("path", path)])
                .headers(headers)
                .send()
                .await?;
            print_status(res).await;
        }
    }

    Ok(())
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: Admin API returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}

async fn print_status(res: reqwest::Response) {
    let status = res.status();
    if status.is_success() {
        println!("OK ({})", status);
    } else {
        eprintln!("Error: Admin API returned status {}", status);
    }
}
