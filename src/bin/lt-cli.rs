use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde_json::Value;

use littletools::config::{load_config, Settings};
use littletools::security::Decision;

#[derive(Parser)]
#[command(name = "lt-cli")]
#[command(about = "Companion CLI for littletools", long_about = None)]
struct Cli {
    /// TOML configuration file, as passed to the server.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check a proxy target against the configured address policy
    CheckAddress {
        /// IP address, CIDR prefix or host name
        candidate: String,
    },
    /// Ask a running server for the CSP of a page
    Csp {
        url: String,

        #[arg(short, long, default_value = "http://localhost:3061")]
        server: String,
    },
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Commands::CheckAddress { candidate } => {
            let settings = Settings::new(load_config(cli.config.as_deref())?);
            match settings.address_policy().evaluate(&candidate) {
                Decision::Permitted => {
                    println!("permitted");
                    Ok(ExitCode::SUCCESS)
                }
                Decision::DeniedPrefix(prefix) => {
                    println!("denied (inside {})", prefix);
                    Ok(ExitCode::FAILURE)
                }
                Decision::DeniedHost => {
                    println!("denied (host)");
                    Ok(ExitCode::FAILURE)
                }
            }
        }
        Commands::Csp { url, server } => {
            let client = reqwest::Client::new();
            let res = client
                .get(format!("{}/api/csp", server.trim_end_matches('/')))
                .query(&[("url", url.as_str())])
                .send()
                .await?;
            print_response(res).await
        }
    }
}

async fn print_response(res: reqwest::Response) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;

    let rendered = match serde_json::from_str::<Value>(&text) {
        Ok(json) => serde_json::to_string_pretty(&json)?,
        Err(_) => text,
    };

    if status.is_success() {
        println!("{}", rendered);
        Ok(ExitCode::SUCCESS)
    } else {
        eprintln!("Error: server returned status {}", status);
        eprintln!("{}", rendered);
        Ok(ExitCode::FAILURE)
    }
}
