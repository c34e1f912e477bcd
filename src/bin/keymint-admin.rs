//! Command-line client for the keymint registry HTTP API.
//!
//! Drives the registration workflow and token lifecycle endpoints of a
//! running keymint server: registering applications, resuming failed
//! registrations, renewing tokens, and managing allowed domains.

use clap::{Args, Parser, Subcommand};
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::process;

/// Main CLI application structure
#[derive(Parser)]
#[command(
    name = "keymint-admin",
    about = "Keymint registry management CLI",
    version = env!("CARGO_PKG_VERSION")
)]
struct Cli {
    /// Base URL of the keymint server
    #[arg(long, default_value = "http://localhost:8080")]
    base_url: String,

    /// Enable verbose output
    #[arg(short, long, help = "Enable verbose output for debugging")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Available CLI commands
#[derive(Subcommand)]
enum Commands {
    /// Register an application and provision its client and token
    Register(RegisterArgs),
    /// Resume a failed registration workflow
    Complete(WorkflowKeyArgs),
    /// Abandon the registration attempt for a key
    Abandon(WorkflowKeyArgs),
    /// Renew an access token, revoking the old one
    Renew(RenewArgs),
    /// Check whether an access token is recorded
    Exists(ExistsArgs),
    /// Delete an OAuth client mapping
    DeleteClient(DeleteClientArgs),
    /// Merge domains into an application's allowed set
    AddDomains(AddDomainsArgs),
    /// Rebind the allowed domains of a live token
    UpdateTokenDomains(UpdateTokenDomainsArgs),
}

#[derive(Args)]
struct RegisterArgs {
    /// Owning subscriber
    #[arg(long)]
    user_id: String,

    /// Application name, unique per subscriber
    #[arg(long)]
    application_name: String,

    /// Token environment, PRODUCTION or SANDBOX
    #[arg(long, default_value = "PRODUCTION")]
    token_type: String,

    /// Callback URL for the application
    #[arg(long)]
    callback_url: Option<String>,

    /// Allowed origin domain (can be specified multiple times)
    #[arg(long = "domain")]
    domains: Vec<String>,

    /// Token validity in seconds; omitted applies the server default
    #[arg(long)]
    validity_period: Option<u64>,
}

#[derive(Args)]
struct WorkflowKeyArgs {
    /// Owning subscriber
    #[arg(long)]
    user_id: String,

    /// Application name, unique per subscriber
    #[arg(long)]
    application_name: String,

    /// Token environment, PRODUCTION or SANDBOX
    #[arg(long, default_value = "PRODUCTION")]
    token_type: String,
}

#[derive(Args)]
struct RenewArgs {
    /// Access token to replace
    #[arg(long)]
    access_token: String,

    /// Client the token is bound to
    #[arg(long)]
    client_id: String,

    /// Client secret for authentication
    #[arg(long)]
    client_secret: String,

    /// Allowed origin domain (can be specified multiple times)
    #[arg(long = "domain")]
    domains: Vec<String>,

    /// Token validity in seconds; omitted applies the server default
    #[arg(long)]
    validity_period: Option<u64>,
}

#[derive(Args)]
struct ExistsArgs {
    /// Access token to look up
    #[arg(long)]
    access_token: String,
}

#[derive(Args)]
struct DeleteClientArgs {
    /// Consumer key of the client to delete
    #[arg(long)]
    consumer_key: String,
}

#[derive(Args)]
struct AddDomainsArgs {
    /// Consumer key of the application
    #[arg(long)]
    consumer_key: String,

    /// Domain to add (can be specified multiple times)
    #[arg(long = "domain", required = true)]
    domains: Vec<String>,
}

#[derive(Args)]
struct UpdateTokenDomainsArgs {
    /// Access token to rebind
    #[arg(long)]
    access_token: String,

    /// Replacement domain (can be specified multiple times)
    #[arg(long = "domain", required = true)]
    domains: Vec<String>,
}

/// Application errors
#[derive(Debug)]
enum AppError {
    /// Network or HTTP client errors
    Network(reqwest::Error),
    /// JSON parsing or serialization errors
    Json(serde_json::Error),
    /// Errors reported by the registry API
    Api(String),
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Network(err)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Json(err)
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AppError::Network(err) => write!(f, "Network error: {}", err),
            AppError::Json(err) => write!(f, "JSON error: {}", err),
            AppError::Api(msg) => write!(f, "Registry error: {}", msg),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let client = Client::new();

    let result = match &cli.command {
        Commands::Register(args) => register(&cli, &client, args).await,
        Commands::Complete(args) => {
            post_key(&cli, &client, "/registry/applications/complete", args).await
        }
        Commands::Abandon(args) => {
            post_key(&cli, &client, "/registry/applications/abandon", args).await
        }
        Commands::Renew(args) => renew(&cli, &client, args).await,
        Commands::Exists(args) => exists(&cli, &client, args).await,
        Commands::DeleteClient(args) => delete_client(&cli, &client, args).await,
        Commands::AddDomains(args) => add_domains(&cli, &client, args).await,
        Commands::UpdateTokenDomains(args) => update_token_domains(&cli, &client, args).await,
    };

    match result {
        Ok(()) => process::exit(0),
        Err(AppError::Api(_)) => {
            eprintln!("Error: {}", result.unwrap_err());
            process::exit(2);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            process::exit(1);
        }
    }
}

/// Print the response body on success, or surface the API error body
async fn handle_response(cli: &Cli, response: reqwest::Response) -> Result<(), AppError> {
    let status = response.status();
    if cli.verbose {
        eprintln!("Response status: {}", status);
    }

    if status == StatusCode::NO_CONTENT {
        println!("{}", json!({ "ok": true }));
        return Ok(());
    }

    let body: Value = response.json().await?;
    if status.is_success() {
        println!("{}", serde_json::to_string_pretty(&body)?);
        Ok(())
    } else {
        let description = body["error_description"]
            .as_str()
            .unwrap_or("unknown error")
            .to_string();
        Err(AppError::Api(format!("{} ({})", description, status)))
    }
}

async fn register(cli: &Cli, client: &Client, args: &RegisterArgs) -> Result<(), AppError> {
    let body = json!({
        "user_id": args.user_id,
        "application_name": args.application_name,
        "token_type": args.token_type,
        "callback_url": args.callback_url,
        "allowed_domains": args.domains,
        "validity_period": args.validity_period,
    });
    if cli.verbose {
        eprintln!("Registration request: {}", serde_json::to_string_pretty(&body)?);
    }

    let url = format!("{}/registry/applications/register", cli.base_url);
    let response = client.post(&url).json(&body).send().await?;
    handle_response(cli, response).await
}

async fn post_key(
    cli: &Cli,
    client: &Client,
    path: &str,
    args: &WorkflowKeyArgs,
) -> Result<(), AppError> {
    let body = json!({
        "user_id": args.user_id,
        "application_name": args.application_name,
        "token_type": args.token_type,
    });

    let url = format!("{}{}", cli.base_url, path);
    let response = client.post(&url).json(&body).send().await?;
    handle_response(cli, response).await
}

async fn renew(cli: &Cli, client: &Client, args: &RenewArgs) -> Result<(), AppError> {
    let body = json!({
        "access_token": args.access_token,
        "client_id": args.client_id,
        "client_secret": args.client_secret,
        "allowed_domains": args.domains,
        "validity_period": args.validity_period,
    });

    let url = format!("{}/registry/tokens/renew", cli.base_url);
    let response = client.post(&url).json(&body).send().await?;
    handle_response(cli, response).await
}

async fn exists(cli: &Cli, client: &Client, args: &ExistsArgs) -> Result<(), AppError> {
    let url = format!(
        "{}/registry/tokens/{}/exists",
        cli.base_url, args.access_token
    );
    let response = client.get(&url).send().await?;
    handle_response(cli, response).await
}

async fn delete_client(
    cli: &Cli,
    client: &Client,
    args: &DeleteClientArgs,
) -> Result<(), AppError> {
    let url = format!("{}/registry/clients/{}", cli.base_url, args.consumer_key);
    let response = client.delete(&url).send().await?;
    handle_response(cli, response).await
}

async fn add_domains(cli: &Cli, client: &Client, args: &AddDomainsArgs) -> Result<(), AppError> {
    let body = json!({ "domains": args.domains });
    let url = format!(
        "{}/registry/clients/{}/domains",
        cli.base_url, args.consumer_key
    );
    let response = client.post(&url).json(&body).send().await?;
    handle_response(cli, response).await
}

async fn update_token_domains(
    cli: &Cli,
    client: &Client,
    args: &UpdateTokenDomainsArgs,
) -> Result<(), AppError> {
    let body = json!({
        "access_token": args.access_token,
        "domains": args.domains,
    });
    let url = format!("{}/registry/tokens/domains", cli.base_url);
    let response = client.put(&url).json(&body).send().await?;
    handle_response(cli, response).await
}
