use anyhow::Result;
use clap::{Parser, Subcommand};

mod commands;

use commands::{offline, remote};

#[derive(Parser)]
#[command(name = "sam")]
#[command(about = "Smarter API Manifest CLI", long_about = None)]
struct Cli {
    /// Daemon base URL. Falls back to SAM_API_URL, then `cli.api_url` in
    /// SAM_CONFIG, then http://127.0.0.1:8899.
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Name of the env var holding the API key (default SAM_API_KEY).
    #[arg(long, global = true)]
    token_env: Option<String>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate a manifest file without contacting the daemon
    Validate {
        #[arg(short = 'f', long = "file")]
        file: String,

        /// Fail unless the manifest is of this kind (name or slug)
        #[arg(long)]
        kind: Option<String>,
    },

    /// Print the example manifest for a kind
    Example {
        kind: String,

        /// Print JSON instead of YAML
        #[arg(long, default_value_t = false)]
        json: bool,
    },

    /// Compute layered config hash + print canonical JSON
    ConfigHash {
        /// Paths in merge order (base -> overlays)
        #[arg(required = true)]
        paths: Vec<String>,
    },

    /// Create or update the resource described by a manifest file
    Apply {
        #[arg(short = 'f', long = "file")]
        file: String,
    },

    /// List resources of a kind
    Get {
        kind: String,

        /// Substring filter on resource names
        #[arg(long)]
        name: Option<String>,
    },

    /// Show one resource with its status
    Describe { kind: String, name: String },

    Delete { kind: String, name: String },

    Deploy { kind: String, name: String },

    Undeploy { kind: String, name: String },

    /// Recent log records for a resource
    Logs { kind: String, name: String },

    /// Send a prompt to a chat session
    Chat {
        name: String,

        #[arg(long)]
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Silent if the file does not exist.
    let _ = dotenvy::from_filename(".env.local");
    init_tracing();

    let Cli {
        api_url,
        token_env,
        cmd,
    } = Cli::parse();
    let client = || remote::ApiClient::from_settings(api_url.as_deref(), token_env.as_deref());

    match cmd {
        Commands::Validate { file, kind } => offline::validate(&file, kind.as_deref()),
        Commands::Example { kind, json } => offline::example(&kind, json),
        Commands::ConfigHash { paths } => offline::config_hash(&paths),

        Commands::Apply { file } => client()?.apply(&file).await,
        Commands::Get { kind, name } => client()?.get(&kind, name.as_deref()).await,
        Commands::Describe { kind, name } => client()?.named("describe", &kind, &name).await,
        Commands::Delete { kind, name } => client()?.named("delete", &kind, &name).await,
        Commands::Deploy { kind, name } => client()?.named("deploy", &kind, &name).await,
        Commands::Undeploy { kind, name } => client()?.named("undeploy", &kind, &name).await,
        Commands::Logs { kind, name } => client()?.named("logs", &kind, &name).await,
        Commands::Chat { name, prompt } => client()?.chat(&name, &prompt).await,
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()),
        )
        .init();
}
