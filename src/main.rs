use clap::{Parser, Subcommand};

use quickhire::backend::{BackendError, HttpUserDirectory};
use quickhire::config::{ConfigError, SessionConfig};
use quickhire::identity::Claims;
use quickhire::role_check;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Backend(#[from] BackendError),
    #[error("invalid claims JSON: {0}")]
    Claims(#[from] serde_json::Error),
}

#[derive(Parser, Debug)]
#[command(name = "quickhire", about = "QuickHire session and role diagnostics")]
struct Cli {
    /// Overrides `QUICKHIRE_API_BASE_URL` from the environment.
    #[arg(long, env = "QUICKHIRE_API_BASE_URL")]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the backend record and resolved role for a uid.
    CheckRole {
        uid: String,
        /// Token claims to compare against, as a JSON object.
        #[arg(long)]
        claims: Option<String>,
    },
    /// Print `true` if the backend reports the uid as admin.
    IsAdmin { uid: String },
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        tracing::error!(error = %e, "command failed");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let mut config = SessionConfig::from_env()?;
    if let Some(base_url) = cli.base_url.as_deref() {
        config = config.with_base_url(base_url)?;
    }
    let directory = HttpUserDirectory::from_config(&config)?;
    tracing::info!(base_url = %config.api_base_url, "using backend");

    match cli.command {
        Command::CheckRole { uid, claims } => {
            let claims: Claims = match claims {
                Some(raw) => serde_json::from_str(&raw)?,
                None => Claims::new(),
            };
            let report = role_check::check_role(&directory, &uid, &claims).await;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::IsAdmin { uid } => {
            println!("{}", role_check::is_admin(&directory, &uid).await);
        }
    }
    Ok(())
}
