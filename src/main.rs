use anyhow::bail;
use clap::{Parser, Subcommand};
use configuration::Settings;
use database::{Fetch, Outcome, Params, SqlManager};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Run queries against an Azure SQL database using Entra ID
/// client-credential authentication.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Override the server name from the environment.
    #[arg(long)]
    server: Option<String>,

    /// Override the database name from the environment.
    #[arg(long)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a query and print its result set as a table.
    Query {
        /// The SQL text to run.
        sql: String,
    },
    /// Run a statement without a result set and commit it.
    Exec {
        /// The SQL text to run.
        sql: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Load credentials from a .env file when present; the real environment
    // always takes precedence.
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let mut settings = Settings::from_env()?;
    if let Some(server) = cli.server {
        settings.server = server;
    }
    if let Some(database) = cli.database {
        settings.database = database;
    }

    let manager = SqlManager::new(&settings);

    let outcome = match cli.command {
        Commands::Query { sql } => {
            manager
                .perform(&sql, Params::None, Fetch::Rows { commit: false })
                .await
        }
        Commands::Exec { sql } => manager.perform(&sql, Params::None, Fetch::NoRows).await,
    };

    match outcome {
        Outcome::Rows(table) => {
            println!("{table}");
            println!("({} rows)", table.len());
        }
        Outcome::Done => println!("OK"),
        Outcome::Failed(message) => bail!("{message}"),
    }

    Ok(())
}
