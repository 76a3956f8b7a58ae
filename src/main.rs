use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use spy_cat_agency::{api, config::Config, db};

#[derive(Parser)]
#[command(name = "spy-cat-agency")]
#[command(about = "Record keeping for spy cats, their missions and targets")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP API server
    Serve {
        /// Address to bind
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Port for HTTP API
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// SQLite database file (overrides SPY_CAT_DATABASE_PATH)
        #[arg(long)]
        database: Option<PathBuf>,
    },
    /// Apply pending database migrations and exit
    Migrate {
        /// SQLite database file (overrides SPY_CAT_DATABASE_PATH)
        #[arg(long)]
        database: Option<PathBuf>,
    },
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG")
            .unwrap_or_else(|_| "spy_cat_agency=debug,tower_http=debug".into()),
    );

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn open_database(path: Option<PathBuf>) -> anyhow::Result<db::Database> {
    let db = match path {
        Some(path) => db::Database::open(path)?,
        None => db::Database::open_default()?,
    };
    db.migrate()?;
    Ok(db)
}

async fn serve(config: Config, host: String, port: u16) -> anyhow::Result<()> {
    let db = open_database(config.database_path.clone())?;
    let breeds = Arc::new(config.breed_classifier()?);

    let app = api::create_router_with_config(db, breeds, &config);

    let addr = format!("{}:{}", host, port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Spy cat agency listening on http://{}", addr);

    axum::serve(listener, app).await?;
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let mut config = Config::from_env();

    match cli.command {
        Some(Commands::Serve {
            host,
            port,
            database,
        }) => {
            if database.is_some() {
                config.database_path = database;
            }
            serve(config, host, port).await?;
        }
        Some(Commands::Migrate { database }) => {
            open_database(database.or(config.database_path))?;
            tracing::info!("Database is up to date");
        }
        None => {
            serve(config, "127.0.0.1".to_string(), 8000).await?;
        }
    }

    Ok(())
}
