use std::sync::Arc;

use tracing::{error, info};

use cabinet::web::WebServer;
use cabinet::{Config, Database};

const CONFIG_PATH: &str = "config.toml";

#[tokio::main]
async fn main() {
    let config = match Config::load_with_env(CONFIG_PATH) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load {CONFIG_PATH}: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    if let Err(e) = cabinet::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        cabinet::logging::init_console_only(&config.logging.level);
    }

    if let Err(e) = run(config).await {
        error!("{e}");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> cabinet::Result<()> {
    config.validate()?;

    info!("cabinet {}", env!("CARGO_PKG_VERSION"));

    let db = Database::open(&config.database.path).await?;
    info!("Database opened at {}", config.database.path);

    if let Some(admin) = cabinet::ensure_admin(&db, &config.admin).await? {
        info!(username = %admin.username, "Initial administrator created");
    }

    let server = WebServer::new(&config, Arc::new(db))?;
    info!("Starting API server on {}", server.addr());
    server.run().await?;
    Ok(())
}
