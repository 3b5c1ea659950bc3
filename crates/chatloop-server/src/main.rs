//! # ChatLoop Server
//!
//! ## Usage
//!
//! ```bash
//! # Run with default settings
//! chatloop
//!
//! # Run with a config file
//! chatloop /path/to/chatloop.toml
//!
//! # Run with environment variables
//! CHATLOOP_PORT=5000 CHATLOOP_HOST=0.0.0.0 chatloop
//! ```

use anyhow::Result;
use chatloop_server::{run_server, Config};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatloop=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args().nth(1);
    let config = Config::load(config_path.as_deref())?;

    tracing::info!("Starting ChatLoop server on {}:{}", config.host, config.port);

    run_server(config).await
}
