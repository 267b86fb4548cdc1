//! imgcast server binary.
//!
//! # Usage
//!
//! ```bash
//! # Defaults: port 8080, rooms under ./var, bundled viewer page
//! imgcast-server
//!
//! # Behind a reverse proxy under /imgcast/
//! BASE_PATH=/imgcast ROOMS_BASE_DIR=/srv/imgcast imgcast-server --port 9000
//! ```
//!
//! Rooms are created by the first upload authenticated against
//! `{ROOMS_BASE_DIR}/.htpasswd` (bcrypt entries, e.g. `htpasswd -B`).

use clap::Parser;
use imgcast_server::Config;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("imgcast server starting");
    tracing::info!("Binding to {}:{}", config.bind, config.port);
    if config.base_path != "/" {
        tracing::info!("Base path {}", config.base_path);
    }

    imgcast_server::run(&config).await?;

    Ok(())
}
