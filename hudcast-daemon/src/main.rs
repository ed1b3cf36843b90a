//! hudcast — entry point.
//!
//! ```text
//! hudcast                  Mirror the screen to the configured HUD
//! hudcast --config <path>  Load a custom config TOML
//! hudcast --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use hudcast_daemon::config::DaemonConfig;
use hudcast_daemon::service::HudService;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "hudcast", about = "Mirror the screen to a HUD peripheral")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "hudcast.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&DaemonConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    let config = DaemonConfig::load(&cli.config);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("hudcast v{}", env!("CARGO_PKG_VERSION"));
    info!(
        "display: {}x{} {} @ {} fps",
        config.capture.width, config.capture.height, config.capture.format, config.capture.frame_rate
    );
    info!("HUD bridge: {}", config.peripheral.address);

    let service = HudService::new(config);
    let stop = service.stop_handle();

    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.cancel();
    });

    service.run().await
}
