//! autolight agent entry point.
//!
//! ```text
//! autolight-agent                         Run with ./autolight-agent.toml
//! autolight-agent --config <path>         Load a custom config TOML
//! autolight-agent --source shared_texture Override the capture backend
//! autolight-agent --gen-config            Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use autolight_agent::config::AgentConfig;
use autolight_agent::service::AgentService;
use autolight_core::capture::SourceKind;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "autolight-agent", about = "Stream a screen region's color over OSC")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "autolight-agent.toml")]
    config: PathBuf,

    /// Capture backend, overriding the config file.
    #[arg(short, long, value_enum)]
    source: Option<SourceArg>,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SourceArg {
    Duplication,
    Blit,
    SharedTexture,
}

impl From<SourceArg> for SourceKind {
    fn from(arg: SourceArg) -> Self {
        match arg {
            SourceArg::Duplication => SourceKind::Duplication,
            SourceArg::Blit => SourceKind::Blit,
            SourceArg::SharedTexture => SourceKind::SharedTexture,
        }
    }
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&AgentConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let loaded = AgentConfig::load(&cli.config);
    let mut config = loaded.as_ref().cloned().unwrap_or_default();
    if let Some(source) = cli.source {
        config.capture.source = source.into();
    }

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = &loaded {
        warn!("{e}; using defaults");
    }

    info!("autolight-agent v{}", env!("CARGO_PKG_VERSION"));
    info!("source: {:?}", config.capture.source);
    info!(
        "output: {}:{} at {} Hz",
        config.output.host, config.output.port, config.output.rate
    );

    let mut service = AgentService::new(&config);
    let stop = service.stop_handle();

    // Ctrl-C handler.
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Ctrl-C received, shutting down");
        stop.store(false, std::sync::atomic::Ordering::SeqCst);
    });

    service.run().await?;

    Ok(())
}
