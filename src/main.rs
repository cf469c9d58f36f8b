use clap::Parser;
use futures::future::try_join_all;

use module_emulator::communication::EmulatorServer;
use module_emulator::config::{load_config, Config};
use module_emulator::ModuleKind;

/// Serve emulated lab modules over TCP.
#[derive(Debug, Parser)]
#[command(name = "module-emulator", version, about)]
struct Cli {
    /// TOML configuration file. Built-in defaults are used when omitted.
    #[arg(short, long)]
    config: Option<String>,

    /// Overrides `[server] host` from the configuration.
    #[arg(long)]
    host: Option<String>,

    /// Module to serve. Repeat to serve several; defaults to all of them.
    #[arg(short, long = "module", value_enum)]
    modules: Vec<ModuleKind>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => tracing::Level::INFO,
        1 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    tracing_subscriber::fmt().with_max_level(level).init();

    tracing::info!("Starting module emulator {}", env!("CARGO_PKG_VERSION"));

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path);
            load_config(path)?
        }
        None => Config::default(),
    };
    if let Some(host) = cli.host {
        config.server.host = host;
    }

    let modules = if cli.modules.is_empty() {
        ModuleKind::ALL.to_vec()
    } else {
        let mut modules: Vec<ModuleKind> = Vec::new();
        for kind in cli.modules {
            if !modules.contains(&kind) {
                modules.push(kind);
            }
        }
        modules
    };

    let server = EmulatorServer::new(config);
    let mut listeners = Vec::with_capacity(modules.len());
    for kind in &modules {
        listeners.push((*kind, server.bind(*kind).await?));
    }

    let serving = try_join_all(
        listeners
            .into_iter()
            .map(|(kind, listener)| server.serve_listener(kind, listener)),
    );

    tokio::select! {
        result = serving => {
            result?;
        }
        result = tokio::signal::ctrl_c() => {
            result?;
            tracing::info!("Shutting down");
        }
    }
    Ok(())
}
