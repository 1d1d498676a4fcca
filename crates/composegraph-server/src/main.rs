use clap::Parser;
use composegraph_core::Config;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

const DEFAULT_CONFIG_FILE: &str = "composegraph.toml";
const PASSWORD_ENV: &str = "COMPOSEGRAPH_PASSWORD";

#[derive(Parser)]
#[command(
    name = "composegraph-server",
    about = "Serve the composegraph operation catalog over HTTP"
)]
struct Cli {
    /// Port to listen on.
    #[arg(long, default_value_t = 8321)]
    port: u16,

    /// Address to bind.
    #[arg(long, default_value = "127.0.0.1")]
    bind: String,

    /// Configuration file (defaults to ./composegraph.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Graph store endpoint, overriding the configuration file.
    #[arg(long)]
    endpoint: Option<String>,
}

fn load_config(cli: &Cli) -> Result<Config, String> {
    let path = cli.config.clone().or_else(|| {
        let local = PathBuf::from(DEFAULT_CONFIG_FILE);
        local.is_file().then_some(local)
    });
    let mut config = match path {
        Some(p) => Config::load(&p).map_err(|e| format!("config error: {e}"))?,
        None => Config::default(),
    };
    if let Some(endpoint) = &cli.endpoint {
        config.store.endpoint.clone_from(endpoint);
    }
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        config.store.password = Some(password);
    }
    Ok(config)
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("COMPOSEGRAPH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(2);
        }
    };
    let store = match composegraph_core::connect(&config.store) {
        Ok(store) => store,
        Err(e) => {
            error!("store error: {e}");
            return ExitCode::from(3);
        }
    };

    let addr = format!("{}:{}", cli.bind, cli.port);
    info!("starting composegraph-server on {addr}");
    info!("graph store: {}", config.store.endpoint);

    match composegraph_server::run_server(store.as_ref(), &addr) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("failed to bind {addr}: {e}");
            ExitCode::FAILURE
        }
    }
}
