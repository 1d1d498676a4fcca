mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;
use commands::{EXIT_FAILURE, EXIT_MANIFEST_ERROR, EXIT_STORE_ERROR, PASSWORD_ENV};
use composegraph_core::{install_signal_handler, Config, QueryService};
use composegraph_schema::IdentityScope;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "composegraph",
    version,
    about = "Compile compose manifests into a queryable property graph"
)]
struct Cli {
    /// Path to a TOML config file (default: ./composegraph.toml if present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Graph store endpoint: memory:, file:<path>, or http(s)://host:port.
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Graph store user.
    #[arg(long, global = true)]
    user: Option<String>,

    /// Graph store database name.
    #[arg(long, global = true)]
    database: Option<String>,

    /// Output results as structured JSON.
    #[arg(long, default_value_t = false, global = true)]
    json: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    /// Enable trace-level logging (more detailed than --verbose).
    #[arg(long, default_value_t = false, global = true)]
    trace: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Compile manifests into the graph.
    Compile {
        /// Manifest file or directory (default: the configured directory).
        target: Option<PathBuf>,
        /// File name glob for manifest discovery.
        #[arg(long)]
        pattern: Option<String>,
        /// Identify services by name alone, linking dependencies across manifests.
        #[arg(long, default_value_t = false)]
        global_identity: bool,
    },
    /// List every service in the graph.
    Services,
    /// Show image, ports, environment, volumes and networks of a service.
    Inspect {
        /// Service name.
        service: String,
        /// Only the service declared in this manifest.
        #[arg(long)]
        file: Option<String>,
    },
    /// Show host ports claimed by more than one service.
    Conflicts,
    /// Show what a service depends on and what requires it.
    Deps {
        /// Service name.
        service: String,
        /// Only the service declared in this manifest.
        #[arg(long)]
        file: Option<String>,
    },
    /// List services attached to a network.
    Network {
        /// Network name.
        network: String,
    },
    /// Run a catalog operation by name and print its JSON response.
    Op {
        /// Operation name (see `composegraph operations`).
        name: String,
        /// Parameters as a JSON object.
        #[arg(long, default_value = "{}")]
        params: String,
    },
    /// List the operation catalog.
    Operations,
    /// Check that the graph store is reachable.
    Ping,
    /// Generate shell completions for bash, zsh, fish, elvish, or powershell.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

fn main() -> ExitCode {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let msg = info.to_string();
        if msg.contains("Broken pipe")
            || msg.contains("broken pipe")
            || msg.contains("os error 32")
            || msg.contains("failed printing to stdout")
        {
            std::process::exit(0);
        }
        default_hook(info);
    }));

    let cli = Cli::parse();

    let default_level = if cli.trace {
        "trace"
    } else if cli.verbose {
        "debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("COMPOSEGRAPH_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .init();

    let result = run(cli);

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            let code = if msg.starts_with("manifest error:")
                || msg.starts_with("config error:")
                || msg.starts_with("cannot read manifest directory")
            {
                EXIT_MANIFEST_ERROR
            } else if msg.starts_with("store error:") {
                EXIT_STORE_ERROR
            } else {
                EXIT_FAILURE
            };
            ExitCode::from(code)
        }
    }
}

fn resolve_config(cli: &Cli) -> Result<Config, String> {
    let mut config = commands::load_config(cli.config.as_deref())?;
    if let Some(endpoint) = &cli.endpoint {
        config.store.endpoint.clone_from(endpoint);
    }
    if let Some(user) = &cli.user {
        config.store.user.clone_from(user);
    }
    if let Some(database) = &cli.database {
        config.store.database.clone_from(database);
    }
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        config.store.password = Some(password);
    }
    if let Commands::Compile {
        pattern,
        global_identity,
        ..
    } = &cli.command
    {
        if let Some(pattern) = pattern {
            config.manifests.pattern.clone_from(pattern);
        }
        if *global_identity {
            config.identity.scope = IdentityScope::Global;
        }
    }
    Ok(config)
}

fn run(cli: Cli) -> Result<u8, String> {
    let json = cli.json;
    match &cli.command {
        Commands::Completions { shell } => return commands::completions::run::<Cli>(*shell),
        Commands::Operations => return commands::operations::run(json),
        _ => {}
    }

    let config = resolve_config(&cli)?;
    let store = commands::open_store(&config)?;
    let queries = QueryService::new(store.as_ref());

    match cli.command {
        Commands::Compile { target, .. } => {
            install_signal_handler();
            commands::compile::run(store.as_ref(), &config, target.as_deref(), json)
        }
        Commands::Services => commands::services::run(&queries, json),
        Commands::Inspect { service, file } => {
            commands::inspect::run(&queries, &service, file.as_deref(), json)
        }
        Commands::Conflicts => commands::conflicts::run(&queries, json),
        Commands::Deps { service, file } => {
            commands::deps::run(&queries, &service, file.as_deref(), json)
        }
        Commands::Network { network } => commands::network::run(&queries, &network, json),
        Commands::Op { name, params } => commands::op::run(&queries, &name, &params),
        Commands::Ping => commands::ping::run(store.as_ref(), &config.store.endpoint, json),
        Commands::Operations => commands::operations::run(json),
        Commands::Completions { shell } => commands::completions::run::<Cli>(shell),
    }
}
