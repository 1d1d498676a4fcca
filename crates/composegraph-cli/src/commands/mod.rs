pub mod compile;
pub mod completions;
pub mod conflicts;
pub mod deps;
pub mod inspect;
pub mod network;
pub mod op;
pub mod operations;
pub mod ping;
pub mod services;

use composegraph_core::{Config, ServiceRef};
use composegraph_store::GraphStore;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_STORE_ERROR: u8 = 3;
pub const EXIT_PARTIAL: u8 = 4;

/// Config file picked up from the working directory when `--config` is absent.
pub const DEFAULT_CONFIG_FILE: &str = "composegraph.toml";

pub const PASSWORD_ENV: &str = "COMPOSEGRAPH_PASSWORD";

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_outcome(outcome: &str) -> String {
    use console::Style;
    match outcome {
        "compiled" => Style::new().green().apply_to(outcome).to_string(),
        "partial" => Style::new().yellow().apply_to(outcome).to_string(),
        "skipped" | "failed" => Style::new().red().bold().apply_to(outcome).to_string(),
        other => other.to_owned(),
    }
}

pub fn format_ref(service: &ServiceRef) -> String {
    format!("{} ({})", service.name, service.source_file)
}

/// Load the config from `path`, else from `composegraph.toml` in the working
/// directory when present, else defaults.
pub fn load_config(path: Option<&Path>) -> Result<Config, String> {
    let path: Option<PathBuf> = match path {
        Some(p) => Some(p.to_path_buf()),
        None => {
            let local = PathBuf::from(DEFAULT_CONFIG_FILE);
            local.is_file().then_some(local)
        }
    };
    match path {
        Some(p) => Config::load(&p).map_err(|e| format!("config error: {e}")),
        None => Ok(Config::default()),
    }
}

pub fn open_store(config: &Config) -> Result<Box<dyn GraphStore>, String> {
    composegraph_core::connect(&config.store).map_err(|e| format!("store error: {e}"))
}
