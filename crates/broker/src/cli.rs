//! `stationd`'s command-line surface: `serve` (default), `doctor`, and
//! `config validate`/`config show`, matching the teacher's `cli::Cli` shape.

use clap::{Parser, Subcommand};
use station_domain::config::{Config, ConfigSeverity};

#[derive(Debug, Parser)]
#[command(name = "stationd", version, about = "Station control plane")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Start the control plane (default when no subcommand is given).
    Serve,
    /// Run startup diagnostic checks against the current configuration.
    Doctor,
    /// Configuration utilities.
    #[command(subcommand)]
    Config(ConfigCommand),
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Parse the config file and report any issues.
    Validate,
    /// Dump the resolved configuration (with defaults) as TOML.
    Show,
}

/// Load the configuration from the path named by `STATIOND_CONFIG` (or
/// `config.toml` by default). Shared by `serve`, `doctor`, and `config`.
pub fn load_config() -> anyhow::Result<(Config, String)> {
    let config_path = std::env::var("STATIOND_CONFIG").unwrap_or_else(|_| "config.toml".into());

    let config = if std::path::Path::new(&config_path).exists() {
        let raw = std::fs::read_to_string(&config_path).map_err(|e| anyhow::anyhow!("reading {config_path}: {e}"))?;
        toml::from_str(&raw).map_err(|e| anyhow::anyhow!("parsing {config_path}: {e}"))?
    } else {
        Config::default()
    };

    Ok((config, config_path))
}

/// Parse and validate the config, printing any issues. Returns `true` when
/// there are no `Error`-severity issues.
pub fn validate_config(config: &Config, config_path: &str) -> bool {
    let issues = config.validate();
    if issues.is_empty() {
        println!("Config OK ({config_path})");
        return true;
    }

    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    let warning_count = issues.len() - error_count;
    for issue in &issues {
        println!("{issue}");
    }
    println!("\n{error_count} error(s), {warning_count} warning(s) in {config_path}");

    error_count == 0
}

/// Dump the resolved config (with defaults filled in) as TOML.
pub fn show_config(config: &Config) {
    match toml::to_string_pretty(config) {
        Ok(output) => print!("{output}"),
        Err(e) => eprintln!("failed to serialize config: {e}"),
    }
}

/// Lightweight startup self-check: NATS reachability, state directory
/// writable, config valid. Mirrors the precondition DLS bootstrap needs
/// before it can safely run.
pub async fn doctor(config: &Config, config_path: &str) -> bool {
    println!("stationd doctor");
    println!("===============\n");

    let mut all_passed = true;

    let issues = config.validate();
    let error_count = issues.iter().filter(|i| i.severity == ConfigSeverity::Error).count();
    print_check("Config validation", error_count == 0, format!("{} issue(s) in {config_path}", issues.len()));
    for issue in &issues {
        println!("      {issue}");
    }
    if error_count > 0 {
        all_passed = false;
    }

    let nats_reachable = async_nats::connect(&config.nats.url).await.is_ok();
    print_check("NATS reachable", nats_reachable, config.nats.url.clone());
    if !nats_reachable {
        all_passed = false;
    }

    let state_dir = std::path::Path::new(&config.store.state_dir);
    let writable = std::fs::create_dir_all(state_dir).is_ok()
        && std::fs::write(state_dir.join(".stationd_doctor_probe"), b"probe").is_ok();
    let _ = std::fs::remove_file(state_dir.join(".stationd_doctor_probe"));
    print_check("State directory writable", writable, config.store.state_dir.clone());
    if !writable {
        all_passed = false;
    }

    println!();
    if all_passed {
        println!("All checks passed.");
    } else {
        println!("Some checks failed. Review the output above.");
    }

    all_passed
}

fn print_check(name: &str, passed: bool, detail: String) {
    let status = if passed { "PASS" } else { "FAIL" };
    println!("  [{status}] {name}: {detail}");
}
