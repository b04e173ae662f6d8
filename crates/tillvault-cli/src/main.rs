mod cli;
mod cmd;
mod config_gen;
mod context;
mod format;
mod signal;
mod table;

use std::path::{Path, PathBuf};

use clap::Parser;

use tillvault_core::config::AppConfig;

use cli::{Cli, Commands};
use config_gen::run_config_generate;
use context::AppContext;

/// Environment variable naming the config file, checked after --config.
const CONFIG_ENV: &str = "TILLVAULT_CONFIG";
const DEFAULT_CONFIG: &str = "tillvault.yaml";

fn main() {
    let cli = Cli::parse();

    // Initialize logging — auto-upgrade to info for daemon
    let filter = match cli.verbose {
        0 if matches!(&cli.command, Commands::Daemon) => "info",
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    // Handle `config` subcommand early — no config file needed
    if let Commands::Config { dest } = &cli.command {
        if let Err(e) = run_config_generate(dest.as_deref()) {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
        return;
    }

    let path = match resolve_config_path(cli.config.as_deref()) {
        Some(p) => p,
        None => {
            eprintln!("Error: no configuration file found.");
            eprintln!("Searched: --config flag, ${CONFIG_ENV}, ./{DEFAULT_CONFIG}");
            eprintln!();
            eprintln!("Run `tillvault config` to generate a starter config file.");
            std::process::exit(1);
        }
    };

    tracing::info!("Using config: {}", path.display());

    let config = match AppConfig::load(&path) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    let ctx = match AppContext::new(config) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    let result = match &cli.command {
        Commands::Backup {
            remote,
            no_local,
            encrypt,
            label,
        } => cmd::backup::run_backup(&ctx, *remote, *no_local, *encrypt, label.clone()),
        Commands::Restore {
            backup,
            skip_safety_backup,
        } => cmd::restore::run_restore(&ctx, backup, *skip_safety_backup),
        Commands::List { last, auto } => cmd::list::run_list(&ctx, *last, *auto),
        Commands::Delete { id } => cmd::delete::run_delete(&ctx, id),
        Commands::Export { id, dest } => cmd::export::run_export(&ctx, id, dest),
        Commands::Status => cmd::status::run_status(&ctx),
        Commands::Daemon => cmd::daemon::run_daemon(&ctx),
        Commands::Config { .. } => unreachable!("handled above"),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

/// Resolution order: explicit flag, environment variable, working
/// directory. The flag and environment paths are trusted as given; only
/// the default is existence-checked.
fn resolve_config_path(flag: Option<&str>) -> Option<PathBuf> {
    if let Some(flag) = flag {
        return Some(PathBuf::from(flag));
    }
    if let Ok(env) = std::env::var(CONFIG_ENV) {
        if !env.is_empty() {
            return Some(PathBuf::from(env));
        }
    }
    let default = Path::new(DEFAULT_CONFIG);
    if default.exists() {
        return Some(default.to_path_buf());
    }
    None
}
