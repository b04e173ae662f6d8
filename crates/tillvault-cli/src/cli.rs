use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "tillvault",
    version,
    about = "Encrypted backup and restore for point-of-sale back-office data",
    after_help = "\
Configuration file lookup order:
  1. --config <path>             (explicit flag)
  2. $TILLVAULT_CONFIG           (environment variable)
  3. ./tillvault.yaml            (working directory)

Environment variables:
  TILLVAULT_CONFIG      Path to configuration file (overrides default search)
  TILLVAULT_PASSPHRASE  Encryption passphrase (overridden by the config file)"
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides TILLVAULT_CONFIG and default search)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Snapshot the application state to the configured destinations
    Backup {
        /// Also write to this configured remote backend
        #[arg(long)]
        remote: bool,

        /// Skip the local backup directory
        #[arg(long)]
        no_local: bool,

        /// Encrypt the backup (requires a passphrase)
        #[arg(short, long)]
        encrypt: bool,

        /// Free-form label stored in the backup metadata
        #[arg(short, long)]
        label: Option<String>,
    },

    /// Restore application state from a backup
    Restore {
        /// Backup to restore: a history record id, or a path to an
        /// exported backup file
        backup: String,

        /// Skip the automatic safety snapshot of the current state
        #[arg(long)]
        skip_safety_backup: bool,
    },

    /// List backup history, most recent first
    List {
        /// Show only the N most recent records
        #[arg(long)]
        last: Option<usize>,

        /// Show only scheduler-created backups
        #[arg(long)]
        auto: bool,
    },

    /// Delete a backup record from the history
    Delete {
        /// History record id to delete
        id: String,
    },

    /// Copy a local backup to a file for safekeeping or transfer
    Export {
        /// History record id to export
        id: String,

        /// Destination file path
        dest: String,
    },

    /// Show scheduler status and the last backup time
    Status,

    /// Run scheduled backups as a foreground daemon
    Daemon,

    /// Generate a starter configuration file
    Config {
        /// Destination path (default: ./tillvault.yaml)
        #[arg(short, long)]
        dest: Option<String>,
    },
}
