//! axsaudit - what could this user do on this filesystem?
//!
//! Walks directory trees and reports, for a simulated user and group set:
//! - set-uid and set-gid executables the user could run
//! - entries the user could write
//! - optionally, entries the user could only read or only execute

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use axsaudit::commands;
use axsaudit::commands::identity::IdentityRequest;
use axsaudit::commands::scan::ScanRequest;
use axsaudit::config::Config;
use axsaudit::report::OutputFormat;
use axsaudit::scan::ScanOptions;

#[derive(Parser)]
#[command(name = "axsaudit")]
#[command(about = "Audit filesystem access for a simulated user")]
#[command(
    after_help = "EXAMPLES:\n  axsaudit scan /usr /etc              Audit as the invoking user\n  axsaudit scan -u nobody -g video /   Audit as nobody, plus group video\n  axsaudit identity -u 1000            Show who would be simulated"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct IdentityArgs {
    /// Pretend to be this user name or id; its groups become the initial group list
    #[arg(short, long)]
    user: Option<String>,

    /// Add these group names or ids to the group list (comma separated)
    #[arg(short, long)]
    groups: Option<String>,

    /// Resolve users and groups from DIR/etc/passwd and DIR/etc/group
    #[arg(long, value_name = "DIR")]
    sysroot: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Scan directory trees and report privilege-relevant access
    Scan {
        #[command(flatten)]
        who: IdentityArgs,

        /// Also report entries that are only readable or only executable
        #[arg(long)]
        extended: bool,

        /// Report format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,

        /// Do not descend into other filesystems
        #[arg(short = 'x', long)]
        one_file_system: bool,

        /// Suppress per-entry error messages
        #[arg(short, long)]
        quiet: bool,

        /// Directories (or files) to audit
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Resolve and print the simulated identity
    Identity {
        #[command(flatten)]
        who: IdentityArgs,
    },

    /// Show current configuration
    ShowConfig,
}

impl IdentityArgs {
    /// Command-line values win over configured ones.
    fn into_request(self, config: &Config) -> IdentityRequest {
        IdentityRequest {
            user: self.user.or_else(|| config.user.clone()),
            groups: self.groups.or_else(|| config.groups.clone()),
            sysroot: self.sysroot.or_else(|| config.sysroot.clone()),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    let config = Config::load();

    match cli.command {
        Commands::Scan {
            who,
            extended,
            format,
            one_file_system,
            quiet,
            paths,
        } => {
            let quiet = quiet || config.quiet;
            let request = ScanRequest {
                identity: who.into_request(&config),
                options: ScanOptions {
                    extended: extended || config.extended,
                    one_file_system,
                    quiet,
                    progress: !quiet,
                },
                format: format.unwrap_or(config.format),
                paths,
            };
            commands::cmd_scan(&request)?;
        }

        Commands::Identity { who } => {
            commands::cmd_identity(&who.into_request(&config))?;
        }

        Commands::ShowConfig => {
            commands::cmd_show(&config)?;
        }
    }

    Ok(())
}
