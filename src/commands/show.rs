//! Show command - displays the effective configuration.

use anyhow::Result;

use crate::config::Config;

/// Execute the show command.
pub fn cmd_show(config: &Config) -> Result<()> {
    config.print();
    Ok(())
}
