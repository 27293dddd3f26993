//! Identity command - resolves the simulated identity without scanning.

use anyhow::Result;
use std::path::PathBuf;

use crate::identity::{self, Directory, Identity};

/// Who to simulate, as given on the command line or in the config.
#[derive(Debug, Clone, Default)]
pub struct IdentityRequest {
    pub user: Option<String>,
    pub groups: Option<String>,
    pub sysroot: Option<PathBuf>,
}

impl IdentityRequest {
    /// Open the account database and resolve the identity.
    pub fn resolve(&self) -> Result<(Box<dyn Directory>, Identity)> {
        let directory = identity::open_directory(self.sysroot.as_deref())?;
        let identity =
            identity::resolve(directory.as_ref(), self.user.as_deref(), self.groups.as_deref())?;
        Ok((directory, identity))
    }
}

/// Print the `[*] uid=..., groups=...` line.
///
/// This is the only confirmation of which identity a scan simulated, so it
/// is always printed; `to_stderr` keeps stdout clean for JSON output.
pub fn announce(identity: &Identity, directory: &dyn Directory, to_stderr: bool) {
    let line = format!("[*] {}", identity.summary(directory));
    if to_stderr {
        eprintln!("{}", line);
    } else {
        println!("{}", line);
    }
}

/// Execute the identity command.
pub fn cmd_identity(request: &IdentityRequest) -> Result<()> {
    let (directory, identity) = request.resolve()?;
    announce(&identity, directory.as_ref(), false);
    Ok(())
}
