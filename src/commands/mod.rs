//! CLI command handlers.
//!
//! Each submodule handles a specific CLI command:
//! - `scan` - Audit filesystem trees as the simulated identity
//! - `identity` - Resolve and print the simulated identity
//! - `show` - Display the effective configuration

pub mod identity;
pub mod scan;
pub mod show;

pub use identity::cmd_identity;
pub use scan::cmd_scan;
pub use show::cmd_show;
