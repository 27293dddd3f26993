//! Scan command - audits filesystem trees as the simulated identity.

use anyhow::{bail, Result};
use std::path::PathBuf;

use super::identity::{announce, IdentityRequest};
use crate::report::{self, OutputFormat};
use crate::scan::{Scan, ScanOptions};

/// Everything the scan command needs.
#[derive(Debug, Clone)]
pub struct ScanRequest {
    pub identity: IdentityRequest,
    pub options: ScanOptions,
    pub format: OutputFormat,
    pub paths: Vec<PathBuf>,
}

/// Execute the scan command.
///
/// Roots that cannot be resolved are reported and skipped; the others are
/// still scanned and reported, and the command then fails.
pub fn cmd_scan(request: &ScanRequest) -> Result<()> {
    let (directory, identity) = request.identity.resolve()?;
    let json = request.format == OutputFormat::Json;
    announce(&identity, directory.as_ref(), json);

    let mut scan = Scan::new(&identity, request.options);
    let failed = scan.scan_roots(&request.paths);
    let (store, stats) = scan.into_parts();

    match request.format {
        OutputFormat::Text => report::print_text(&store, directory.as_ref())?,
        OutputFormat::Json => report::print_json(&identity, &store, &stats, directory.as_ref())?,
    }

    if failed > 0 {
        bail!(
            "{} of {} root path(s) could not be resolved",
            failed,
            request.paths.len()
        );
    }
    Ok(())
}
