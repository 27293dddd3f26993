//! Configuration management for axsaudit.
//!
//! Reads defaults from environment variables (a `.env` file is loaded into
//! the environment by `main`). Command-line flags take precedence.

use std::collections::HashMap;
use std::path::PathBuf;

use crate::report::OutputFormat;

/// axsaudit configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Config {
    /// User to simulate (AXSAUDIT_USER)
    pub user: Option<String>,
    /// Extra comma-separated groups (AXSAUDIT_GROUPS)
    pub groups: Option<String>,
    /// Resolve accounts from this root's etc/passwd and etc/group (AXSAUDIT_SYSROOT)
    pub sysroot: Option<PathBuf>,
    /// Record readable and executable-only entries too (AXSAUDIT_EXTENDED)
    pub extended: bool,
    /// Report format (AXSAUDIT_FORMAT)
    pub format: OutputFormat,
    /// Suppress per-entry diagnostics (AXSAUDIT_QUIET)
    pub quiet: bool,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Self {
        Self::from_vars(std::env::vars())
    }

    /// Build configuration from key/value pairs.
    pub fn from_vars<I>(vars: I) -> Self
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let vars: HashMap<String, String> = vars
            .into_iter()
            .filter(|(key, _)| key.starts_with("AXSAUDIT_"))
            .collect();
        let text = |key: &str| {
            vars.get(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let format = match text("AXSAUDIT_FORMAT") {
            None => OutputFormat::Text,
            Some(value) => OutputFormat::parse(&value).unwrap_or_else(|| {
                eprintln!("  [WARN] Unknown AXSAUDIT_FORMAT '{}', using text", value);
                OutputFormat::Text
            }),
        };

        Self {
            user: text("AXSAUDIT_USER"),
            groups: text("AXSAUDIT_GROUPS"),
            sysroot: text("AXSAUDIT_SYSROOT").map(PathBuf::from),
            extended: text("AXSAUDIT_EXTENDED").is_some_and(|v| parse_flag(&v)),
            format,
            quiet: text("AXSAUDIT_QUIET").is_some_and(|v| parse_flag(&v)),
        }
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  AXSAUDIT_USER: {}", self.user.as_deref().unwrap_or("(invoking user)"));
        println!("  AXSAUDIT_GROUPS: {}", self.groups.as_deref().unwrap_or("(none)"));
        match &self.sysroot {
            Some(root) => println!("  AXSAUDIT_SYSROOT: {}", root.display()),
            None => println!("  AXSAUDIT_SYSROOT: (host accounts)"),
        }
        println!("  AXSAUDIT_EXTENDED: {}", self.extended);
        println!("  AXSAUDIT_FORMAT: {:?}", self.format);
        println!("  AXSAUDIT_QUIET: {}", self.quiet);
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
