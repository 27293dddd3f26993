//! Rendering findings for people and for tools.

use anyhow::{Context, Result};
use serde::Serialize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::io::Write;

use crate::findings::{Category, Finding, FindingStore};
use crate::identity::{Directory, Identity};
use crate::scan::ScanStats;

/// Report output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl OutputFormat {
    /// Parse a config value; `None` if unrecognized.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "text" => Some(OutputFormat::Text),
            "json" => Some(OutputFormat::Json),
            _ => None,
        }
    }
}

/// Memoized owner/group names. Reports repeat the same few owners a lot.
pub struct Names<'a> {
    directory: &'a dyn Directory,
    users: RefCell<HashMap<u32, String>>,
    groups: RefCell<HashMap<u32, String>>,
}

impl<'a> Names<'a> {
    pub fn new(directory: &'a dyn Directory) -> Self {
        Self {
            directory,
            users: RefCell::new(HashMap::new()),
            groups: RefCell::new(HashMap::new()),
        }
    }

    pub fn user(&self, uid: u32) -> String {
        self.users
            .borrow_mut()
            .entry(uid)
            .or_insert_with(|| self.directory.user_label(uid))
            .clone()
    }

    pub fn group(&self, gid: u32) -> String {
        self.groups
            .borrow_mut()
            .entry(gid)
            .or_insert_with(|| self.directory.group_label(gid))
            .clone()
    }
}

/// One report line: `<type> <mode> <owner> <group> <path>`.
pub fn format_finding(finding: &Finding, names: &Names<'_>) -> String {
    let snapshot = &finding.snapshot;
    format!(
        "    {:>9} {:04o} {} {} {}",
        snapshot.kind.label(),
        snapshot.mode,
        names.user(snapshot.uid),
        names.group(snapshot.gid),
        finding.path.display()
    )
}

/// Print the text report.
///
/// Headers go to stderr and finding lines to stdout, so the list can be
/// piped on its own.
pub fn print_text(store: &FindingStore, directory: &dyn Directory) -> Result<()> {
    let names = Names::new(directory);
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    for category in store.categories() {
        eprintln!(
            "[*] Found {} entries that are {}",
            store.len(category),
            category.description()
        );
        // Keep header and lines interleaved when both streams are a tty.
        out.flush().ok();
        for finding in store.findings(category) {
            writeln!(out, "{}", format_finding(finding, &names)).context("Failed to write report")?;
        }
        out.flush().context("Failed to write report")?;
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct JsonReport {
    identity: JsonIdentity,
    stats: JsonStats,
    categories: Vec<JsonCategory>,
}

#[derive(Debug, Serialize)]
struct JsonIdentity {
    uid: u32,
    name: Option<String>,
    groups: Vec<JsonGroup>,
}

#[derive(Debug, Serialize)]
struct JsonGroup {
    gid: u32,
    name: Option<String>,
}

#[derive(Debug, Serialize)]
struct JsonStats {
    roots_scanned: usize,
    roots_failed: usize,
    entries: usize,
    symlinks_skipped: usize,
    dirs_pruned: usize,
    mounts_skipped: usize,
    errors: usize,
}

#[derive(Debug, Serialize)]
struct JsonCategory {
    category: Category,
    description: &'static str,
    findings: Vec<JsonFinding>,
}

#[derive(Debug, Serialize)]
struct JsonFinding {
    path: String,
    #[serde(rename = "type")]
    kind: &'static str,
    mode: String,
    uid: u32,
    gid: u32,
    owner: String,
    group: String,
}

/// Build the JSON report document.
pub fn to_json(
    identity: &Identity,
    store: &FindingStore,
    stats: &ScanStats,
    directory: &dyn Directory,
) -> Result<serde_json::Value> {
    let names = Names::new(directory);

    let report = JsonReport {
        identity: JsonIdentity {
            uid: identity.uid(),
            name: identity.name().map(String::from),
            groups: identity
                .groups()
                .map(|gid| JsonGroup {
                    gid,
                    name: directory.group_by_gid(gid).map(|g| g.name),
                })
                .collect(),
        },
        stats: JsonStats {
            roots_scanned: stats.roots_scanned,
            roots_failed: stats.roots_failed,
            entries: stats.entries,
            symlinks_skipped: stats.symlinks_skipped,
            dirs_pruned: stats.dirs_pruned,
            mounts_skipped: stats.mounts_skipped,
            errors: stats.errors,
        },
        categories: store
            .categories()
            .map(|category| JsonCategory {
                category,
                description: category.description(),
                findings: store
                    .findings(category)
                    .iter()
                    .map(|f| JsonFinding {
                        path: f.path.to_string_lossy().into_owned(),
                        kind: f.snapshot.kind.label(),
                        mode: format!("{:04o}", f.snapshot.mode),
                        uid: f.snapshot.uid,
                        gid: f.snapshot.gid,
                        owner: names.user(f.snapshot.uid),
                        group: names.group(f.snapshot.gid),
                    })
                    .collect(),
            })
            .collect(),
    };

    serde_json::to_value(report).context("Failed to serialize report")
}

/// Print the JSON report to stdout.
pub fn print_json(
    identity: &Identity,
    store: &FindingStore,
    stats: &ScanStats,
    directory: &dyn Directory,
) -> Result<()> {
    let value = to_json(identity, store, stats, directory)?;
    let text = serde_json::to_string_pretty(&value).context("Failed to serialize report")?;
    println!("{}", text);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::{EntryKind, MetadataSnapshot};
    use crate::identity::{Caller, FileDirectory};
    use std::path::Path;

    fn directory() -> FileDirectory {
        FileDirectory::from_contents(
            "root:x:0:0::/root:/bin/sh\nalice:x:1000:1000::/home/alice:/bin/sh\n",
            "root:x:0:\nwheel:x:10:alice\n",
            Caller {
                uid: 1000,
                groups: vec![1000],
            },
        )
        .unwrap()
    }

    fn store() -> FindingStore {
        let mut store = FindingStore::new(false);
        store.record(
            Category::Setuid,
            Path::new("/usr/bin/passwd"),
            MetadataSnapshot::new(EntryKind::File, 0o4755, 0, 0),
        );
        store.record(
            Category::Writable,
            Path::new("/srv/drop"),
            MetadataSnapshot::new(EntryKind::Directory, 0o1777, 1000, 4242),
        );
        store
    }

    #[test]
    fn test_format_finding_line() {
        let dir = directory();
        let names = Names::new(&dir);
        let store = store();

        assert_eq!(
            format_finding(&store.findings(Category::Setuid)[0], &names),
            "         file 4755 root root /usr/bin/passwd"
        );
        assert_eq!(
            format_finding(&store.findings(Category::Writable)[0], &names),
            "    directory 1777 alice 4242 /srv/drop"
        );
    }

    #[test]
    fn test_json_report_shape() {
        let dir = directory();
        let identity = Identity::new(1000, Some("alice".into()), [10, 5000]);
        let stats = ScanStats {
            roots_scanned: 1,
            entries: 2,
            ..Default::default()
        };

        let value = to_json(&identity, &store(), &stats, &dir).unwrap();

        assert_eq!(value["identity"]["uid"], 1000);
        assert_eq!(value["identity"]["groups"][0]["name"], "wheel");
        assert!(value["identity"]["groups"][1]["name"].is_null());
        assert_eq!(value["stats"]["entries"], 2);

        let categories = value["categories"].as_array().unwrap();
        assert_eq!(categories.len(), 3);
        assert_eq!(categories[0]["category"], "setuid");
        assert_eq!(categories[0]["findings"][0]["mode"], "4755");
        assert_eq!(categories[0]["findings"][0]["type"], "file");
        assert_eq!(categories[1]["findings"].as_array().unwrap().len(), 0);
        assert_eq!(categories[2]["findings"][0]["owner"], "alice");
        assert_eq!(categories[2]["findings"][0]["group"], "4242");
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!(OutputFormat::parse("JSON"), Some(OutputFormat::Json));
        assert_eq!(OutputFormat::parse(" text "), Some(OutputFormat::Text));
        assert_eq!(OutputFormat::parse("yaml"), None);
    }
}
