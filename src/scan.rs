//! Identity-aware directory traversal.
//!
//! Walks each root depth-first without following symlinks, classifies
//! every entry into the [`FindingStore`], and only descends into
//! directories the simulated identity could search. Errors on a single
//! entry or directory are reported and the walk moves on.

use std::fs;
use std::os::unix::fs::MetadataExt;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::access::{self, MetadataSnapshot};
use crate::findings::FindingStore;
use crate::identity::Identity;
use crate::timing::Timer;

/// Longest path, including the terminating NUL, the scan will stat.
pub const PATH_MAX: usize = libc::PATH_MAX as usize;

/// Scan behavior switches.
#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    /// Also record the readable and executable-only categories.
    pub extended: bool,
    /// Do not descend into directories on another filesystem.
    pub one_file_system: bool,
    /// Suppress per-entry diagnostics (counts are still kept).
    pub quiet: bool,
    /// Print per-root elapsed time.
    pub progress: bool,
}

/// Counters for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub roots_scanned: usize,
    pub roots_failed: usize,
    /// Non-symlink entries that were classified.
    pub entries: usize,
    pub symlinks_skipped: usize,
    /// Directories not descended because the identity cannot search them.
    pub dirs_pruned: usize,
    /// Directories not descended because they sit on another filesystem.
    pub mounts_skipped: usize,
    /// Entries or directories skipped because of an error.
    pub errors: usize,
}

impl ScanStats {
    /// Counts accumulated since `before`.
    pub fn since(&self, before: &ScanStats) -> ScanStats {
        ScanStats {
            roots_scanned: self.roots_scanned - before.roots_scanned,
            roots_failed: self.roots_failed - before.roots_failed,
            entries: self.entries - before.entries,
            symlinks_skipped: self.symlinks_skipped - before.symlinks_skipped,
            dirs_pruned: self.dirs_pruned - before.dirs_pruned,
            mounts_skipped: self.mounts_skipped - before.mounts_skipped,
            errors: self.errors - before.errors,
        }
    }
}

/// What the walk does with a directory it just classified.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Descent {
    Enter,
    NotSearchable,
    OtherFilesystem,
}

fn descent(
    snapshot: &MetadataSnapshot,
    device: u64,
    root_device: u64,
    identity: &Identity,
    one_file_system: bool,
) -> Descent {
    if !access::is_executable(snapshot, identity) {
        Descent::NotSearchable
    } else if one_file_system && device != root_device {
        Descent::OtherFilesystem
    } else {
        Descent::Enter
    }
}

/// One scan run: the identity, the findings and the counters.
pub struct Scan<'a> {
    identity: &'a Identity,
    options: ScanOptions,
    store: FindingStore,
    stats: ScanStats,
    roots: Vec<(PathBuf, ScanStats)>,
}

impl<'a> Scan<'a> {
    pub fn new(identity: &'a Identity, options: ScanOptions) -> Self {
        Self {
            identity,
            options,
            store: FindingStore::new(options.extended),
            stats: ScanStats::default(),
            roots: Vec::new(),
        }
    }

    pub fn store(&self) -> &FindingStore {
        &self.store
    }

    pub fn stats(&self) -> ScanStats {
        self.stats
    }

    /// Per-root counts, in scan order.
    pub fn root_stats(&self) -> &[(PathBuf, ScanStats)] {
        &self.roots
    }

    pub fn into_parts(self) -> (FindingStore, ScanStats) {
        (self.store, self.stats)
    }

    /// Scan every root. Returns how many could not be resolved.
    pub fn scan_roots<P: AsRef<Path>>(&mut self, roots: &[P]) -> usize {
        roots
            .iter()
            .filter(|root| !self.scan_root(root.as_ref()))
            .count()
    }

    /// Resolve and scan one root.
    ///
    /// Returns `false` if the root could not be canonicalized; the failure
    /// is reported and nothing under it is scanned.
    pub fn scan_root(&mut self, root: &Path) -> bool {
        let canonical = match fs::canonicalize(root) {
            Ok(path) => path,
            Err(e) => {
                eprintln!("[!] Unable to resolve path \"{}\": {}", root.display(), e);
                self.stats.roots_failed += 1;
                return false;
            }
        };

        let timer = Timer::start(&format!("scan {}", canonical.display()));
        let before = self.stats;

        match fs::symlink_metadata(&canonical) {
            Ok(metadata) if metadata.is_dir() => self.walk(&canonical, metadata.dev()),
            Ok(metadata) => {
                // A single non-directory root is audited on its own.
                let snapshot = MetadataSnapshot::from_metadata(&metadata);
                self.stats.entries += 1;
                self.store.classify(&canonical, &snapshot, self.identity);
            }
            Err(e) => self.error(format!("Unable to lstat \"{}\": {}", canonical.display(), e)),
        }

        self.stats.roots_scanned += 1;
        let counts = self.stats.since(&before);
        // Printed even when quiet.
        eprintln!("[*] {}", root_summary(&canonical, &counts));
        if self.options.progress {
            timer.finish();
        }
        self.roots.push((canonical, counts));
        true
    }

    // walkdir opens every directory it yields before handing it back, so
    // skip_current_dir always drops exactly that directory's listing.
    // The device bound is checked here rather than with same_file_system,
    // which yields mount points without opening them.
    fn walk(&mut self, root: &Path, root_device: u64) {
        let mut entries = WalkDir::new(root)
            .min_depth(1)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter();

        while let Some(next) = entries.next() {
            let entry = match next {
                Ok(entry) => entry,
                Err(e) => {
                    let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
                    let cause = e
                        .io_error()
                        .map(|io| io.to_string())
                        .unwrap_or_else(|| e.to_string());
                    self.error(format!("Unable to open dir \"{}\": {}", path.display(), cause));
                    continue;
                }
            };

            let path = entry.path();
            if path.as_os_str().len() + 1 > PATH_MAX {
                self.error(format!("name too long \"{}\"", path.display()));
                if entry.file_type().is_dir() {
                    entries.skip_current_dir();
                }
                continue;
            }

            // follow_links(false): this is lstat, never the link target.
            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    self.error(format!("Unable to lstat \"{}\": {}", path.display(), e));
                    if entry.file_type().is_dir() {
                        entries.skip_current_dir();
                    }
                    continue;
                }
            };

            let snapshot = MetadataSnapshot::from_metadata(&metadata);
            if snapshot.is_symlink() {
                self.stats.symlinks_skipped += 1;
                continue;
            }

            self.stats.entries += 1;
            self.store.classify(path, &snapshot, self.identity);

            if !snapshot.is_dir() {
                continue;
            }
            match descent(
                &snapshot,
                metadata.dev(),
                root_device,
                self.identity,
                self.options.one_file_system,
            ) {
                Descent::Enter => {}
                Descent::NotSearchable => {
                    self.stats.dirs_pruned += 1;
                    entries.skip_current_dir();
                }
                Descent::OtherFilesystem => {
                    self.stats.mounts_skipped += 1;
                    entries.skip_current_dir();
                }
            }
        }
    }

    fn error(&mut self, message: String) {
        self.stats.errors += 1;
        if !self.options.quiet {
            eprintln!("[!] {}", message);
        }
    }
}

/// One-line per-root counts: `<root>: N entries, ...`.
pub fn root_summary(root: &Path, counts: &ScanStats) -> String {
    let mut line = format!(
        "{}: {} entries, {} symlinks skipped, {} directories not searchable",
        root.display(),
        counts.entries,
        counts.symlinks_skipped,
        counts.dirs_pruned,
    );
    if counts.mounts_skipped > 0 {
        line.push_str(&format!(", {} other filesystems", counts.mounts_skipped));
    }
    line.push_str(&format!(", {} errors", counts.errors));
    line
}
