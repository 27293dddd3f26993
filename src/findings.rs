//! Classified scan results.
//!
//! Each entry lands in at most one [`Category`]: the first predicate that
//! matches in [`Category::ALL`] order wins. An entry that is both setuid
//! and world-writable is therefore reported as setuid only. Buckets are
//! append-only and keep discovery order.

use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};

use crate::access::{self, MetadataSnapshot};
use crate::identity::Identity;

/// Classification buckets, in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Setuid,
    Setgid,
    Writable,
    /// Extended mode only.
    Readable,
    /// Extended mode only.
    ExecutableOnly,
}

impl Category {
    /// All categories in precedence order.
    pub const ALL: [Category; 5] = [
        Category::Setuid,
        Category::Setgid,
        Category::Writable,
        Category::Readable,
        Category::ExecutableOnly,
    ];

    /// Whether the category is only recorded in extended mode.
    pub fn is_extended(self) -> bool {
        matches!(self, Category::Readable | Category::ExecutableOnly)
    }

    /// Human description used in report headers.
    pub fn description(self) -> &'static str {
        match self {
            Category::Setuid => "set-uid executable",
            Category::Setgid => "set-gid executable",
            Category::Writable => "writable",
            Category::Readable => "readable",
            Category::ExecutableOnly => "only executable",
        }
    }

    fn matches(self, snapshot: &MetadataSnapshot, identity: &Identity) -> bool {
        match self {
            Category::Setuid => access::is_setuid(snapshot, identity),
            Category::Setgid => access::is_setgid(snapshot, identity),
            Category::Writable => access::is_writable(snapshot, identity),
            Category::Readable => access::is_readable(snapshot, identity),
            Category::ExecutableOnly => access::is_executable(snapshot, identity),
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Setuid => write!(f, "SETUID"),
            Category::Setgid => write!(f, "SETGID"),
            Category::Writable => write!(f, "WRITABLE"),
            Category::Readable => write!(f, "READABLE"),
            Category::ExecutableOnly => write!(f, "EXECUTABLE_ONLY"),
        }
    }
}

/// Pick the category for an entry, or `None` if nothing matches.
pub fn categorize(
    snapshot: &MetadataSnapshot,
    identity: &Identity,
    extended: bool,
) -> Option<Category> {
    Category::ALL
        .into_iter()
        .filter(|c| extended || !c.is_extended())
        .find(|c| c.matches(snapshot, identity))
}

/// A recorded entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub path: PathBuf,
    pub snapshot: MetadataSnapshot,
}

/// Per-category findings for one run.
#[derive(Debug, Default)]
pub struct FindingStore {
    extended: bool,
    buckets: [Vec<Finding>; 5],
}

impl FindingStore {
    pub fn new(extended: bool) -> Self {
        Self {
            extended,
            buckets: Default::default(),
        }
    }

    pub fn is_extended(&self) -> bool {
        self.extended
    }

    /// Append a finding to `category`. The path is copied.
    pub fn record(&mut self, category: Category, path: &Path, snapshot: MetadataSnapshot) {
        self.buckets[category.index()].push(Finding {
            path: path.to_path_buf(),
            snapshot,
        });
    }

    /// Categorize an entry and record it. Returns where it went.
    pub fn classify(
        &mut self,
        path: &Path,
        snapshot: &MetadataSnapshot,
        identity: &Identity,
    ) -> Option<Category> {
        let category = categorize(snapshot, identity, self.extended)?;
        self.record(category, path, *snapshot);
        Some(category)
    }

    /// Findings of one category in discovery order.
    pub fn findings(&self, category: Category) -> &[Finding] {
        &self.buckets[category.index()]
    }

    pub fn len(&self, category: Category) -> usize {
        self.buckets[category.index()].len()
    }

    pub fn total(&self) -> usize {
        self.buckets.iter().map(Vec::len).sum()
    }

    /// Categories this store reports, in report order.
    pub fn categories(&self) -> impl Iterator<Item = Category> + '_ {
        Category::ALL
            .into_iter()
            .filter(move |c| self.extended || !c.is_extended())
    }
}
