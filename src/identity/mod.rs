//! Simulated identity construction.
//!
//! An [`Identity`] is the uid and group set every access decision is
//! evaluated against. It is built once, before the scan starts, either from
//! the invoking process or from a `--user`/`--groups` override, and is
//! read-only afterwards.

mod directory;
mod files;
mod system;

use anyhow::Result;
use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

pub use directory::{Caller, Directory, GroupRecord, UserRecord};
pub use files::FileDirectory;
pub use system::SystemDirectory;

/// Upper bound on the simulated group set (Linux `NGROUPS_MAX`).
pub const MAX_GROUPS: usize = 65536;

/// Fatal problems while building the simulated identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    /// The user token is neither a known name nor a number.
    InvalidUser(String),
    /// A group token is neither a known name nor a number.
    InvalidGroup(String),
    /// The group set would exceed its bound.
    TooManyGroups { limit: usize },
}

impl fmt::Display for IdentityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityError::InvalidUser(user) => write!(f, "Invalid user id: {}", user),
            IdentityError::InvalidGroup(group) => write!(f, "Unknown/invalid group: {}", group),
            IdentityError::TooManyGroups { limit } => {
                write!(f, "Too many groups (limit is {})", limit)
            }
        }
    }
}

impl std::error::Error for IdentityError {}

/// The identity a scan evaluates access for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    uid: u32,
    name: Option<String>,
    groups: BTreeSet<u32>,
}

impl Identity {
    /// Build an identity directly from a uid and group ids.
    pub fn new(uid: u32, name: Option<String>, groups: impl IntoIterator<Item = u32>) -> Self {
        Self {
            uid,
            name,
            groups: groups.into_iter().collect(),
        }
    }

    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// User name, when the uid has an account.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Group ids in ascending order.
    pub fn groups(&self) -> impl Iterator<Item = u32> + '_ {
        self.groups.iter().copied()
    }

    pub fn in_group(&self, gid: u32) -> bool {
        self.groups.contains(&gid)
    }

    /// One-line summary, e.g. `uid=1000(alice), groups=10(wheel),1000(alice)`.
    pub fn summary(&self, directory: &dyn Directory) -> String {
        let groups = self
            .groups()
            .map(|gid| match directory.group_by_gid(gid) {
                Some(group) => format!("{}({})", gid, group.name),
                None => format!("{}(?)", gid),
            })
            .collect::<Vec<_>>()
            .join(",");
        format!(
            "uid={}({}), groups={}",
            self.uid,
            self.name.as_deref().unwrap_or("?"),
            groups
        )
    }
}

/// Bounded group set used while resolving.
#[derive(Debug)]
struct GroupSet {
    gids: BTreeSet<u32>,
    limit: usize,
}

impl GroupSet {
    fn with_limit(limit: usize) -> Self {
        Self {
            gids: BTreeSet::new(),
            limit,
        }
    }

    fn add(&mut self, gid: u32) -> Result<(), IdentityError> {
        if self.gids.contains(&gid) {
            return Ok(());
        }
        if self.gids.len() >= self.limit {
            return Err(IdentityError::TooManyGroups { limit: self.limit });
        }
        self.gids.insert(gid);
        Ok(())
    }
}

/// Pick the account database: the host's, or the one under `sysroot`.
pub fn open_directory(sysroot: Option<&Path>) -> Result<Box<dyn Directory>> {
    match sysroot {
        Some(root) => Ok(Box::new(FileDirectory::open(root)?)),
        None => Ok(Box::new(SystemDirectory::new())),
    }
}

/// Resolve the simulated identity.
///
/// Without `user` the identity is the invoking process: its real uid, its
/// supplementary groups and its primary group. With `user` the token is
/// looked up by name, then parsed as a number; groups come from that
/// user's memberships. `groups` adds comma-separated names or gids.
pub fn resolve(
    directory: &dyn Directory,
    user: Option<&str>,
    groups: Option<&str>,
) -> Result<Identity> {
    resolve_with_limit(directory, user, groups, MAX_GROUPS)
}

fn resolve_with_limit(
    directory: &dyn Directory,
    user: Option<&str>,
    groups: Option<&str>,
    limit: usize,
) -> Result<Identity> {
    let mut set = GroupSet::with_limit(limit);

    let (uid, record) = match user {
        None => {
            let caller = directory.caller()?;
            let record = directory.user_by_uid(caller.uid);
            for gid in caller.groups {
                set.add(gid)?;
            }
            (caller.uid, record)
        }
        Some(token) => match directory.user_by_name(token) {
            Some(record) => (record.uid, Some(record)),
            None => {
                let uid = parse_id(token)
                    .ok_or_else(|| IdentityError::InvalidUser(token.to_string()))?;
                (uid, directory.user_by_uid(uid))
            }
        },
    };

    match &record {
        Some(account) => {
            if user.is_some() {
                for gid in directory.group_list(account) {
                    set.add(gid)?;
                }
            }
            // Membership lists need not repeat the primary group.
            set.add(account.gid)?;
        }
        None => {
            eprintln!("[!] Unable to find uid {}, trying anyway...", uid);
        }
    }

    if let Some(list) = groups {
        for token in list.split(',').map(str::trim).filter(|t| !t.is_empty()) {
            set.add(resolve_group(directory, token)?)?;
        }
    }

    Ok(Identity {
        uid,
        name: record.map(|r| r.name),
        groups: set.gids,
    })
}

/// Resolve one `--groups` token to a gid.
fn resolve_group(directory: &dyn Directory, token: &str) -> Result<u32, IdentityError> {
    if let Some(group) = directory.group_by_name(token) {
        return Ok(group.gid);
    }
    let gid = parse_id(token).ok_or_else(|| IdentityError::InvalidGroup(token.to_string()))?;
    if directory.group_by_gid(gid).is_none() {
        eprintln!("[!] Unable to find gid {}, trying anyway...", token);
    }
    Ok(gid)
}

/// Parse a numeric id with C-style base detection.
///
/// `0x`/`0X` selects hex, a leading `0` selects octal, anything else is
/// decimal. An optional `+` is accepted; the whole token must be digits.
pub fn parse_id(token: &str) -> Option<u32> {
    let unsigned = token.strip_prefix('+').unwrap_or(token);
    let (radix, digits) = if let Some(hex) = unsigned
        .strip_prefix("0x")
        .or_else(|| unsigned.strip_prefix("0X"))
    {
        (16, hex)
    } else if unsigned.len() > 1 && unsigned.starts_with('0') {
        (8, &unsigned[1..])
    } else {
        (10, unsigned)
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}
