//! Account database read from a sysroot's `etc/passwd` and `etc/group`.
//!
//! Used to audit a mounted image against the users that image defines
//! rather than the users of the host doing the scan.

use anyhow::{Context, Result};
use std::fs;
use std::path::Path;

use super::directory::{Caller, Directory, GroupRecord, UserRecord};

#[derive(Debug, Clone)]
struct GroupEntry {
    record: GroupRecord,
    members: Vec<String>,
}

/// Directory backed by flat passwd/group files.
#[derive(Debug, Clone)]
pub struct FileDirectory {
    users: Vec<UserRecord>,
    groups: Vec<GroupEntry>,
    caller: Caller,
}

impl FileDirectory {
    /// Load `etc/passwd` and `etc/group` from `sysroot`.
    ///
    /// The caller credentials still come from the live process: without a
    /// `--user` override the scan simulates whoever is running it.
    pub fn open(sysroot: &Path) -> Result<Self> {
        let passwd_path = sysroot.join("etc/passwd");
        let group_path = sysroot.join("etc/group");

        let passwd = fs::read_to_string(&passwd_path)
            .with_context(|| format!("Failed to read passwd file at {}", passwd_path.display()))?;
        let group = fs::read_to_string(&group_path)
            .with_context(|| format!("Failed to read group file at {}", group_path.display()))?;

        Self::from_contents(&passwd, &group, Caller::current()?)
            .with_context(|| format!("Corrupted account files under {}", sysroot.display()))
    }

    /// Build a directory from passwd/group file contents.
    pub fn from_contents(passwd: &str, group: &str, caller: Caller) -> Result<Self> {
        Ok(Self {
            users: parse_passwd(passwd)?,
            groups: parse_group(group)?,
            caller,
        })
    }
}

impl Directory for FileDirectory {
    fn user_by_name(&self, name: &str) -> Option<UserRecord> {
        self.users.iter().find(|u| u.name == name).cloned()
    }

    fn user_by_uid(&self, uid: u32) -> Option<UserRecord> {
        self.users.iter().find(|u| u.uid == uid).cloned()
    }

    fn group_by_name(&self, name: &str) -> Option<GroupRecord> {
        self.groups
            .iter()
            .find(|g| g.record.name == name)
            .map(|g| g.record.clone())
    }

    fn group_by_gid(&self, gid: u32) -> Option<GroupRecord> {
        self.groups
            .iter()
            .find(|g| g.record.gid == gid)
            .map(|g| g.record.clone())
    }

    fn group_list(&self, user: &UserRecord) -> Vec<u32> {
        let mut gids = vec![user.gid];
        for entry in &self.groups {
            if entry.members.iter().any(|m| *m == user.name) && !gids.contains(&entry.record.gid) {
                gids.push(entry.record.gid);
            }
        }
        gids
    }

    fn caller(&self) -> Result<Caller> {
        Ok(self.caller.clone())
    }
}

/// Iterate over the meaningful lines of an account file.
fn records(content: &str) -> impl Iterator<Item = (usize, Vec<&str>)> {
    content
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty() && !line.starts_with('#'))
        .map(|(n, line)| (n, line.split(':').collect()))
}

fn parse_passwd(content: &str) -> Result<Vec<UserRecord>> {
    let mut users = Vec::new();
    for (line, fields) in records(content) {
        if fields.len() < 4 {
            anyhow::bail!("passwd line {}: expected at least 4 fields", line);
        }
        let uid: u32 = fields[2].parse().with_context(|| {
            format!("passwd line {}: invalid UID '{}' for user '{}'", line, fields[2], fields[0])
        })?;
        let gid: u32 = fields[3].parse().with_context(|| {
            format!("passwd line {}: invalid GID '{}' for user '{}'", line, fields[3], fields[0])
        })?;
        users.push(UserRecord {
            name: fields[0].to_string(),
            uid,
            gid,
        });
    }
    Ok(users)
}

fn parse_group(content: &str) -> Result<Vec<GroupEntry>> {
    let mut groups = Vec::new();
    for (line, fields) in records(content) {
        if fields.len() < 3 {
            anyhow::bail!("group line {}: expected at least 3 fields", line);
        }
        let gid: u32 = fields[2].parse().with_context(|| {
            format!("group line {}: invalid GID '{}' for group '{}'", line, fields[2], fields[0])
        })?;
        let members = fields
            .get(3)
            .map(|list| {
                list.split(',')
                    .map(str::trim)
                    .filter(|m| !m.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();
        groups.push(GroupEntry {
            record: GroupRecord {
                name: fields[0].to_string(),
                gid,
            },
            members,
        });
    }
    Ok(groups)
}
