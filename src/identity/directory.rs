//! User and group name resolution.
//!
//! The resolver never talks to the user database directly; it goes through
//! the [`Directory`] trait so a scan can be evaluated against either the
//! host's accounts or the accounts of a mounted image.

use anyhow::Result;

/// A user account as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub name: String,
    pub uid: u32,
    /// Primary group.
    pub gid: u32,
}

/// A group as seen by the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupRecord {
    pub name: String,
    pub gid: u32,
}

/// Credentials of the process running the scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    pub uid: u32,
    /// Supplementary groups as reported by the kernel.
    pub groups: Vec<u32>,
}

impl Caller {
    /// Read the real uid and supplementary groups of this process.
    pub fn current() -> Result<Self> {
        Ok(Self {
            uid: super::system::real_uid(),
            groups: super::system::supplementary_groups()?,
        })
    }
}

/// Name/id lookups for users and groups.
///
/// Lookups that find nothing return `None`. The resolver decides whether a
/// miss is fatal or only worth a warning.
pub trait Directory {
    fn user_by_name(&self, name: &str) -> Option<UserRecord>;
    fn user_by_uid(&self, uid: u32) -> Option<UserRecord>;
    fn group_by_name(&self, name: &str) -> Option<GroupRecord>;
    fn group_by_gid(&self, gid: u32) -> Option<GroupRecord>;

    /// Every group the user belongs to, primary group included.
    fn group_list(&self, user: &UserRecord) -> Vec<u32>;

    /// Credentials of the invoking process.
    fn caller(&self) -> Result<Caller>;

    /// Display name for a uid, falling back to the number.
    fn user_label(&self, uid: u32) -> String {
        self.user_by_uid(uid)
            .map(|u| u.name)
            .unwrap_or_else(|| uid.to_string())
    }

    /// Display name for a gid, falling back to the number.
    fn group_label(&self, gid: u32) -> String {
        self.group_by_gid(gid)
            .map(|g| g.name)
            .unwrap_or_else(|| gid.to_string())
    }
}
