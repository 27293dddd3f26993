//! Permission evaluation for a simulated identity.
//!
//! Everything here is a pure function of a [`MetadataSnapshot`] and an
//! [`Identity`]. Nothing asks the kernel whether access would be granted;
//! the scan runs as the real process but answers for the simulated one.
//!
//! Root is special-cased in [`is_executable`] only. Reporting every entry
//! as writable or readable for uid 0 would bury the findings that matter,
//! so [`is_writable`] and [`is_readable`] look at the bits alone.

use std::fs::Metadata;
use std::os::unix::fs::{FileTypeExt, MetadataExt};

use crate::identity::Identity;

pub const S_ISUID: u32 = 0o4000;
pub const S_ISGID: u32 = 0o2000;
pub const S_ISVTX: u32 = 0o1000;

pub const S_IRUSR: u32 = 0o400;
pub const S_IWUSR: u32 = 0o200;
pub const S_IXUSR: u32 = 0o100;
pub const S_IRGRP: u32 = 0o040;
pub const S_IWGRP: u32 = 0o020;
pub const S_IXGRP: u32 = 0o010;
pub const S_IROTH: u32 = 0o004;
pub const S_IWOTH: u32 = 0o002;
pub const S_IXOTH: u32 = 0o001;

/// Permission and special bits, without the file type.
pub const PERMISSION_MASK: u32 = 0o7777;

/// What kind of filesystem object an entry is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
    Socket,
    BlockDevice,
    CharDevice,
    Fifo,
    Unknown,
}

impl EntryKind {
    /// Short label used in reports.
    pub fn label(self) -> &'static str {
        match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "link",
            EntryKind::Socket => "socket",
            EntryKind::BlockDevice => "blkdev",
            EntryKind::CharDevice => "chardev",
            EntryKind::Fifo => "fifo",
            EntryKind::Unknown => "unknown",
        }
    }
}

/// The attributes of one entry that access decisions depend on.
///
/// Built from `lstat` results; a symlink is described as a symlink, never
/// as its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataSnapshot {
    pub kind: EntryKind,
    /// Permission bits including setuid/setgid/sticky.
    pub mode: u32,
    pub uid: u32,
    pub gid: u32,
}

impl MetadataSnapshot {
    pub fn new(kind: EntryKind, mode: u32, uid: u32, gid: u32) -> Self {
        Self {
            kind,
            mode: mode & PERMISSION_MASK,
            uid,
            gid,
        }
    }

    /// Capture a snapshot from `symlink_metadata` output.
    pub fn from_metadata(metadata: &Metadata) -> Self {
        let ft = metadata.file_type();
        let kind = if ft.is_symlink() {
            EntryKind::Symlink
        } else if ft.is_dir() {
            EntryKind::Directory
        } else if ft.is_file() {
            EntryKind::File
        } else if ft.is_socket() {
            EntryKind::Socket
        } else if ft.is_block_device() {
            EntryKind::BlockDevice
        } else if ft.is_char_device() {
            EntryKind::CharDevice
        } else if ft.is_fifo() {
            EntryKind::Fifo
        } else {
            EntryKind::Unknown
        };
        Self::new(kind, metadata.mode(), metadata.uid(), metadata.gid())
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }

    fn has(&self, bits: u32) -> bool {
        self.mode & bits != 0
    }

    /// Other bit, or the owner bit for the owner, or the group bit for a member.
    fn grants(&self, identity: &Identity, other: u32, owner: u32, group: u32) -> bool {
        self.has(other)
            || (self.has(owner) && self.uid == identity.uid())
            || (self.has(group) && identity.in_group(self.gid))
    }
}

/// Could the identity execute (or, for a directory, search) this entry?
pub fn is_executable(snapshot: &MetadataSnapshot, identity: &Identity) -> bool {
    identity.uid() == 0 || snapshot.grants(identity, S_IXOTH, S_IXUSR, S_IXGRP)
}

/// Executable by the identity and set-user-id.
pub fn is_setuid(snapshot: &MetadataSnapshot, identity: &Identity) -> bool {
    snapshot.has(S_ISUID) && is_executable(snapshot, identity)
}

/// Executable by the identity and set-group-id.
pub fn is_setgid(snapshot: &MetadataSnapshot, identity: &Identity) -> bool {
    snapshot.has(S_ISGID) && is_executable(snapshot, identity)
}

/// Do the write bits grant the identity write access? No root bypass.
pub fn is_writable(snapshot: &MetadataSnapshot, identity: &Identity) -> bool {
    snapshot.grants(identity, S_IWOTH, S_IWUSR, S_IWGRP)
}

/// Do the read bits grant the identity read access? No root bypass.
pub fn is_readable(snapshot: &MetadataSnapshot, identity: &Identity) -> bool {
    snapshot.grants(identity, S_IROTH, S_IRUSR, S_IRGRP)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(mode: u32, uid: u32, gid: u32) -> MetadataSnapshot {
        MetadataSnapshot::new(EntryKind::File, mode, uid, gid)
    }

    fn user(uid: u32, groups: &[u32]) -> Identity {
        Identity::new(uid, None, groups.iter().copied())
    }

    #[test]
    fn test_root_executes_anything() {
        let root = user(0, &[]);
        for mode in [0o000, 0o600, 0o4600, 0o7000] {
            assert!(is_executable(&file(mode, 1000, 1000), &root), "mode {:o}", mode);
        }
    }

    #[test]
    fn test_root_gets_no_read_write_bypass() {
        let root = user(0, &[]);
        let locked = file(0o000, 1000, 1000);
        assert!(!is_writable(&locked, &root));
        assert!(!is_readable(&locked, &root));

        // Owned by root: the owner bits apply like for anyone else.
        assert!(is_writable(&file(0o200, 0, 0), &root));
        assert!(!is_writable(&file(0o555, 0, 0), &root));
    }

    #[test]
    fn test_execute_via_each_class() {
        let alice = user(1000, &[10]);
        assert!(is_executable(&file(0o001, 0, 0), &alice));
        assert!(is_executable(&file(0o100, 1000, 0), &alice));
        assert!(!is_executable(&file(0o100, 1001, 0), &alice));
        assert!(is_executable(&file(0o010, 0, 10), &alice));
        assert!(!is_executable(&file(0o010, 0, 11), &alice));
    }

    #[test]
    fn test_owner_bits_do_not_leak_to_others() {
        let alice = user(1000, &[10]);
        let snapshot = file(0o700, 0, 10);
        assert!(!is_executable(&snapshot, &alice));
        assert!(!is_writable(&snapshot, &alice));
        assert!(!is_readable(&snapshot, &alice));
    }

    #[test]
    fn test_write_and_read_via_each_class() {
        let alice = user(1000, &[10]);
        assert!(is_writable(&file(0o002, 0, 0), &alice));
        assert!(is_writable(&file(0o200, 1000, 0), &alice));
        assert!(is_writable(&file(0o020, 0, 10), &alice));
        assert!(!is_writable(&file(0o644, 0, 10), &alice));

        assert!(is_readable(&file(0o004, 0, 0), &alice));
        assert!(is_readable(&file(0o400, 1000, 0), &alice));
        assert!(is_readable(&file(0o040, 0, 10), &alice));
        assert!(!is_readable(&file(0o440, 0, 11), &alice));
    }

    #[test]
    fn test_setuid_requires_execute() {
        let alice = user(1000, &[]);
        assert!(is_setuid(&file(0o4755, 0, 0), &alice));
        assert!(!is_setuid(&file(0o4750, 0, 0), &alice));
        assert!(!is_setuid(&file(0o0755, 0, 0), &alice));
    }

    #[test]
    fn test_setgid_requires_execute() {
        let alice = user(1000, &[50]);
        assert!(is_setgid(&file(0o2751, 0, 0), &alice));
        assert!(is_setgid(&file(0o2710, 0, 50), &alice));
        assert!(!is_setgid(&file(0o2710, 0, 51), &alice));
    }

    #[test]
    fn test_snapshot_masks_file_type_bits() {
        let snapshot = file(0o100755, 0, 0);
        assert_eq!(snapshot.mode, 0o755);
    }

    #[test]
    fn test_snapshot_from_metadata_does_not_follow_links() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("target");
        std::fs::create_dir(&target).unwrap();
        let link = dir.path().join("link");
        std::os::unix::fs::symlink(&target, &link).unwrap();

        let snapshot = MetadataSnapshot::from_metadata(&std::fs::symlink_metadata(&link).unwrap());
        assert!(snapshot.is_symlink());
        let snapshot = MetadataSnapshot::from_metadata(&std::fs::symlink_metadata(&target).unwrap());
        assert!(snapshot.is_dir());
    }

    #[test]
    fn test_kind_labels() {
        assert_eq!(EntryKind::Directory.label(), "directory");
        assert_eq!(EntryKind::BlockDevice.label(), "blkdev");
        assert_eq!(EntryKind::CharDevice.label(), "chardev");
    }
}
