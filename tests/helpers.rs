//! Shared test utilities for axsaudit tests.

#![allow(dead_code)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use axsaudit::identity::Identity;

/// Test environment with a temporary tree to scan and a mock sysroot.
pub struct TestEnv {
    /// Temporary directory (kept alive for lifetime of TestEnv)
    pub _temp_dir: TempDir,
    /// Root of the tree the tests scan
    pub root: PathBuf,
    /// Mock sysroot holding etc/passwd and etc/group
    pub sysroot: PathBuf,
}

impl TestEnv {
    /// Create a new test environment with temporary directories.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let base = temp_dir.path();

        let root = base.join("t");
        let sysroot = base.join("sysroot");

        fs::create_dir_all(&root).expect("Failed to create scan root");
        fs::create_dir_all(sysroot.join("etc")).expect("Failed to create sysroot");
        set_mode(&root, 0o755);

        Self {
            _temp_dir: temp_dir,
            root,
            sysroot,
        }
    }

    /// Canonical form of a path under the scan root.
    pub fn canonical(&self, rel: &str) -> PathBuf {
        fs::canonicalize(&self.root)
            .expect("Failed to canonicalize scan root")
            .join(rel)
    }

    /// Write etc/passwd and etc/group into the mock sysroot.
    pub fn write_accounts(&self, passwd: &str, group: &str) {
        fs::write(self.sysroot.join("etc/passwd"), passwd).expect("Failed to write passwd");
        fs::write(self.sysroot.join("etc/group"), group).expect("Failed to write group");
    }
}

/// Create a file under `root` with an exact mode.
pub fn create_file(root: &Path, rel: &str, mode: u32) -> PathBuf {
    let path = root.join(rel);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent dir");
    }
    fs::write(&path, b"#!/bin/sh\n").expect("Failed to create file");
    set_mode(&path, mode);
    path
}

/// Create a directory under `root` with an exact mode.
pub fn create_dir(root: &Path, rel: &str, mode: u32) -> PathBuf {
    let path = root.join(rel);
    fs::create_dir_all(&path).expect("Failed to create dir");
    set_mode(&path, mode);
    path
}

/// chmod, clearing any inherited setgid bit on directories.
pub fn set_mode(path: &Path, mode: u32) {
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).expect("Failed to set mode");
}

/// uid of the user running the tests (owner of everything created here).
pub fn current_uid() -> u32 {
    unsafe { libc::getuid() }
}

/// A non-root identity that owns none of the test files and has no groups.
pub fn stranger() -> Identity {
    let me = current_uid();
    let uid = if me == 4242 { 4243 } else { 4242 };
    Identity::new(uid, None, [])
}

/// An identity that owns the test files.
pub fn owner() -> Identity {
    Identity::new(current_uid(), None, [])
}

/// Build `depth` nested directories of `name_len`-byte names under `base`.
///
/// Each level is created relative to an open fd of its parent, so the
/// tree can grow past PATH_MAX. Returns the name used at every level.
pub fn create_deep_tree(base: &Path, name_len: usize, depth: usize) -> String {
    use std::ffi::CString;
    use std::os::unix::ffi::OsStrExt;

    let name = "d".repeat(name_len);
    let c_name = CString::new(name.as_str()).unwrap();
    let c_base = CString::new(base.as_os_str().as_bytes()).unwrap();

    unsafe {
        let mut fd = libc::open(c_base.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY);
        assert!(fd >= 0, "Failed to open {}", base.display());
        for _ in 0..depth {
            assert_eq!(libc::mkdirat(fd, c_name.as_ptr(), 0o755), 0, "mkdirat failed");
            let child = libc::openat(fd, c_name.as_ptr(), libc::O_RDONLY | libc::O_DIRECTORY);
            libc::close(fd);
            assert!(child >= 0, "openat failed");
            fd = child;
        }
        libc::close(fd);
    }
    name
}

/// Whether `path` is a directory on a different device than `parent`.
pub fn is_mount_point(parent: &Path, path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    match (fs::symlink_metadata(parent), fs::symlink_metadata(path)) {
        (Ok(outer), Ok(inner)) => inner.is_dir() && inner.dev() != outer.dev(),
        _ => false,
    }
}
