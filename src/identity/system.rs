//! Host account database via libc (NSS).

use anyhow::{bail, Result};
use std::ffi::{CStr, CString};
use std::io;
use std::ptr;

use super::directory::{Caller, Directory, GroupRecord, UserRecord};

/// Initial scratch buffer for the reentrant `get*_r` calls.
const LOOKUP_BUF_SIZE: usize = 1024;
/// Grow the scratch buffer on ERANGE up to this size.
const LOOKUP_BUF_MAX: usize = 1 << 20;

/// Resolves names through the host's user and group databases.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemDirectory;

impl SystemDirectory {
    pub fn new() -> Self {
        Self
    }
}

impl Directory for SystemDirectory {
    fn user_by_name(&self, name: &str) -> Option<UserRecord> {
        let cname = CString::new(name).ok()?;
        lookup_passwd(|pwd, buf, len, result| unsafe {
            libc::getpwnam_r(cname.as_ptr(), pwd, buf, len, result)
        })
    }

    fn user_by_uid(&self, uid: u32) -> Option<UserRecord> {
        lookup_passwd(|pwd, buf, len, result| unsafe {
            libc::getpwuid_r(uid as libc::uid_t, pwd, buf, len, result)
        })
    }

    fn group_by_name(&self, name: &str) -> Option<GroupRecord> {
        let cname = CString::new(name).ok()?;
        lookup_group(|grp, buf, len, result| unsafe {
            libc::getgrnam_r(cname.as_ptr(), grp, buf, len, result)
        })
    }

    fn group_by_gid(&self, gid: u32) -> Option<GroupRecord> {
        lookup_group(|grp, buf, len, result| unsafe {
            libc::getgrgid_r(gid as libc::gid_t, grp, buf, len, result)
        })
    }

    fn group_list(&self, user: &UserRecord) -> Vec<u32> {
        let Ok(cname) = CString::new(user.name.as_str()) else {
            return vec![user.gid];
        };

        let mut capacity: libc::c_int = 64;
        loop {
            let mut groups = vec![0 as libc::gid_t; capacity as usize];
            let mut count = capacity;
            let rc = unsafe {
                libc::getgrouplist(
                    cname.as_ptr(),
                    user.gid as libc::gid_t,
                    groups.as_mut_ptr(),
                    &mut count,
                )
            };
            if rc >= 0 {
                groups.truncate(count.max(0) as usize);
                return groups.into_iter().map(|g| g as u32).collect();
            }
            // glibc reports the required size in `count`; others may not.
            let next = if count > capacity { count } else { capacity * 2 };
            if next as usize > super::MAX_GROUPS + 1 {
                eprintln!(
                    "[!] Group list for {} exceeds {} entries, truncating",
                    user.name,
                    super::MAX_GROUPS
                );
                groups.truncate(capacity as usize);
                return groups.into_iter().map(|g| g as u32).collect();
            }
            capacity = next;
        }
    }

    fn caller(&self) -> Result<Caller> {
        Caller::current()
    }
}

/// Real uid of this process.
pub(crate) fn real_uid() -> u32 {
    unsafe { libc::getuid() as u32 }
}

/// Supplementary groups of this process.
pub(crate) fn supplementary_groups() -> Result<Vec<u32>> {
    let count = unsafe { libc::getgroups(0, ptr::null_mut()) };
    if count < 0 {
        bail!("Unable to getgroups: {}", io::Error::last_os_error());
    }

    let mut groups = vec![0 as libc::gid_t; count as usize];
    let count = unsafe { libc::getgroups(count, groups.as_mut_ptr()) };
    if count < 0 {
        bail!("Unable to getgroups: {}", io::Error::last_os_error());
    }
    groups.truncate(count as usize);
    Ok(groups.into_iter().map(|g| g as u32).collect())
}

fn lookup_passwd<F>(mut call: F) -> Option<UserRecord>
where
    F: FnMut(
        *mut libc::passwd,
        *mut libc::c_char,
        libc::size_t,
        *mut *mut libc::passwd,
    ) -> libc::c_int,
{
    let mut buf: Vec<libc::c_char> = vec![0; LOOKUP_BUF_SIZE];
    loop {
        let mut pwd: libc::passwd = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::passwd = ptr::null_mut();
        let rc = call(&mut pwd, buf.as_mut_ptr(), buf.len(), &mut result);

        if rc == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }

        let name = unsafe { CStr::from_ptr(pwd.pw_name) }
            .to_string_lossy()
            .into_owned();
        return Some(UserRecord {
            name,
            uid: pwd.pw_uid as u32,
            gid: pwd.pw_gid as u32,
        });
    }
}

fn lookup_group<F>(mut call: F) -> Option<GroupRecord>
where
    F: FnMut(
        *mut libc::group,
        *mut libc::c_char,
        libc::size_t,
        *mut *mut libc::group,
    ) -> libc::c_int,
{
    let mut buf: Vec<libc::c_char> = vec![0; LOOKUP_BUF_SIZE];
    loop {
        let mut grp: libc::group = unsafe { std::mem::zeroed() };
        let mut result: *mut libc::group = ptr::null_mut();
        let rc = call(&mut grp, buf.as_mut_ptr(), buf.len(), &mut result);

        if rc == libc::ERANGE && buf.len() < LOOKUP_BUF_MAX {
            buf.resize(buf.len() * 2, 0);
            continue;
        }
        if rc != 0 || result.is_null() {
            return None;
        }

        let name = unsafe { CStr::from_ptr(grp.gr_name) }
            .to_string_lossy()
            .into_owned();
        return Some(GroupRecord {
            name,
            gid: grp.gr_gid as u32,
        });
    }
}
