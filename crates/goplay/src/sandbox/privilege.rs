//! Privilege drop
//!
//! Groups go first: once the uid changes the process can no longer touch
//! its supplementary groups or gid.

use std::io;

use crate::config::Credentials;

/// Switch the calling process to `credentials`
///
/// Clears supplementary groups, then sets real/effective/saved gid, then
/// uid. Any failure is returned before the next step runs.
pub fn drop_privileges(credentials: Credentials) -> io::Result<()> {
    // SAFETY: a zero-length list with a null pointer is valid for setgroups
    if unsafe { libc::setgroups(0, std::ptr::null()) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let gid = credentials.gid as libc::gid_t;
    // SAFETY: plain integer arguments
    if unsafe { libc::setresgid(gid, gid, gid) } != 0 {
        return Err(io::Error::last_os_error());
    }

    let uid = credentials.uid as libc::uid_t;
    // SAFETY: plain integer arguments
    if unsafe { libc::setresuid(uid, uid, uid) } != 0 {
        return Err(io::Error::last_os_error());
    }

    Ok(())
}

/// Whether the current process can change identity at all
pub fn can_drop_privileges() -> bool {
    // SAFETY: geteuid has no failure mode
    unsafe { libc::geteuid() == 0 }
}
