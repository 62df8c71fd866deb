//! Kernel resource limits
//!
//! These run between fork and exec, so they only make raw libc calls and
//! report failures through `std::io::Error`.

use std::io;

use crate::types::ResourceLimits;

/// Apply RLIMIT_CPU and RLIMIT_AS to the calling process
///
/// Soft and hard limits are set to the same value: exceeding the CPU limit
/// ends in SIGXCPU/SIGKILL, exceeding the address space limit makes
/// allocations fail.
pub fn apply_limits(limits: &ResourceLimits) -> io::Result<()> {
    set_rlimit(libc::RLIMIT_CPU, limits.cpu_time_limit)?;
    set_rlimit(libc::RLIMIT_AS, limits.memory_limit)?;
    Ok(())
}

#[cfg(all(target_os = "linux", target_env = "gnu"))]
type Resource = libc::__rlimit_resource_t;
#[cfg(not(all(target_os = "linux", target_env = "gnu")))]
type Resource = libc::c_int;

fn set_rlimit(resource: Resource, value: u64) -> io::Result<()> {
    #[allow(clippy::useless_conversion)]
    let value = value as libc::rlim_t;
    let limit = libc::rlimit {
        rlim_cur: value,
        rlim_max: value,
    };
    // SAFETY: `limit` is a valid rlimit for the duration of the call
    if unsafe { libc::setrlimit(resource, &limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    Ok(())
}

/// Read the current soft limit for a resource
pub fn current_limit(resource: Resource) -> io::Result<u64> {
    let mut limit = libc::rlimit {
        rlim_cur: 0,
        rlim_max: 0,
    };
    // SAFETY: `limit` is a valid out-pointer for the duration of the call
    if unsafe { libc::getrlimit(resource, &mut limit) } != 0 {
        return Err(io::Error::last_os_error());
    }
    #[allow(clippy::useless_conversion)]
    Ok(u64::from(limit.rlim_cur))
}

/// Block until `pid` has exited, leaving it unreaped
///
/// The zombie keeps the pid reserved, so it can still be signalled safely
/// until [`reap_with_usage`] collects it.
pub fn wait_exited(pid: libc::pid_t) -> io::Result<()> {
    loop {
        // SAFETY: siginfo_t is plain data; zeroed is a valid initial value
        let mut info: libc::siginfo_t = unsafe { std::mem::zeroed() };
        // SAFETY: `info` is a valid out-pointer for the duration of the call
        let rc = unsafe {
            libc::waitid(
                libc::P_PID,
                pid as libc::id_t,
                &mut info,
                libc::WEXITED | libc::WNOWAIT,
            )
        };
        if rc == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// Reap `pid`, returning its raw wait status and its own resource usage
///
/// The usage covers the child and the descendants it waited for, nothing
/// else the caller has run.
pub fn reap_with_usage(pid: libc::pid_t) -> io::Result<(i32, libc::rusage)> {
    let mut status = 0;
    // SAFETY: rusage is plain data; zeroed is a valid initial value
    let mut usage: libc::rusage = unsafe { std::mem::zeroed() };
    loop {
        // SAFETY: both out-pointers are valid for the duration of the call
        let rc = unsafe { libc::wait4(pid, &mut status, 0, &mut usage) };
        if rc == pid {
            return Ok((status, usage));
        }
        let err = io::Error::last_os_error();
        if err.kind() != io::ErrorKind::Interrupted {
            return Err(err);
        }
    }
}

/// User plus system CPU time recorded in a rusage
pub fn cpu_seconds(usage: &libc::rusage) -> f64 {
    let tv = |t: libc::timeval| t.tv_sec as f64 + t.tv_usec as f64 / 1_000_000.0;
    tv(usage.ru_utime) + tv(usage.ru_stime)
}
