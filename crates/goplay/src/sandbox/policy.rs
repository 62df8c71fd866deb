//! Declarative syscall policy
//!
//! A [`SyscallPolicy`] is a default action plus an ordered list of rules keyed
//! by syscall name. It can be evaluated in-process (for tests and diagnostics)
//! or compiled into a seccomp BPF program that is loaded once in the child.

use std::collections::BTreeMap;

use seccompiler::{
    BpfProgram, SeccompAction, SeccompCmpArgLen, SeccompCmpOp, SeccompCondition, SeccompFilter,
    SeccompRule, TargetArch,
};

use crate::sandbox::IsolationError;
use crate::types::Mode;

#[cfg(target_arch = "x86_64")]
const TARGET_ARCH: Option<TargetArch> = Some(TargetArch::x86_64);
#[cfg(target_arch = "aarch64")]
const TARGET_ARCH: Option<TargetArch> = Some(TargetArch::aarch64);
#[cfg(not(any(target_arch = "x86_64", target_arch = "aarch64")))]
const TARGET_ARCH: Option<TargetArch> = None;

/// What happens when a syscall is attempted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Allow,
    /// Fail the call with `EPERM`
    Deny,
}

impl Action {
    fn opposite(self) -> Self {
        match self {
            Action::Allow => Action::Deny,
            Action::Deny => Action::Allow,
        }
    }

    fn to_seccomp(self) -> SeccompAction {
        match self {
            Action::Allow => SeccompAction::Allow,
            Action::Deny => SeccompAction::Errno(libc::EPERM as u32),
        }
    }
}

/// `(args[arg] & mask) == value`, compared on the low 32 bits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgCondition {
    pub arg: u8,
    pub mask: u64,
    pub value: u64,
}

impl ArgCondition {
    pub fn masked_eq(arg: u8, mask: u64, value: u64) -> Self {
        Self { arg, mask, value }
    }

    fn matches(&self, args: &[u64; 6]) -> bool {
        let arg = args.get(self.arg as usize).copied().unwrap_or(0) & 0xffff_ffff;
        arg & self.mask == self.value
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    pub syscall: &'static str,
    pub action: Action,
    pub condition: Option<ArgCondition>,
}

/// Flag combinations `open`/`openat` may use, compared under `O_ACCMODE | O_CREAT`
pub const OPEN_FLAG_MASK: u64 = (libc::O_ACCMODE | libc::O_CREAT) as u64;

const PROGRAM_OPEN_FLAGS: &[libc::c_int] = &[
    libc::O_RDONLY,
    libc::O_WRONLY,
    libc::O_RDWR,
    libc::O_CREAT | libc::O_WRONLY,
];

/// The toolchain creates its temporary and cache files read-write
const TOOLCHAIN_OPEN_FLAGS: &[libc::c_int] = &[libc::O_CREAT | libc::O_RDWR];

const IO: &[&str] = &[
    "read", "write", "readv", "writev", "pread64", "pwrite64", "lseek", "close", "fstat",
    "newfstatat", "statx", "readlinkat", "faccessat", "faccessat2", "getcwd", "fsync",
    "ppoll", "pselect6", "epoll_create1", "epoll_ctl", "epoll_pwait", "eventfd2", "poll",
    "select", "stat", "lstat", "access", "readlink", "epoll_wait", "epoll_create", "eventfd",
];

const FD_MANAGEMENT: &[&str] = &["dup", "dup2", "dup3", "fcntl", "pipe", "pipe2"];

const MEMORY: &[&str] = &["mmap", "munmap", "mprotect", "mremap", "madvise", "brk", "mincore"];

const SIGNALS: &[&str] = &["rt_sigaction", "rt_sigprocmask", "rt_sigreturn", "sigaltstack"];

/// Calls that deliver a signal to an arbitrary pid
///
/// Without a privilege drop the guest shares the host's uid, so these would
/// reach the server itself.
const SIGNAL_DELIVERY: &[&str] = &["kill", "tgkill", "tkill", "pidfd_send_signal"];

const TIME: &[&str] = &[
    "clock_gettime", "clock_getres", "clock_nanosleep", "nanosleep", "gettimeofday",
];

const PROCESS: &[&str] = &[
    "execve", "execveat", "exit", "exit_group", "wait4", "waitid", "clone", "clone3", "fork",
    "vfork", "futex", "set_robust_list", "get_robust_list", "set_tid_address", "rseq",
    "arch_prctl", "prctl", "sched_yield", "sched_getaffinity", "getpid", "getppid", "gettid",
    "getpgid", "getpgrp", "getuid", "geteuid", "getgid", "getegid", "getresuid", "getresgid",
    "getgroups", "getrusage", "uname", "sysinfo", "getrandom", "pidfd_open",
];

/// Needed by the setup steps that run after the policy is loaded
const LIMITS: &[&str] = &["prlimit64", "setrlimit", "getrlimit"];

const CREDENTIALS: &[&str] = &["setgroups", "setresgid", "setresuid"];

const NETWORK: &[&str] = &[
    "socket", "bind", "listen", "accept", "accept4", "connect", "getsockopt", "setsockopt",
    "getsockname", "getpeername", "shutdown",
];

/// Directory and metadata operations the `go` command performs while testing
const TOOLCHAIN_FS: &[&str] = &[
    "getdents64", "getdents", "mkdirat", "mkdir", "unlinkat", "unlink", "rmdir", "renameat",
    "renameat2", "rename", "linkat", "symlinkat", "fchmod", "fchmodat", "utimensat",
    "ftruncate", "flock", "fdatasync", "chdir", "fchdir", "umask", "statfs", "fstatfs",
];

#[derive(Debug, Clone)]
pub struct SyscallPolicy {
    default_action: Action,
    rules: Vec<Rule>,
}

impl SyscallPolicy {
    pub fn new(default_action: Action) -> Self {
        Self {
            default_action,
            rules: Vec::new(),
        }
    }

    /// Add a rule
    pub fn rule(mut self, rule: Rule) -> Self {
        self.rules.push(rule);
        self
    }

    /// Allow every syscall in `names` unconditionally
    pub fn allow(mut self, names: &[&'static str]) -> Self {
        self.rules.extend(names.iter().map(|&syscall| Rule {
            syscall,
            action: Action::Allow,
            condition: None,
        }));
        self
    }

    /// Deny every syscall in `names` unconditionally
    pub fn deny(mut self, names: &[&'static str]) -> Self {
        self.rules.extend(names.iter().map(|&syscall| Rule {
            syscall,
            action: Action::Deny,
            condition: None,
        }));
        self
    }

    /// Allow `syscall` when `(args[arg] & mask) == value`
    pub fn allow_if(mut self, syscall: &'static str, condition: ArgCondition) -> Self {
        self.rules.push(Rule {
            syscall,
            action: Action::Allow,
            condition: Some(condition),
        });
        self
    }

    /// Allow `open`/`openat` for exactly the listed access-mode/create combinations
    fn allow_open_flags(mut self, flags: &[libc::c_int]) -> Self {
        for &flag in flags {
            self = self
                .allow_if("open", ArgCondition::masked_eq(1, OPEN_FLAG_MASK, flag as u64))
                .allow_if("openat", ArgCondition::masked_eq(2, OPEN_FLAG_MASK, flag as u64));
        }
        self
    }

    /// The default-deny policy for untrusted code in `mode`
    ///
    /// `network` adds the socket/bind/listen/accept group. `credentials` adds
    /// the calls the privilege drop performs after the policy is in force,
    /// and signal delivery, which a separate uid keeps away from the host.
    pub fn for_mode(mode: Mode, network: bool, credentials: bool) -> Self {
        let mut policy = Self::new(Action::Deny)
            .allow(IO)
            .allow(FD_MANAGEMENT)
            .allow(MEMORY)
            .allow(SIGNALS)
            .allow(TIME)
            .allow(PROCESS)
            .allow(LIMITS)
            .allow_open_flags(PROGRAM_OPEN_FLAGS);

        if network {
            policy = policy.allow(NETWORK);
        }
        if credentials {
            policy = policy.allow(CREDENTIALS).allow(SIGNAL_DELIVERY);
        }
        if mode == Mode::Test {
            policy = policy
                .allow(TOOLCHAIN_FS)
                .allow_open_flags(TOOLCHAIN_OPEN_FLAGS);
        }
        policy
    }

    pub fn default_action(&self) -> Action {
        self.default_action
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Decide a call the way the compiled filter would
    ///
    /// Rules whose action equals the default are no-ops; any other matching
    /// rule flips the outcome.
    pub fn evaluate(&self, syscall: &str, args: &[u64; 6]) -> Action {
        let flipped = self.rules.iter().any(|rule| {
            rule.syscall == syscall
                && rule.action != self.default_action
                && rule.condition.is_none_or(|cond| cond.matches(args))
        });
        if flipped {
            self.default_action.opposite()
        } else {
            self.default_action
        }
    }

    /// Compile into a BPF program for the running architecture
    ///
    /// Names without a syscall number on this architecture are skipped.
    pub fn compile(&self) -> Result<BpfProgram, IsolationError> {
        let arch = TARGET_ARCH.ok_or_else(|| {
            IsolationError::Policy("syscall filtering is not supported on this architecture".into())
        })?;
        let match_action = self.default_action.opposite();

        // An empty rule list means the syscall matches unconditionally
        let mut table: BTreeMap<i64, Option<Vec<SeccompRule>>> = BTreeMap::new();
        for rule in &self.rules {
            if rule.action == self.default_action {
                continue;
            }
            let Some(nr) = syscall_number(rule.syscall) else {
                continue;
            };

            match rule.condition {
                None => {
                    table.insert(nr, None);
                }
                Some(cond) => {
                    let compiled = compile_condition(cond)?;
                    if let Some(rules) = table.entry(nr).or_insert_with(|| Some(Vec::new())) {
                        rules.push(compiled);
                    }
                }
            }
        }

        let rules = table
            .into_iter()
            .map(|(nr, rules)| (nr, rules.unwrap_or_default()))
            .collect();

        let filter = SeccompFilter::new(
            rules,
            self.default_action.to_seccomp(),
            match_action.to_seccomp(),
            arch,
        )
        .map_err(|e| IsolationError::Policy(e.to_string()))?;

        BpfProgram::try_from(filter).map_err(|e| IsolationError::Policy(e.to_string()))
    }
}

fn compile_condition(cond: ArgCondition) -> Result<SeccompRule, IsolationError> {
    let condition = SeccompCondition::new(
        cond.arg,
        SeccompCmpArgLen::Dword,
        SeccompCmpOp::MaskedEq(cond.mask),
        cond.value,
    )
    .map_err(|e| IsolationError::Policy(e.to_string()))?;
    SeccompRule::new(vec![condition]).map_err(|e| IsolationError::Policy(e.to_string()))
}

/// Look up a syscall number by name on the running architecture
pub fn syscall_number(name: &str) -> Option<i64> {
    COMMON_SYSCALLS
        .iter()
        .chain(LEGACY_SYSCALLS)
        .find(|(n, _)| *n == name)
        .map(|&(_, nr)| i64::from(nr))
}

const COMMON_SYSCALLS: &[(&str, libc::c_long)] = &[
    ("read", libc::SYS_read),
    ("write", libc::SYS_write),
    ("readv", libc::SYS_readv),
    ("writev", libc::SYS_writev),
    ("pread64", libc::SYS_pread64),
    ("pwrite64", libc::SYS_pwrite64),
    ("lseek", libc::SYS_lseek),
    ("close", libc::SYS_close),
    ("fstat", libc::SYS_fstat),
    ("newfstatat", libc::SYS_newfstatat),
    ("statx", libc::SYS_statx),
    ("readlinkat", libc::SYS_readlinkat),
    ("faccessat", libc::SYS_faccessat),
    ("faccessat2", libc::SYS_faccessat2),
    ("getcwd", libc::SYS_getcwd),
    ("fsync", libc::SYS_fsync),
    ("fdatasync", libc::SYS_fdatasync),
    ("ppoll", libc::SYS_ppoll),
    ("pselect6", libc::SYS_pselect6),
    ("epoll_create1", libc::SYS_epoll_create1),
    ("epoll_ctl", libc::SYS_epoll_ctl),
    ("epoll_pwait", libc::SYS_epoll_pwait),
    ("eventfd2", libc::SYS_eventfd2),
    ("openat", libc::SYS_openat),
    ("dup", libc::SYS_dup),
    ("dup3", libc::SYS_dup3),
    ("fcntl", libc::SYS_fcntl),
    ("pipe2", libc::SYS_pipe2),
    ("mmap", libc::SYS_mmap),
    ("munmap", libc::SYS_munmap),
    ("mprotect", libc::SYS_mprotect),
    ("mremap", libc::SYS_mremap),
    ("madvise", libc::SYS_madvise),
    ("brk", libc::SYS_brk),
    ("mincore", libc::SYS_mincore),
    ("rt_sigaction", libc::SYS_rt_sigaction),
    ("rt_sigprocmask", libc::SYS_rt_sigprocmask),
    ("rt_sigreturn", libc::SYS_rt_sigreturn),
    ("sigaltstack", libc::SYS_sigaltstack),
    ("kill", libc::SYS_kill),
    ("tgkill", libc::SYS_tgkill),
    ("tkill", libc::SYS_tkill),
    ("clock_gettime", libc::SYS_clock_gettime),
    ("clock_getres", libc::SYS_clock_getres),
    ("clock_nanosleep", libc::SYS_clock_nanosleep),
    ("nanosleep", libc::SYS_nanosleep),
    ("gettimeofday", libc::SYS_gettimeofday),
    ("execve", libc::SYS_execve),
    ("execveat", libc::SYS_execveat),
    ("exit", libc::SYS_exit),
    ("exit_group", libc::SYS_exit_group),
    ("wait4", libc::SYS_wait4),
    ("waitid", libc::SYS_waitid),
    ("clone", libc::SYS_clone),
    ("clone3", libc::SYS_clone3),
    ("futex", libc::SYS_futex),
    ("set_robust_list", libc::SYS_set_robust_list),
    ("get_robust_list", libc::SYS_get_robust_list),
    ("set_tid_address", libc::SYS_set_tid_address),
    ("rseq", libc::SYS_rseq),
    ("prctl", libc::SYS_prctl),
    ("sched_yield", libc::SYS_sched_yield),
    ("sched_getaffinity", libc::SYS_sched_getaffinity),
    ("getpid", libc::SYS_getpid),
    ("getppid", libc::SYS_getppid),
    ("gettid", libc::SYS_gettid),
    ("getpgid", libc::SYS_getpgid),
    ("getuid", libc::SYS_getuid),
    ("geteuid", libc::SYS_geteuid),
    ("getgid", libc::SYS_getgid),
    ("getegid", libc::SYS_getegid),
    ("getresuid", libc::SYS_getresuid),
    ("getresgid", libc::SYS_getresgid),
    ("getgroups", libc::SYS_getgroups),
    ("getrusage", libc::SYS_getrusage),
    ("uname", libc::SYS_uname),
    ("sysinfo", libc::SYS_sysinfo),
    ("getrandom", libc::SYS_getrandom),
    ("pidfd_open", libc::SYS_pidfd_open),
    ("pidfd_send_signal", libc::SYS_pidfd_send_signal),
    ("prlimit64", libc::SYS_prlimit64),
    ("setrlimit", libc::SYS_setrlimit),
    ("getrlimit", libc::SYS_getrlimit),
    ("setgroups", libc::SYS_setgroups),
    ("setresgid", libc::SYS_setresgid),
    ("setresuid", libc::SYS_setresuid),
    ("socket", libc::SYS_socket),
    ("bind", libc::SYS_bind),
    ("listen", libc::SYS_listen),
    ("accept", libc::SYS_accept),
    ("accept4", libc::SYS_accept4),
    ("connect", libc::SYS_connect),
    ("getsockopt", libc::SYS_getsockopt),
    ("setsockopt", libc::SYS_setsockopt),
    ("getsockname", libc::SYS_getsockname),
    ("getpeername", libc::SYS_getpeername),
    ("shutdown", libc::SYS_shutdown),
    ("getdents64", libc::SYS_getdents64),
    ("mkdirat", libc::SYS_mkdirat),
    ("unlinkat", libc::SYS_unlinkat),
    ("renameat2", libc::SYS_renameat2),
    ("linkat", libc::SYS_linkat),
    ("symlinkat", libc::SYS_symlinkat),
    ("fchmod", libc::SYS_fchmod),
    ("fchmodat", libc::SYS_fchmodat),
    ("utimensat", libc::SYS_utimensat),
    ("ftruncate", libc::SYS_ftruncate),
    ("flock", libc::SYS_flock),
    ("chdir", libc::SYS_chdir),
    ("fchdir", libc::SYS_fchdir),
    ("umask", libc::SYS_umask),
    ("statfs", libc::SYS_statfs),
    ("fstatfs", libc::SYS_fstatfs),
];

/// Pre-`*at` syscalls that only x86_64 still carries
#[cfg(target_arch = "x86_64")]
const LEGACY_SYSCALLS: &[(&str, libc::c_long)] = &[
    ("open", libc::SYS_open),
    ("stat", libc::SYS_stat),
    ("lstat", libc::SYS_lstat),
    ("access", libc::SYS_access),
    ("readlink", libc::SYS_readlink),
    ("poll", libc::SYS_poll),
    ("select", libc::SYS_select),
    ("epoll_wait", libc::SYS_epoll_wait),
    ("epoll_create", libc::SYS_epoll_create),
    ("eventfd", libc::SYS_eventfd),
    ("pipe", libc::SYS_pipe),
    ("dup2", libc::SYS_dup2),
    ("fork", libc::SYS_fork),
    ("vfork", libc::SYS_vfork),
    ("arch_prctl", libc::SYS_arch_prctl),
    ("getpgrp", libc::SYS_getpgrp),
    ("getdents", libc::SYS_getdents),
    ("mkdir", libc::SYS_mkdir),
    ("rmdir", libc::SYS_rmdir),
    ("unlink", libc::SYS_unlink),
    ("rename", libc::SYS_rename),
    ("renameat", libc::SYS_renameat),
];

#[cfg(not(target_arch = "x86_64"))]
const LEGACY_SYSCALLS: &[(&str, libc::c_long)] = &[];

#[cfg(test)]
mod tests {
    use super::*;

    const NO_ARGS: [u64; 6] = [0; 6];

    fn openat_args(flags: libc::c_int) -> [u64; 6] {
        [libc::AT_FDCWD as u64, 0, flags as u64, 0o644, 0, 0]
    }

    #[test]
    fn default_deny_allows_basic_io() {
        let policy = SyscallPolicy::for_mode(Mode::Program, false, false);
        assert_eq!(policy.default_action(), Action::Deny);
        assert_eq!(policy.evaluate("read", &NO_ARGS), Action::Allow);
        assert_eq!(policy.evaluate("write", &NO_ARGS), Action::Allow);
        assert_eq!(policy.evaluate("exit_group", &NO_ARGS), Action::Allow);
        assert_eq!(policy.evaluate("execve", &NO_ARGS), Action::Allow);
    }

    #[test]
    fn unknown_syscalls_are_denied() {
        let policy = SyscallPolicy::for_mode(Mode::Program, true, true);
        assert_eq!(policy.evaluate("ptrace", &NO_ARGS), Action::Deny);
        assert_eq!(policy.evaluate("mount", &NO_ARGS), Action::Deny);
        assert_eq!(policy.evaluate("reboot", &NO_ARGS), Action::Deny);
    }

    #[test]
    fn network_group_is_optional() {
        let closed = SyscallPolicy::for_mode(Mode::Program, false, false);
        let open = SyscallPolicy::for_mode(Mode::Program, true, false);
        for name in ["socket", "bind", "listen", "accept", "accept4"] {
            assert_eq!(closed.evaluate(name, &NO_ARGS), Action::Deny, "{name}");
            assert_eq!(open.evaluate(name, &NO_ARGS), Action::Allow, "{name}");
        }
        assert_eq!(open.evaluate("sendmsg", &NO_ARGS), Action::Deny);
    }

    #[test]
    fn credential_calls_only_with_privilege_drop() {
        let without = SyscallPolicy::for_mode(Mode::Program, false, false);
        let with = SyscallPolicy::for_mode(Mode::Program, false, true);
        assert_eq!(without.evaluate("setresuid", &NO_ARGS), Action::Deny);
        assert_eq!(with.evaluate("setresuid", &NO_ARGS), Action::Allow);
        assert_eq!(with.evaluate("setgroups", &NO_ARGS), Action::Allow);
    }

    #[test]
    fn signal_delivery_requires_privilege_drop() {
        let shared_uid = SyscallPolicy::for_mode(Mode::Program, false, false);
        let dropped = SyscallPolicy::for_mode(Mode::Program, false, true);
        let testing = SyscallPolicy::for_mode(Mode::Test, true, false);
        for name in ["kill", "tgkill", "tkill", "pidfd_send_signal"] {
            assert_eq!(shared_uid.evaluate(name, &NO_ARGS), Action::Deny, "{name}");
            assert_eq!(testing.evaluate(name, &NO_ARGS), Action::Deny, "{name}");
            assert_eq!(dropped.evaluate(name, &NO_ARGS), Action::Allow, "{name}");
        }
        assert_eq!(shared_uid.evaluate("rt_sigaction", &NO_ARGS), Action::Allow);
    }

    #[test]
    fn limits_remain_settable_after_load() {
        let policy = SyscallPolicy::for_mode(Mode::Program, false, false);
        assert_eq!(policy.evaluate("prlimit64", &NO_ARGS), Action::Allow);
        assert_eq!(policy.evaluate("setrlimit", &NO_ARGS), Action::Allow);
    }

    #[test]
    fn openat_allows_only_listed_flag_combinations() {
        let policy = SyscallPolicy::for_mode(Mode::Program, false, false);

        for flags in [
            libc::O_RDONLY,
            libc::O_WRONLY,
            libc::O_RDWR,
            libc::O_CREAT | libc::O_WRONLY,
            libc::O_RDONLY | libc::O_CLOEXEC,
            libc::O_CREAT | libc::O_WRONLY | libc::O_TRUNC | libc::O_CLOEXEC,
        ] {
            assert_eq!(
                policy.evaluate("openat", &openat_args(flags)),
                Action::Allow,
                "flags {flags:#o}"
            );
        }

        assert_eq!(
            policy.evaluate("openat", &openat_args(libc::O_CREAT | libc::O_RDWR)),
            Action::Deny
        );
        assert_eq!(
            policy.evaluate("openat", &openat_args(libc::O_CREAT | libc::O_RDONLY)),
            Action::Deny
        );
    }

    #[test]
    fn open_checks_second_argument() {
        let policy = SyscallPolicy::for_mode(Mode::Program, false, false);
        let args = [0, (libc::O_CREAT | libc::O_RDWR) as u64, 0, 0, 0, 0];
        assert_eq!(policy.evaluate("open", &args), Action::Deny);
        let args = [0, libc::O_RDONLY as u64, 0, 0, 0, 0];
        assert_eq!(policy.evaluate("open", &args), Action::Allow);
    }

    #[test]
    fn test_mode_adds_toolchain_filesystem() {
        let program = SyscallPolicy::for_mode(Mode::Program, false, false);
        let test = SyscallPolicy::for_mode(Mode::Test, false, false);

        assert_eq!(program.evaluate("mkdirat", &NO_ARGS), Action::Deny);
        assert_eq!(test.evaluate("mkdirat", &NO_ARGS), Action::Allow);
        assert_eq!(test.evaluate("getdents64", &NO_ARGS), Action::Allow);
        assert_eq!(
            test.evaluate("openat", &openat_args(libc::O_CREAT | libc::O_RDWR)),
            Action::Allow
        );
    }

    #[test]
    fn rules_matching_default_are_noops() {
        let policy = SyscallPolicy::new(Action::Deny).deny(&["read"]);
        assert_eq!(policy.evaluate("read", &NO_ARGS), Action::Deny);

        let policy = SyscallPolicy::new(Action::Allow).deny(&["socketpair"]).allow(&["read"]);
        assert_eq!(policy.evaluate("socketpair", &NO_ARGS), Action::Deny);
        assert_eq!(policy.evaluate("read", &NO_ARGS), Action::Allow);
        assert_eq!(policy.evaluate("write", &NO_ARGS), Action::Allow);
    }

    #[test]
    fn syscall_numbers_resolve() {
        assert_eq!(syscall_number("read"), Some(i64::from(libc::SYS_read)));
        assert_eq!(syscall_number("openat"), Some(i64::from(libc::SYS_openat)));
        assert_eq!(syscall_number("not_a_syscall"), None);
    }

    #[test]
    fn every_policy_name_is_known() {
        let groups = [
            IO,
            FD_MANAGEMENT,
            MEMORY,
            SIGNALS,
            SIGNAL_DELIVERY,
            TIME,
            PROCESS,
            LIMITS,
            CREDENTIALS,
            NETWORK,
            TOOLCHAIN_FS,
        ];
        let legacy = [
            "open", "stat", "lstat", "access", "readlink", "poll", "select", "epoll_wait",
            "epoll_create", "eventfd", "pipe", "dup2", "fork", "vfork", "arch_prctl", "getpgrp",
            "getdents", "mkdir", "rmdir", "unlink", "rename", "renameat",
        ];
        let all: Vec<&str> = COMMON_SYSCALLS
            .iter()
            .map(|(n, _)| *n)
            .chain(legacy)
            .collect();
        for group in groups {
            for name in group {
                assert!(all.contains(name), "{name} missing from syscall tables");
            }
        }
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn compiles_for_every_mode() {
        for mode in [Mode::Program, Mode::Test] {
            for network in [false, true] {
                let program = SyscallPolicy::for_mode(mode, network, true).compile().unwrap();
                assert!(!program.is_empty());
            }
        }
    }

    #[cfg(any(target_arch = "x86_64", target_arch = "aarch64"))]
    #[test]
    fn compiles_default_allow_policy() {
        let program = SyscallPolicy::new(Action::Allow)
            .deny(&["socketpair", "sendmsg"])
            .compile()
            .unwrap();
        assert!(!program.is_empty());
    }
}
