//! System-wide constants.

/// Capability names known to the kernel headers, indexed by capability number.
///
/// The running kernel may support fewer of these; the registry intersects
/// this table with what the kernel reports.
pub const CAPABILITY_NAMES: [&str; 41] = [
    "chown",
    "dac_override",
    "dac_read_search",
    "fowner",
    "fsetid",
    "kill",
    "setgid",
    "setuid",
    "setpcap",
    "linux_immutable",
    "net_bind_service",
    "net_broadcast",
    "net_admin",
    "net_raw",
    "ipc_lock",
    "ipc_owner",
    "sys_module",
    "sys_rawio",
    "sys_chroot",
    "sys_ptrace",
    "sys_pacct",
    "sys_admin",
    "sys_boot",
    "sys_nice",
    "sys_resource",
    "sys_time",
    "sys_tty_config",
    "mknod",
    "lease",
    "audit_write",
    "audit_control",
    "setfcap",
    "mac_override",
    "mac_admin",
    "syslog",
    "wake_alarm",
    "block_suspend",
    "audit_read",
    "perfmon",
    "bpf",
    "checkpoint_restore",
];

/// Optional prefix accepted (and stripped) on capability names.
pub const CAPABILITY_PREFIX: &str = "cap_";

/// Name of the capability required to manipulate capability sets.
pub const CAP_SETPCAP: &str = "setpcap";
/// Name of the capability required to change the UID.
pub const CAP_SETUID: &str = "setuid";
/// Name of the capability required to change the GID.
pub const CAP_SETGID: &str = "setgid";

/// `SECBIT_NOROOT`: UID 0 no longer grants capabilities.
pub const SECBIT_NOROOT: u32 = 1 << 0;
/// Lock for [`SECBIT_NOROOT`].
pub const SECBIT_NOROOT_LOCKED: u32 = 1 << 1;
/// `SECBIT_NO_SETUID_FIXUP`: UID transitions do not adjust capability sets.
pub const SECBIT_NO_SETUID_FIXUP: u32 = 1 << 2;
/// Lock for [`SECBIT_NO_SETUID_FIXUP`].
pub const SECBIT_NO_SETUID_FIXUP_LOCKED: u32 = 1 << 3;
/// `SECBIT_KEEP_CAPS`: keep permitted capabilities when leaving UID 0.
pub const SECBIT_KEEP_CAPS: u32 = 1 << 4;
/// Lock for [`SECBIT_KEEP_CAPS`].
pub const SECBIT_KEEP_CAPS_LOCKED: u32 = 1 << 5;

/// Shell used when the command is run through a shell.
pub const SHELL_PATH: &str = "/bin/sh";

/// Environment variables overwritten with the target user's name.
pub const USER_ENV_VARS: [&str; 3] = ["USER", "USERNAME", "LOGNAME"];

/// Environment variable pointing at the user's home directory.
pub const HOME_ENV_VAR: &str = "HOME";

/// Environment variables always removed from the child environment.
///
/// `MAIL` is frequently left pointing at root's spool by `sudo`.
pub const SCRUBBED_ENV_VARS: [&str; 1] = ["MAIL"];

/// Binary name for the CLI.
pub const BIN_NAME: &str = "lockdown";
