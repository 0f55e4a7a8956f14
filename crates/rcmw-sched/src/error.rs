// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error type for the fallible plumbing around the scheduler.
//!
//! Lifecycle operations (`create_task`, `remove_task`, `notify_task`, ...)
//! report duplicate or unknown ids through plain `bool` returns. `Error` is
//! reserved for configuration loading, thread creation and the OS-level
//! affinity / scheduling-policy calls.

/// Errors returned by configuration and thread-control operations.
///
/// # Example
///
/// ```rust,no_run
/// use rcmw_sched::pin_thread::parse_cpuset;
/// use rcmw_sched::Error;
///
/// match parse_cpuset("0-x") {
///     Err(Error::InvalidCpuset(spec)) => println!("bad cpuset: {}", spec),
///     Err(e) => println!("other error: {}", e),
///     Ok(cpus) => println!("cpus: {:?}", cpus),
/// }
/// ```
#[derive(Debug)]
pub enum Error {
    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Configuration file not found at specified path.
    ConfigFileNotFound(String),
    /// Configuration file could not be parsed or holds invalid values.
    InvalidConfig(String),
    /// CPU set string (e.g. `0-3,8`) is malformed.
    InvalidCpuset(String),

    // ========================================================================
    // Thread Errors
    // ========================================================================
    /// I/O error with underlying cause.
    IoError(std::io::Error),
    /// OS thread could not be spawned.
    ThreadSpawnFailed(String),
    /// `pthread_setaffinity_np` / `sched_setaffinity` rejected the CPU set.
    AffinityFailed(String),
    /// Setting the OS scheduling policy or priority failed.
    SchedPolicyFailed(String),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Requested operation is not supported on this platform.
    Unsupported,
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::ConfigFileNotFound(path) => write!(f, "Config file not found: {}", path),
            Error::InvalidConfig(msg) => write!(f, "Invalid config: {}", msg),
            Error::InvalidCpuset(spec) => write!(f, "Invalid cpuset: {:?}", spec),
            Error::IoError(e) => write!(f, "I/O error: {}", e),
            Error::ThreadSpawnFailed(msg) => write!(f, "Thread spawn failed: {}", msg),
            Error::AffinityFailed(msg) => write!(f, "Set affinity failed: {}", msg),
            Error::SchedPolicyFailed(msg) => write!(f, "Set sched policy failed: {}", msg),
            Error::Unsupported => write!(f, "Unsupported operation"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::IoError(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::IoError(e)
    }
}

/// Convenient alias for results using the crate `Error` type.
pub type Result<T> = core::result::Result<T, Error>;
