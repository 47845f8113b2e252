// Copyright 2026 boundary-probe Contributors
// SPDX-License-Identifier: Apache-2.0

//! Normalized fault kinds for probed operations.

use std::io;

use nix::errno::Errno;
use serde::{Deserialize, Serialize};

/// Kind of failure reported by a probed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FaultKind {
    PermissionDenied,
    ResourceExhausted,
    NotFound,
    ReadOnly,
    ConnectionRefused,
    Unreachable,
    TimedOut,
    ConnectionReset,
    Interrupted,
    /// The probe could not start its operation (missing program, spawn failure).
    Unavailable,
    Other,
}

impl FaultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PermissionDenied => "permission-denied",
            Self::ResourceExhausted => "resource-exhausted",
            Self::NotFound => "not-found",
            Self::ReadOnly => "read-only",
            Self::ConnectionRefused => "connection-refused",
            Self::Unreachable => "unreachable",
            Self::TimedOut => "timed-out",
            Self::ConnectionReset => "connection-reset",
            Self::Interrupted => "interrupted",
            Self::Unavailable => "unavailable",
            Self::Other => "other",
        }
    }

    pub fn from_errno(errno: Errno) -> Self {
        match errno {
            Errno::EPERM | Errno::EACCES => Self::PermissionDenied,
            Errno::EMFILE
            | Errno::ENFILE
            | Errno::ENOMEM
            | Errno::EAGAIN
            | Errno::ENOSPC
            | Errno::EDQUOT => Self::ResourceExhausted,
            Errno::ENOENT | Errno::ESRCH | Errno::ENXIO => Self::NotFound,
            Errno::EROFS => Self::ReadOnly,
            Errno::ECONNREFUSED => Self::ConnectionRefused,
            Errno::ENETUNREACH | Errno::EHOSTUNREACH | Errno::ENETDOWN | Errno::EHOSTDOWN => {
                Self::Unreachable
            }
            Errno::ETIMEDOUT => Self::TimedOut,
            Errno::ECONNRESET | Errno::ECONNABORTED | Errno::EPIPE => Self::ConnectionReset,
            Errno::EINTR => Self::Interrupted,
            _ => Self::Other,
        }
    }

    /// Errno wins over `io::ErrorKind`; std folds several errnos into `Other`.
    pub fn from_io(err: &io::Error) -> Self {
        if let Some(code) = err.raw_os_error() {
            let kind = Self::from_errno(Errno::from_raw(code));
            if kind != Self::Other {
                return kind;
            }
        }
        match err.kind() {
            io::ErrorKind::PermissionDenied => Self::PermissionDenied,
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::OutOfMemory => Self::ResourceExhausted,
            io::ErrorKind::ConnectionRefused => Self::ConnectionRefused,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => Self::ConnectionReset,
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Self::TimedOut,
            io::ErrorKind::AddrNotAvailable => Self::Unreachable,
            io::ErrorKind::Interrupted => Self::Interrupted,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for FaultKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Failure of the probed operation itself. Expected, never escalated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct ProbeFault {
    pub kind: FaultKind,
    pub message: String,
    /// Native code: errno for syscalls, exit status for commands.
    pub code: Option<i32>,
}

impl ProbeFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: i32) -> Self {
        self.code = Some(code);
        self
    }

    pub fn from_io(context: &str, err: &io::Error) -> Self {
        Self {
            kind: FaultKind::from_io(err),
            message: format!("{context}: {err}"),
            code: err.raw_os_error(),
        }
    }

    /// The probe's own tooling failed to start. Never a denial, whatever the errno.
    pub fn unavailable(context: &str, err: &io::Error) -> Self {
        Self {
            kind: FaultKind::Unavailable,
            message: format!("{context}: {err}"),
            code: err.raw_os_error(),
        }
    }

    pub fn from_errno(context: &str, errno: Errno) -> Self {
        Self {
            kind: FaultKind::from_errno(errno),
            message: format!("{context}: {}", errno.desc()),
            code: Some(errno as i32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emfile_is_resource_exhaustion() {
        let err = io::Error::from_raw_os_error(Errno::EMFILE as i32);
        assert_eq!(FaultKind::from_io(&err), FaultKind::ResourceExhausted);
    }

    #[test]
    fn test_permission_errnos() {
        assert_eq!(FaultKind::from_errno(Errno::EPERM), FaultKind::PermissionDenied);
        assert_eq!(FaultKind::from_errno(Errno::EACCES), FaultKind::PermissionDenied);
        assert_eq!(FaultKind::from_errno(Errno::ESRCH), FaultKind::NotFound);
        assert_eq!(FaultKind::from_errno(Errno::EROFS), FaultKind::ReadOnly);
    }

    #[test]
    fn test_io_kind_fallback() {
        let err = io::Error::new(io::ErrorKind::TimedOut, "connect timed out");
        assert_eq!(FaultKind::from_io(&err), FaultKind::TimedOut);

        let err = io::Error::new(io::ErrorKind::InvalidData, "garbage");
        assert_eq!(FaultKind::from_io(&err), FaultKind::Other);
    }

    #[test]
    fn test_probe_fault_keeps_native_code() {
        let err = io::Error::from_raw_os_error(Errno::EACCES as i32);
        let fault = ProbeFault::from_io("open /etc/x", &err);
        assert_eq!(fault.kind, FaultKind::PermissionDenied);
        assert_eq!(fault.code, Some(Errno::EACCES as i32));
        assert!(fault.message.starts_with("open /etc/x"));
    }

    #[test]
    fn test_unavailable_ignores_errno() {
        let err = io::Error::from_raw_os_error(Errno::ENOENT as i32);
        let fault = ProbeFault::unavailable("spawn curl", &err);
        assert_eq!(fault.kind, FaultKind::Unavailable);
        assert_eq!(fault.code, Some(Errno::ENOENT as i32));
    }
}
