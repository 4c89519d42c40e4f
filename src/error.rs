//! Domain-specific error types for hostprep.
//!
//! `HostprepError` is a `thiserror`-based enum with typed variants for the
//! common failure modes. Functions on the public API return
//! `Result<T, HostprepError>` where callers may want to match on the kind;
//! orchestration code uses `anyhow::Result`, and `HostprepError` converts
//! into `anyhow::Error` through `?` at those boundaries.

use std::io;

/// Formats an IO error kind into a human-readable message.
///
/// Produces consistent messages for the common kinds ("I/O error: not found")
/// instead of the OS-level text ("No such file or directory (os error 2)").
/// Unrecognized kinds fall back to the OS-level message.
pub(crate) fn io_error_kind_message(err: &io::Error) -> String {
    match err.kind() {
        io::ErrorKind::NotFound => "I/O error: not found".to_string(),
        io::ErrorKind::PermissionDenied => "I/O error: permission denied".to_string(),
        io::ErrorKind::IsADirectory => "I/O error: is a directory".to_string(),
        _ => format!("I/O error: {}", err),
    }
}

/// Domain-specific error type for hostprep.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum HostprepError {
    /// A task or playbook constraint was violated.
    #[error("validation error: {0}")]
    Validation(String),

    /// A host command failed (non-zero exit, spawn failure, wait failure, etc.).
    #[error("command execution failed: {command}: {status}")]
    Execution {
        /// The command that was executed.
        command: String,
        /// Exit code, signal information, or a description of the internal
        /// failure (e.g. a reader thread panic).
        status: String,
    },

    /// A playbook file could not be loaded or parsed.
    #[error("playbook error: {0}")]
    Playbook(String),

    /// An I/O operation failed with contextual information.
    #[error("{context}: {message}")]
    Io {
        /// What was being done when the error occurred — a path, or an
        /// operation description with a path. Runner validation may prefix
        /// this with the task position (e.g. `"task 3 validation failed: ..."`).
        context: String,
        /// Derived from [`io_error_kind_message`] for consistent formatting.
        message: String,
        /// The underlying I/O error, preserved for programmatic inspection.
        #[source]
        source: std::io::Error,
    },
}

impl HostprepError {
    /// Creates an `Io` variant with the `message` derived from `source`.
    pub(crate) fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            message: io_error_kind_message(&source),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_display() {
        let err = HostprepError::Validation("package name must not be empty".to_string());
        assert_eq!(err.to_string(), "validation error: package name must not be empty");
    }

    #[test]
    fn test_execution_display() {
        let err = HostprepError::Execution {
            command: "apt-get".to_string(),
            status: "exit status: 100".to_string(),
        };
        assert_eq!(err.to_string(), "command execution failed: apt-get: exit status: 100");
    }

    #[test]
    fn test_playbook_display() {
        let err = HostprepError::Playbook("YAML parse error at line 3".to_string());
        assert_eq!(err.to_string(), "playbook error: YAML parse error at line 3");
    }

    #[test]
    fn test_io_display() {
        let source = io::Error::new(io::ErrorKind::NotFound, "entity not found");
        let err = HostprepError::io("/path/to/playbook.yml", source);
        assert_eq!(err.to_string(), "/path/to/playbook.yml: I/O error: not found");
    }

    #[test]
    fn test_io_source_preserved() {
        let source = io::Error::new(io::ErrorKind::PermissionDenied, "access denied");
        let err = HostprepError::io("/etc/apt/sources.list.d/test.list", source);
        match &err {
            HostprepError::Io { source, .. } => {
                assert_eq!(source.kind(), io::ErrorKind::PermissionDenied);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn test_io_error_kind_message_not_found() {
        let err = io::Error::new(io::ErrorKind::NotFound, "not found");
        assert_eq!(io_error_kind_message(&err), "I/O error: not found");
    }

    #[test]
    fn test_io_error_kind_message_other() {
        let err = io::Error::new(io::ErrorKind::ConnectionRefused, "connection refused");
        assert!(io_error_kind_message(&err).starts_with("I/O error: "));
    }

    #[test]
    fn test_into_anyhow_error() {
        let err = HostprepError::Validation("test".to_string());
        let anyhow_err: anyhow::Error = err.into();
        let downcast = anyhow_err.downcast_ref::<HostprepError>();
        assert!(matches!(downcast, Some(HostprepError::Validation(_))));
    }
}
