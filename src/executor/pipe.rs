//! Internal utilities for streaming command output to logs.

use std::io::{BufRead, BufReader, Read};

/// Type of output stream for logging purposes.
#[derive(Clone, Copy)]
pub(super) enum StreamType {
    Stdout,
    Stderr,
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stdout => f.write_str("stdout"),
            Self::Stderr => f.write_str("stderr"),
        }
    }
}

/// Extracts a human-readable message from a thread panic payload.
pub(super) fn panic_message(err: &(dyn std::any::Any + Send)) -> &str {
    err.downcast_ref::<&str>()
        .copied()
        .or_else(|| err.downcast_ref::<String>().map(|s| s.as_str()))
        .unwrap_or("unknown panic")
}

/// Reads from a pipe and logs each line as it arrives.
///
/// - stdout is logged at INFO, stderr at WARN, so apt-get/systemctl progress
///   is visible while a task runs.
/// - Binary data uses lossy UTF-8 conversion.
/// - I/O errors stop reading but don't fail command execution; output
///   streaming is best-effort and success is decided by exit status.
/// - A `None` pipe logs an error and returns (unexpected when `Stdio::piped()`
///   was requested).
pub(super) fn read_pipe_to_log<R: Read>(pipe: Option<R>, stream_type: StreamType) {
    let Some(pipe) = pipe else {
        tracing::error!(
            stream = %stream_type,
            "pipe was None (unexpected: Stdio::piped() was set), no output will be captured"
        );
        return;
    };

    let mut reader = BufReader::new(pipe);
    let mut line_buf = Vec::new();

    loop {
        line_buf.clear();
        match reader.read_until(b'\n', &mut line_buf) {
            Ok(0) => break, // EOF
            Ok(_) => {
                let line = line_buf.strip_suffix(b"\n").unwrap_or(&line_buf);
                let text = String::from_utf8_lossy(line);
                let trimmed = text.trim_end_matches('\r');
                match stream_type {
                    StreamType::Stdout => tracing::info!(stream = %stream_type, "{}", trimmed),
                    StreamType::Stderr => tracing::warn!(stream = %stream_type, "{}", trimmed),
                }
            }
            Err(e) => {
                tracing::error!(stream = %stream_type, error = %e, "I/O error, stopping read");
                break;
            }
        }
    }
}
