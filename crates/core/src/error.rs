use thiserror::Error;

/// Top-level error type shared by every measurement crate.
#[derive(Debug, Error)]
pub enum MeterError {
    /// A pseudo-file was missing or unreadable.
    #[error("cannot read '{path}': {source}")]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// A file had an unexpected shape (field count, missing line).
    #[error("bad format in '{file}': {reason}")]
    Format { file: String, reason: String },

    /// A numeric field failed to parse.
    #[error("invalid number '{token}' in '{file}'")]
    Parse { file: String, token: String },

    /// The process's cgroup membership has no entry for a subsystem.
    #[error("cgroup subsystem '{0}' not mounted")]
    Subsystem(String),
}

pub type Result<T, E = MeterError> = std::result::Result<T, E>;
