//! Harness error types.
//!
//! Every failure the harness can report is a variant of [`HarnessError`].
//! Setup failures wrap the step that broke so the whole chain is visible
//! through `std::error::Error::source`.

use std::path::PathBuf;

/// Unified error type for all harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to provision disk image {}", path.display())]
    Provisioning {
        path: PathBuf,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("failed to mount {} on {}", image.display(), mount_point.display())]
    Mount {
        image: PathBuf,
        mount_point: PathBuf,
        #[source]
        source: Box<HarnessError>,
    },

    #[error("`{command}` failed ({}): {stderr}", exit_code_str(*code))]
    CommandFailed {
        command: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("write to VDI '{name}' failed ({}): {stderr}", exit_code_str(*code))]
    WriteFailed {
        name: String,
        code: Option<i32>,
        stderr: String,
    },

    #[error("cannot parse {what}: {line:?}")]
    Parse { what: &'static str, line: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HarnessError {
    /// Exit code of the external command, if this error came from one.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } | Self::WriteFailed { code, .. } => *code,
            Self::Provisioning { source, .. } | Self::Mount { source, .. } => source.exit_code(),
            _ => None,
        }
    }
}

fn exit_code_str(code: Option<i32>) -> String {
    match code {
        Some(c) => format!("exit code {}", c),
        None => "killed by signal".to_string(),
    }
}

/// Result type alias for harness operations.
pub type HarnessResult<T> = Result<T, HarnessError>;
