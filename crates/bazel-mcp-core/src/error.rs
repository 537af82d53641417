//! Errors produced while resolving, planning and executing

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid argument `{field}`: {reason}")]
    InvalidArgument { field: &'static str, reason: String },

    #[error(
        "target path {} (resolved from {input:?}) is outside the project directory {}",
        absolute.display(),
        root.display()
    )]
    OutsideProject {
        input: String,
        absolute: PathBuf,
        root: PathBuf,
    },

    #[error(
        "path {} could not be made relative to {}: {reason}",
        target.display(),
        root.display()
    )]
    PathResolution {
        target: PathBuf,
        root: PathBuf,
        reason: String,
    },

    #[error("bazel command failed: {reason}\nArgs: {args:?}\nOutput:\n{output}")]
    Execution {
        args: Vec<String>,
        reason: String,
        output: String,
    },
}

impl Error {
    pub fn invalid_argument(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidArgument {
            field,
            reason: reason.into(),
        }
    }

    /// Combined tool output captured before an execution failure, if any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::Execution { output, .. } => Some(output),
            _ => None,
        }
    }
}
