use std::path::PathBuf;

use thiserror::Error;

use crate::types::Index;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid hierarchy: {0}")]
    InvalidHierarchy(String),

    #[error("Pose frame has {found} joint entries, expected {expected}")]
    FrameIndexOutOfRange { expected: usize, found: usize },

    #[error("Bone of joint {joint} is degenerate (length {length})")]
    DegenerateBone { joint: Index, length: f64 },

    #[error("Could not load motion: {0}")]
    MotionLoad(#[from] MotionLoadError),
}

#[derive(Debug, Error)]
pub enum MotionLoadError {
    #[error("Could not read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Unexpected end of file")]
    UnexpectedEof,

    #[error("No MOTION section found")]
    MissingMotion,
}

impl MotionLoadError {
    pub(crate) fn parse(line: usize, message: impl Into<String>) -> Self {
        MotionLoadError::Parse {
            line,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("\"{0}\" is not a permutation of the axes x, y and z")]
pub struct ParseRotationOrderError(pub String);
