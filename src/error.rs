//! Job-level failures that callers may want to match on.
//!
//! Task failures inside a stage are plain [`anyhow::Error`]s carrying
//! context about the stage and split they came from.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum JobError {
    #[error("input path `{0}` did not match any files")]
    NoInput(String),

    #[error("invalid input pattern `{pattern}`")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: glob::PatternError,
    },

    #[error("output directory `{}` already exists", .0.display())]
    OutputExists(PathBuf),
}
