//! Error types for the stamping pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Errors produced while stamping a document tree
///
/// Severity depends on where the error surfaces: `Config` and `Discovery`
/// abort the run before any document is touched, everything else is caught
/// at the document boundary and recorded in the run report.
#[derive(Debug, Error)]
pub enum StampError {
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot scan {}: {detail}", path.display())]
    Discovery { path: PathBuf, detail: String },

    #[error("document error: {0}")]
    Document(String),

    #[error("stamp rendering failed: {0}")]
    Render(String),

    #[error("page merge failed: {0}")]
    Merge(String),

    #[error("flatten failed: {0}")]
    Flatten(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StampError>;

impl From<lopdf::Error> for StampError {
    fn from(err: lopdf::Error) -> Self {
        StampError::Document(err.to_string())
    }
}

impl StampError {
    /// True for errors that must abort the whole run rather than
    /// a single document.
    pub fn is_fatal(&self) -> bool {
        matches!(self, StampError::Config(_) | StampError::Discovery { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_classification() {
        assert!(StampError::Config("bad color".into()).is_fatal());
        assert!(StampError::Discovery {
            path: PathBuf::from("/missing"),
            detail: "not found".into()
        }
        .is_fatal());
        assert!(!StampError::Document("broken xref".into()).is_fatal());
        assert!(!StampError::Flatten("gs timed out".into()).is_fatal());
    }

    #[test]
    fn test_display_includes_detail() {
        let err = StampError::Merge("page 3 dimensions changed".into());
        assert!(err.to_string().contains("page 3"));
    }
}
