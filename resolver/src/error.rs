//! Structured resolution failures.

use thiserror::Error;

/// Why a resolution pass failed.
///
/// `Malformed` carries the position of the offending input so clients
/// can surface it in an editor; everything else collapses to `Failed`.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("{message} ({path}:{line}:{column})")]
    Malformed {
        path: String,
        line: u32,
        column: u32,
        message: String,
    },

    #[error("{0}")]
    Failed(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ResolveError {
    /// Wrap a JSON parse failure with the file it came from.
    #[must_use]
    pub fn malformed_json(path: &std::path::Path, source: &serde_json::Error) -> Self {
        Self::Malformed {
            path: path.display().to_string(),
            line: source.line() as u32,
            column: source.column() as u32,
            message: source.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_json_captures_position() {
        let parse_error = serde_json::from_str::<serde_json::Value>("{\n  \"a\": }")
            .expect_err("input is malformed");
        let error = ResolveError::malformed_json(std::path::Path::new("/p/project.json"), &parse_error);
        match error {
            ResolveError::Malformed { path, line, column, .. } => {
                assert_eq!(path, "/p/project.json");
                assert_eq!(line, 2);
                assert!(column > 0);
            }
            other => panic!("expected Malformed, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_displays_message_only() {
        let error = ResolveError::Failed("unable to find project.json in '/p'".to_string());
        assert_eq!(error.to_string(), "unable to find project.json in '/p'");
    }
}
