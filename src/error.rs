use crate::model::SymbolRef;
use thiserror::Error;

/// Analysis failure kinds surfaced to protocol clients.
///
/// `Ambiguous` carries the full candidate list so a caller can retry with a
/// parameter signature instead of guessing.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("ambiguous target: {hint}")]
    Ambiguous {
        hint: String,
        candidates: Vec<SymbolRef>,
    },

    #[error("operation timed out after {0} ms")]
    Timeout(u64),

    #[error("no workspace snapshot loaded")]
    BackendUnavailable,

    #[error("internal error: {0}")]
    Internal(String),
}

impl AnalysisError {
    /// Stable wire code for the error kind.
    pub fn code(&self) -> &'static str {
        match self {
            AnalysisError::InvalidInput(_) => "invalid_input",
            AnalysisError::NotFound(_) => "not_found",
            AnalysisError::Ambiguous { .. } => "ambiguous",
            AnalysisError::Timeout(_) => "timeout",
            AnalysisError::BackendUnavailable => "backend_unavailable",
            AnalysisError::Internal(_) => "internal",
        }
    }

    /// Whether this failure aborts a whole traversal. Non-fatal failures on a
    /// single graph node are absorbed and the node is skipped.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AnalysisError::Timeout(_)
                | AnalysisError::BackendUnavailable
                | AnalysisError::InvalidInput(_)
        )
    }
}

/// Map any error to the wire code it should report. Errors that are not an
/// `AnalysisError` are reported as `internal`.
pub fn error_code(err: &anyhow::Error) -> &'static str {
    err.downcast_ref::<AnalysisError>()
        .map(AnalysisError::code)
        .unwrap_or("internal")
}

/// True when `err` must abort the whole request rather than skip one node.
pub fn is_fatal(err: &anyhow::Error) -> bool {
    err.downcast_ref::<AnalysisError>()
        .map(AnalysisError::is_fatal)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_stable() {
        assert_eq!(AnalysisError::BackendUnavailable.code(), "backend_unavailable");
        assert_eq!(AnalysisError::Timeout(10).code(), "timeout");
        assert_eq!(
            AnalysisError::NotFound("Demo.Missing".into()).code(),
            "not_found"
        );
    }

    #[test]
    fn node_level_failures_are_not_fatal() {
        assert!(!AnalysisError::NotFound("x".into()).is_fatal());
        assert!(!AnalysisError::Internal("x".into()).is_fatal());
        assert!(AnalysisError::Timeout(5).is_fatal());
        assert!(AnalysisError::BackendUnavailable.is_fatal());
    }

    #[test]
    fn anyhow_classification() {
        let err = anyhow::Error::new(AnalysisError::InvalidInput("bad".into()));
        assert_eq!(error_code(&err), "invalid_input");
        assert!(is_fatal(&err));
        let plain = anyhow::anyhow!("boom");
        assert_eq!(error_code(&plain), "internal");
        assert!(!is_fatal(&plain));
    }
}
