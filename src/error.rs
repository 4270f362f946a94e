use thiserror::Error;

/// Input that has to be fixed by the caller before anything is generated.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("entity name must not be empty")]
    EmptyName,
    #[error("duplicate entity name: {0}")]
    DuplicateEntity(String),
    #[error("unknown entity referenced by {context}: {name}")]
    UnknownEntity { name: String, context: &'static str },
    #[error("core company is not set")]
    MissingCoreCompany,
    #[error("invalid percentage {value} on {from} -> {to} (expected 0..=100)")]
    InvalidPercentage { from: String, to: String, value: f64 },
    #[error("entity cannot hold or control itself: {0}")]
    SelfReference(String),
    #[error("duplicate {kind} relationship: {from} -> {to}")]
    DuplicateEdge {
        from: String,
        to: String,
        kind: &'static str,
    },
}

/// A label that cannot be written as Mermaid text even after escaping.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("label {label:?} contains unrepresentable character U+{code:04X}")]
pub struct EscapeError {
    pub label: String,
    pub code: u32,
}

#[derive(Debug, Error)]
pub enum ChartError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Escape(#[from] EscapeError),
    #[error("malformed graph JSON: {0}")]
    Import(#[from] serde_json::Error),
    #[error("unsupported snapshot schema version {0}")]
    UnsupportedSchema(u32),
}

pub type Result<T> = std::result::Result<T, ChartError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_converts_into_chart_error() {
        let err: ChartError = ValidationError::MissingCoreCompany.into();
        assert!(matches!(err, ChartError::Validation(_)));
        assert_eq!(err.to_string(), "core company is not set");
    }

    #[test]
    fn escape_error_names_code_point() {
        let err = EscapeError {
            label: "a\u{7}".to_string(),
            code: 7,
        };
        assert!(err.to_string().contains("U+0007"));
    }
}
