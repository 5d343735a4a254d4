//! Error types for the release database

use thiserror::Error;

/// Result type for release database operations
pub type Result<T> = std::result::Result<T, GlrdError>;

/// Release database errors
#[derive(Error, Debug)]
pub enum GlrdError {
    #[error("Invalid version format: {0}")]
    InvalidVersionFormat(String),

    #[error("Invalid field(s): {fields}. Available fields: {available}{}", suggestion_hint(.suggestion))]
    UnknownField {
        fields: String,
        available: String,
        suggestion: Option<String>,
    },

    #[error("A next release already exists: {existing}")]
    DuplicateNextRelease { existing: String },

    #[error("Invalid release name '{0}'. Expected 'type-major.minor', 'type-major' or 'next'")]
    InvalidReleaseName(String),

    #[error("Invalid release type '{0}'. Must be one of next, stable, patch, nightly, dev")]
    InvalidReleaseType(String),

    #[error("Invalid date '{value}'. Use ISO format: {expected}")]
    InvalidDate { value: String, expected: &'static str },

    #[error("Invalid commit hash '{0}'. Must be 40 hex characters")]
    InvalidCommit(String),

    #[error("Release '{0}' not found in the existing data")]
    ReleaseNotFound(String),

    #[error("Validation failed with {} problem(s):\n  {}", .errors.len(), .errors.join("\n  "))]
    Validation { errors: Vec<String> },

    #[error("Release data at {location} changed since it was loaded (expected checksum {expected}, found {actual})")]
    ConcurrentModification {
        location: String,
        expected: String,
        actual: String,
    },

    #[error("Release source not found: {0}")]
    SourceNotFound(String),

    #[error("No releases found")]
    NoReleases,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

fn suggestion_hint(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(s) => format!(" (did you mean '{}'?)", s),
        None => String::new(),
    }
}

impl GlrdError {
    /// Process exit code reported by the command line tools
    pub fn exit_code(&self) -> i32 {
        match self {
            GlrdError::InvalidVersionFormat(_)
            | GlrdError::InvalidReleaseName(_)
            | GlrdError::InvalidReleaseType(_)
            | GlrdError::InvalidDate { .. }
            | GlrdError::InvalidCommit(_)
            | GlrdError::ReleaseNotFound(_)
            | GlrdError::DuplicateNextRelease { .. }
            | GlrdError::Validation { .. } => 1,
            GlrdError::Git(_) => 2,
            GlrdError::NoReleases => 3,
            GlrdError::InvalidArgument(_) | GlrdError::Config(_) => 6,
            GlrdError::UnknownField { .. } => 7,
            GlrdError::Http(_) => 8,
            GlrdError::SourceNotFound(_) => 9,
            GlrdError::Json(_) | GlrdError::Yaml(_) => 10,
            GlrdError::Io(_) => 11,
            GlrdError::ConcurrentModification { .. } => 12,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_field_message_includes_suggestion() {
        let err = GlrdError::UnknownField {
            fields: "Nmae".to_string(),
            available: "Name, Version".to_string(),
            suggestion: Some("Name".to_string()),
        };
        let msg = err.to_string();
        assert!(msg.contains("Invalid field(s): Nmae"));
        assert!(msg.contains("did you mean 'Name'"));
        assert_eq!(err.exit_code(), 7);
    }

    #[test]
    fn test_exit_codes() {
        assert_eq!(GlrdError::NoReleases.exit_code(), 3);
        assert_eq!(GlrdError::SourceNotFound("x".into()).exit_code(), 9);
        assert_eq!(
            GlrdError::Validation { errors: vec!["bad".into()] }.exit_code(),
            1
        );
    }
}
