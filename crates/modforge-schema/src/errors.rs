use std::fmt;

use serde::Serialize;
use thiserror::Error;

/// Severity level for validation issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueSeverity {
    Error,
    Warning,
}

/// Structured validation issue located by a JSON pointer into the request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub severity: IssueSeverity,
    pub code: String,
    pub path: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ValidationIssue {
    /// Create a new validation issue.
    pub fn new(
        severity: IssueSeverity,
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
        hint: Option<String>,
    ) -> Self {
        Self {
            severity,
            code: code.into(),
            path: path.into(),
            message: message.into(),
            hint,
        }
    }

    pub fn error(code: impl Into<String>, path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(IssueSeverity::Error, code, path, message, None)
    }

    pub fn warning(
        code: impl Into<String>,
        path: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::new(IssueSeverity::Warning, code, path, message, None)
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Aggregated validation report with errors and warnings.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationReport {
    pub errors: Vec<ValidationIssue>,
    pub warnings: Vec<ValidationIssue>,
}

impl ValidationReport {
    /// Returns true when there are no errors.
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    /// Add an error issue.
    pub fn push_error(&mut self, issue: ValidationIssue) {
        self.errors.push(issue);
    }

    /// Add a warning issue.
    pub fn push_warning(&mut self, issue: ValidationIssue) {
        self.warnings.push(issue);
    }

    /// Merge another report into this one.
    pub fn merge(&mut self, other: ValidationReport) {
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Flat `<path>: <message>` lines for every error.
    pub fn messages(&self) -> Vec<String> {
        self.errors.iter().map(ToString::to_string).collect()
    }

    pub fn has_error_at(&self, path: &str) -> bool {
        self.errors.iter().any(|issue| issue.path == path)
    }
}

/// Validation failures that are not issues in the request itself.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema error: {0}")]
    Schema(String),
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// Result type for request validation operations.
pub type Result<T> = std::result::Result<T, SchemaError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn issue_displays_as_path_and_message() {
        let issue = ValidationIssue::error("x", "/fields/0/name", "must not be empty");
        assert_eq!(issue.to_string(), "/fields/0/name: must not be empty");
    }

    #[test]
    fn merge_keeps_errors_and_warnings() {
        let mut report = ValidationReport::default();
        let mut other = ValidationReport::default();
        other.push_error(ValidationIssue::error("a", "/name", "bad"));
        other.push_warning(ValidationIssue::warning("b", "/name", "odd"));
        report.merge(other);
        assert!(!report.is_ok());
        assert_eq!(report.warnings.len(), 1);
        assert_eq!(report.messages(), vec!["/name: bad".to_string()]);
    }
}
