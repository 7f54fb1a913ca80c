//! Core domain models for validation failures and validation results
//!
//! Architecture: Rich Domain Models - Results are aggregates with behavior, not just data
//! - ValidationError carries the field, the rendered message and the failing predicate
//! - ValidationResult acts as an aggregate root over the ordered error list
//! - Configuration problems are a separate error type and never appear as validation data

use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

/// Severity levels attached to failing checks
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Hash,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational messages and hints
    Info,
    /// Warnings that should be surfaced but are still failures
    Warning,
    /// Errors, the default for every check
    #[default]
    Error,
}

impl Severity {
    /// Convert to string for display
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

/// A single failed check on one field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationError {
    /// Name of the field the failing rule is bound to
    pub field_name: String,
    /// Rendered, human-readable message
    pub message: String,
    /// Code of the predicate that failed (e.g. `not_empty`)
    pub code: String,
    /// Severity configured on the failing check
    pub severity: Severity,
    /// The value that was checked, rendered as text; `None` when absent
    pub attempted_value: Option<String>,
}

impl ValidationError {
    /// Create a new error with `Error` severity
    pub fn new(field_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_name: field_name.into(),
            message: message.into(),
            code: "custom".to_string(),
            severity: Severity::Error,
            attempted_value: None,
        }
    }

    /// Set the predicate code
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = code.into();
        self
    }

    /// Set the severity
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    /// Record the value that failed
    pub fn with_attempted_value(mut self, value: Option<String>) -> Self {
        self.attempted_value = value;
        self
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field_name, self.message)
    }
}

/// Count of errors by severity level
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub error: usize,
    pub warning: usize,
    pub info: usize,
}

impl SeverityCounts {
    /// Total number of errors across all severities
    pub fn total(&self) -> usize {
        self.error + self.warning + self.info
    }

    /// Add one error to the counts
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Error => self.error += 1,
            Severity::Warning => self.warning += 1,
            Severity::Info => self.info += 1,
        }
    }
}

/// Outcome of running a rule set against one entity.
///
/// Validity is derived from the error list, so a result can never be
/// "valid with errors". Errors keep the order the rules were declared in.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ValidationResult {
    errors: Vec<ValidationError>,
}

impl ValidationResult {
    /// Create an empty (valid) result
    pub fn new() -> Self {
        Self { errors: Vec::new() }
    }

    /// Create a result from already collected errors
    pub fn from_errors(errors: Vec<ValidationError>) -> Self {
        Self { errors }
    }

    /// Whether no check failed
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// All errors in declaration order
    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    /// Consume the result and return the errors
    pub fn into_errors(self) -> Vec<ValidationError> {
        self.errors
    }

    /// Append an error
    pub fn add_error(&mut self, error: ValidationError) {
        self.errors.push(error);
    }

    /// Errors reported for a specific field
    pub fn errors_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a ValidationError> {
        self.errors.iter().filter(move |e| e.field_name == field)
    }

    /// Distinct field names with errors, in first-appearance order
    pub fn field_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for error in &self.errors {
            if !names.contains(&error.field_name.as_str()) {
                names.push(&error.field_name);
            }
        }
        names
    }

    /// Messages grouped by field, the shape web forms bind against
    pub fn model_state(&self) -> Vec<(String, Vec<String>)> {
        self.field_names()
            .into_iter()
            .map(|field| {
                let messages = self.errors_for(field).map(|e| e.message.clone()).collect();
                (field.to_string(), messages)
            })
            .collect()
    }

    /// Error counts by severity
    pub fn counts(&self) -> SeverityCounts {
        let mut counts = SeverityCounts::default();
        for error in &self.errors {
            counts.add(error.severity);
        }
        counts
    }

    /// Append all errors of another result after this one's
    pub fn merge(&mut self, other: ValidationResult) {
        self.errors.extend(other.errors);
    }
}

impl fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let messages: Vec<&str> = self.errors.iter().map(|e| e.message.as_str()).collect();
        write!(f, "{}", messages.join("\n"))
    }
}

impl Serialize for ValidationResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("ValidationResult", 2)?;
        state.serialize_field("is_valid", &self.is_valid())?;
        state.serialize_field("errors", &self.errors)?;
        state.end()
    }
}

/// Errors raised by misconfiguration or infrastructure, never by invalid data
#[derive(Debug, thiserror::Error)]
pub enum GuardianError {
    /// Rule set or configuration file is malformed
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// A rule references a field the entity type does not declare
    #[error("Unknown field '{field}' for entity '{entity}'")]
    UnknownField { field: String, entity: String },

    /// A field accessor could not produce a value
    #[error("Field accessor for '{field}' could not be evaluated")]
    FieldAccess { field: String },

    /// A predicate was applied to a value type it cannot check
    #[error("Predicate '{predicate}' cannot be applied to {found} value of field '{field}'")]
    TypeMismatch {
        field: String,
        predicate: String,
        found: String,
    },

    /// No stored entity has the given id
    #[error("No entity with id {id}")]
    NotFound { id: u32 },

    /// File could not be read or written
    #[error("IO error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },

    /// Output could not be serialized
    #[error("Serialization error: {message}")]
    Serialization { message: String },
}

impl GuardianError {
    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an unknown field error
    pub fn unknown_field(field: impl Into<String>, entity: impl Into<String>) -> Self {
        Self::UnknownField {
            field: field.into(),
            entity: entity.into(),
        }
    }

    /// Create a field access error
    pub fn field_access(field: impl Into<String>) -> Self {
        Self::FieldAccess {
            field: field.into(),
        }
    }

    /// Create a type mismatch error
    pub fn type_mismatch(
        field: impl Into<String>,
        predicate: impl Into<String>,
        found: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            field: field.into(),
            predicate: predicate.into(),
            found: found.into(),
        }
    }

    /// Create a serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization {
            message: message.into(),
        }
    }

    /// Whether this error stems from rule configuration rather than infrastructure
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration { .. }
                | Self::UnknownField { .. }
                | Self::FieldAccess { .. }
                | Self::TypeMismatch { .. }
        )
    }
}

/// Result type for Guardian operations
pub type GuardianResult<T> = Result<T, GuardianError>;
