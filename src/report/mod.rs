//! Report generation with multiple output formats
//!
//! CDD Principle: Anti-Corruption Layer - Formatters translate domain objects to external formats
//! - ValidationResult (domain) is converted to console, JSON and form-binding representations
//! - Each formatter encapsulates the rules for its specific output format
//! - Domain logic remains pure while supporting multiple presentation needs

use crate::domain::violations::{GuardianError, GuardianResult, Severity, ValidationError, ValidationResult};
use serde::Serialize;
use serde_json::Value as JsonValue;
use std::io::Write;

/// Supported output formats for validation results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Console listing of messages
    Human,
    /// JSON body for API consumers
    Json,
    /// Messages grouped by field, as web forms display them
    Fields,
}

impl OutputFormat {
    /// Parse format from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "human" => Some(Self::Human),
            "json" => Some(Self::Json),
            "fields" => Some(Self::Fields),
            _ => None,
        }
    }

    /// Get all available format names
    pub fn all_formats() -> &'static [&'static str] {
        &["human", "json", "fields"]
    }
}

/// Options for customizing report output
#[derive(Debug, Clone)]
pub struct ReportOptions {
    /// Whether to use colored output (for human format)
    pub use_colors: bool,
    /// Noun used for the validated object ("The user object is valid.")
    pub entity_label: String,
    /// Maximum number of errors to include
    pub max_errors: Option<usize>,
    /// Minimum severity level to include
    pub min_severity: Option<Severity>,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            use_colors: true,
            entity_label: "user".to_string(),
            max_errors: None,
            min_severity: None,
        }
    }
}

/// Main report formatter that dispatches to specific formatters
#[derive(Debug, Clone, Default)]
pub struct ReportFormatter {
    options: ReportOptions,
}

impl ReportFormatter {
    /// Create a new report formatter with options
    pub fn new(options: ReportOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &ReportOptions {
        &self.options
    }

    /// Format a validation result in the specified format
    pub fn format_result(&self, result: &ValidationResult, format: OutputFormat) -> GuardianResult<String> {
        let errors = self.filter_errors(result.errors());

        match format {
            OutputFormat::Human => Ok(self.format_human(result, &errors)),
            OutputFormat::Json => self.format_json(result, &errors),
            OutputFormat::Fields => Ok(self.format_fields(&errors)),
        }
    }

    /// Write a formatted result to a writer
    pub fn write_result<W: Write>(
        &self,
        result: &ValidationResult,
        format: OutputFormat,
        mut writer: W,
    ) -> GuardianResult<()> {
        let formatted = self.format_result(result, format)?;
        writer.write_all(formatted.as_bytes())?;
        Ok(())
    }

    /// Filter errors based on report options
    fn filter_errors<'a>(&self, errors: &'a [ValidationError]) -> Vec<&'a ValidationError> {
        let mut filtered: Vec<&ValidationError> = errors
            .iter()
            .filter(|e| match self.options.min_severity {
                Some(min) => e.severity >= min,
                None => true,
            })
            .collect();

        if let Some(max) = self.options.max_errors {
            filtered.truncate(max);
        }

        filtered
    }

    /// Format in the console style: a verdict line, then one line per error
    fn format_human(&self, result: &ValidationResult, errors: &[&ValidationError]) -> String {
        let label = &self.options.entity_label;
        let mut output = String::new();

        if result.is_valid() {
            output.push_str(&self.paint(&format!("The {label} object is valid."), Tone::Good));
            output.push('\n');
            return output;
        }

        output.push_str(&self.paint(&format!("The {label} object is invalid. Details:"), Tone::Bad));
        output.push('\n');

        for error in errors {
            let tone = match error.severity {
                Severity::Error => Tone::Bad,
                Severity::Warning => Tone::Warn,
                Severity::Info => Tone::Note,
            };
            let prefix = match error.severity {
                Severity::Error => "Error",
                Severity::Warning => "Warning",
                Severity::Info => "Info",
            };
            output.push_str(&format!("- {}: {}\n", self.paint(prefix, tone), error.message));
        }

        output.push_str(&self.format_summary(result));
        output
    }

    /// Format as a JSON document
    fn format_json(&self, result: &ValidationResult, errors: &[&ValidationError]) -> GuardianResult<String> {
        let counts = result.counts();
        let json_report = serde_json::json!({
            "is_valid": result.is_valid(),
            "errors": errors,
            "summary": {
                "errors": counts.error,
                "warnings": counts.warning,
                "infos": counts.info
            }
        });

        serde_json::to_string_pretty(&json_report)
            .map_err(|e| GuardianError::serialization(format!("JSON serialization failed: {e}")))
    }

    /// Format messages grouped under their field names
    fn format_fields(&self, errors: &[&ValidationError]) -> String {
        let filtered = ValidationResult::from_errors(errors.iter().map(|e| (*e).clone()).collect());
        let mut output = String::new();

        for (field, messages) in filtered.model_state() {
            output.push_str(&format!("{}:\n", self.paint(&field, Tone::Strong)));
            for message in messages {
                output.push_str(&format!("  - {message}\n"));
            }
        }

        output
    }

    /// Format the summary line
    fn format_summary(&self, result: &ValidationResult) -> String {
        let counts = result.counts();
        let mut parts = Vec::new();

        if counts.error > 0 {
            parts.push(plural(counts.error, "error"));
        }
        if counts.warning > 0 {
            parts.push(plural(counts.warning, "warning"));
        }
        if counts.info > 0 {
            parts.push(format!("{} info", counts.info));
        }

        format!("Summary: {}\n", parts.join(", "))
    }

    fn paint(&self, text: &str, tone: Tone) -> String {
        if self.options.use_colors {
            tone.apply(text)
        } else {
            text.to_string()
        }
    }
}

/// JSON body returned after a successful create, e.g. by an API endpoint
pub fn created_response<E: Serialize>(entity: &E, message: &str) -> GuardianResult<String> {
    let entity = serde_json::to_value(entity)
        .map_err(|e| GuardianError::serialization(format!("JSON serialization failed: {e}")))?;
    let body: JsonValue = serde_json::json!({
        "message": message,
        "user": entity
    });

    serde_json::to_string_pretty(&body)
        .map_err(|e| GuardianError::serialization(format!("JSON serialization failed: {e}")))
}

fn plural(count: usize, noun: &str) -> String {
    format!("{} {}{}", count, noun, if count == 1 { "" } else { "s" })
}

#[derive(Debug, Clone, Copy)]
enum Tone {
    Good,
    Bad,
    Warn,
    Note,
    Strong,
}

impl Tone {
    #[cfg(feature = "colors")]
    fn apply(self, text: &str) -> String {
        use colored::Colorize;

        match self {
            Self::Good => text.green().to_string(),
            Self::Bad => text.red().to_string(),
            Self::Warn => text.yellow().to_string(),
            Self::Note => text.cyan().to_string(),
            Self::Strong => text.bold().to_string(),
        }
    }

    #[cfg(not(feature = "colors"))]
    fn apply(self, text: &str) -> String {
        text.to_string()
    }
}
