//! Configuration loading and management for Field Guardian
//!
//! Architecture: Anti-Corruption Layer - Configuration translates external YAML formats
//! - Raw YAML structures are converted to typed rule sets
//! - The default configuration carries the reference user rules
//! - Field names are checked against the entity before any rule is built

use crate::domain::violations::{GuardianError, GuardianResult, Severity};
use crate::rules::{CascadeMode, Check, FieldAccess, FieldRule, Predicate, RuleSet};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Supported configuration format versions
const SUPPORTED_VERSIONS: &[&str] = &["1.0"];

/// Main configuration structure describing one rule set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSetConfig {
    /// Configuration format version
    pub version: String,
    /// Entity the rules apply to (e.g. "user")
    pub entity: String,
    /// Default cascade mode for checks within a field
    #[serde(default)]
    pub cascade: CascadeMode,
    /// Whether to stop after the first field with errors
    #[serde(default = "default_class_level_cascade")]
    pub class_level_cascade: CascadeMode,
    /// Field rules in evaluation order
    pub rules: Vec<FieldRuleConfig>,
}

/// Rules for a single field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldRuleConfig {
    /// Field name as exposed by the entity
    pub field: String,
    /// Name used for `{field}` in messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Cascade override for this field
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cascade: Option<CascadeMode>,
    /// Checks in evaluation order
    pub checks: Vec<CheckConfig>,
}

/// A predicate with its optional message and severity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckConfig {
    #[serde(flatten)]
    pub predicate: Predicate,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub severity: Option<Severity>,
}

impl CheckConfig {
    /// Check with an explicit message
    pub fn new(predicate: Predicate, message: impl Into<String>) -> Self {
        Self {
            predicate,
            message: Some(message.into()),
            severity: None,
        }
    }

    fn to_check(&self) -> Check {
        let mut check = Check::new(self.predicate.clone());
        if let Some(message) = &self.message {
            check = check.with_message(message.clone());
        }
        if let Some(severity) = self.severity {
            check = check.with_severity(severity);
        }
        check
    }
}

impl RuleSetConfig {
    /// Load configuration from a YAML (or JSON) file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GuardianResult<Self> {
        let contents = fs::read_to_string(&path).map_err(|e| {
            GuardianError::config(format!(
                "Failed to read config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        let config: Self = serde_yaml::from_str(&contents).map_err(|e| {
            GuardianError::config(format!(
                "Failed to parse config file '{}': {}",
                path.as_ref().display(),
                e
            ))
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from string content
    pub fn load_from_str(content: &str) -> GuardianResult<Self> {
        let config: Self = serde_yaml::from_str(content)
            .map_err(|e| GuardianError::config(format!("Failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// The reference user rules
    pub fn with_defaults() -> Self {
        Self {
            version: "1.0".to_string(),
            entity: "user".to_string(),
            cascade: CascadeMode::Stop,
            class_level_cascade: CascadeMode::Continue,
            rules: vec![
                FieldRuleConfig {
                    field: "name".to_string(),
                    display_name: None,
                    cascade: None,
                    checks: vec![
                        CheckConfig::new(Predicate::NotEmpty, "name must not be empty"),
                        CheckConfig::new(
                            Predicate::length_between(2, 50),
                            "name must be between 2 and 50 characters",
                        ),
                    ],
                },
                FieldRuleConfig {
                    field: "age".to_string(),
                    display_name: None,
                    cascade: None,
                    checks: vec![
                        CheckConfig::new(Predicate::greater_than(0), "age must be greater than 0"),
                        CheckConfig::new(
                            Predicate::less_than_or_equal(120),
                            "age must be at most 120",
                        ),
                    ],
                },
            ],
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> GuardianResult<()> {
        if !SUPPORTED_VERSIONS.contains(&self.version.as_str()) {
            return Err(GuardianError::config(format!(
                "Unsupported configuration version: {}. Supported versions: {}",
                self.version,
                SUPPORTED_VERSIONS.join(", ")
            )));
        }

        if self.rules.is_empty() {
            return Err(GuardianError::config("Configuration declares no rules"));
        }

        for rule in &self.rules {
            if rule.field.trim().is_empty() {
                return Err(GuardianError::config("Rule with empty field name"));
            }
            if rule.checks.is_empty() {
                return Err(GuardianError::config(format!(
                    "Rule for field '{}' declares no checks",
                    rule.field
                )));
            }
            for check in &rule.checks {
                check.predicate.prepare().map_err(|e| {
                    GuardianError::config(format!(
                        "Invalid check '{}' on field '{}': {}",
                        check.predicate.code(),
                        rule.field,
                        e
                    ))
                })?;
            }
        }

        Ok(())
    }

    /// Build a rule set for an entity type that exposes its fields by name
    pub fn build<T: FieldAccess>(&self) -> GuardianResult<RuleSet<T>> {
        RuleSet::from_config(self)
    }

    /// Rules declared for one field
    pub fn rules_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldRuleConfig> {
        self.rules.iter().filter(move |rule| rule.field == field)
    }

    /// Total number of checks across all rules
    pub fn check_count(&self) -> usize {
        self.rules.iter().map(|rule| rule.checks.len()).sum()
    }

    /// Convert to YAML for serialization
    pub fn to_yaml(&self) -> GuardianResult<String> {
        serde_yaml::to_string(self)
            .map_err(|e| GuardianError::serialization(format!("Failed to serialize config: {e}")))
    }

    /// Convert to JSON for serialization
    pub fn to_json(&self) -> GuardianResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| GuardianError::serialization(format!("Failed to serialize config: {e}")))
    }
}

impl Default for RuleSetConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl<T: FieldAccess> RuleSet<T> {
    /// Build a rule set from configuration.
    ///
    /// Fails if the configuration targets another entity or names a field
    /// that `T` does not expose.
    pub fn from_config(config: &RuleSetConfig) -> GuardianResult<Self> {
        config.validate()?;

        if config.entity != T::ENTITY {
            return Err(GuardianError::config(format!(
                "Configuration is for entity '{}', expected '{}'",
                config.entity,
                T::ENTITY
            )));
        }

        let mut builder = RuleSet::<T>::builder()
            .cascade(config.cascade)
            .class_level_cascade(config.class_level_cascade);

        for rule_config in &config.rules {
            if !T::has_field(&rule_config.field) {
                return Err(GuardianError::unknown_field(&rule_config.field, T::ENTITY));
            }

            let mut rule = FieldRule::<T>::by_name(rule_config.field.clone());
            if let Some(name) = &rule_config.display_name {
                rule = rule.display_name(name.clone());
            }
            if let Some(mode) = rule_config.cascade {
                rule = rule.cascade(mode);
            }
            for check in &rule_config.checks {
                rule = rule.with_check(check.to_check());
            }
            builder = builder.field(rule);
        }

        builder.build()
    }
}

fn default_class_level_cascade() -> CascadeMode {
    CascadeMode::Continue
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: RuleSetConfig,
}

impl ConfigBuilder {
    /// Create a builder for an entity with no rules
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            config: RuleSetConfig {
                version: "1.0".to_string(),
                entity: entity.into(),
                cascade: CascadeMode::Stop,
                class_level_cascade: CascadeMode::Continue,
                rules: Vec::new(),
            },
        }
    }

    /// Start from the reference user rules
    pub fn from_defaults() -> Self {
        Self {
            config: RuleSetConfig::default(),
        }
    }

    /// Set the default field cascade mode
    pub fn cascade(mut self, mode: CascadeMode) -> Self {
        self.config.cascade = mode;
        self
    }

    /// Add a field rule
    pub fn add_rule(mut self, field: impl Into<String>, checks: Vec<CheckConfig>) -> Self {
        self.config.rules.push(FieldRuleConfig {
            field: field.into(),
            display_name: None,
            cascade: None,
            checks,
        });
        self
    }

    /// Build the final configuration
    pub fn build(self) -> GuardianResult<RuleSetConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::user::{user_rules, User};
    use std::io::Write;
    use tempfile::NamedTempFile;

    const USER_YAML: &str = r#"
version: "1.0"
entity: user
rules:
  - field: name
    display_name: Name
    checks:
      - predicate: not_empty
      - predicate: length
        min: 2
        max: 50
        message: "{field} needs {min}-{max} characters, got {length}"
  - field: age
    checks:
      - predicate: greater_than
        value: 0
      - predicate: less_than_or_equal
        value: 120
        severity: warning
"#;

    #[test]
    fn test_default_config_is_valid() {
        let config = RuleSetConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.check_count(), 4);
    }

    #[test]
    fn test_default_config_matches_reference_rules() {
        let from_config: RuleSet<User> = RuleSetConfig::default().build().unwrap();
        let reference = user_rules().unwrap();

        for user in [
            User::new("", -5),
            User::new("A", 121),
            User::new("Anna Beispiel", 30),
            User::new("x".repeat(51), 0),
        ] {
            assert_eq!(
                from_config.validate(&user).unwrap(),
                reference.validate(&user).unwrap()
            );
        }
    }

    #[test]
    fn test_load_from_str_with_templates() {
        let config = RuleSetConfig::load_from_str(USER_YAML).unwrap();
        assert_eq!(config.cascade, CascadeMode::Stop);
        assert_eq!(config.class_level_cascade, CascadeMode::Continue);

        let rules: RuleSet<User> = config.build().unwrap();
        let result = rules.validate(&User::new("A", 130)).unwrap();

        assert_eq!(result.errors()[0].message, "Name needs 2-50 characters, got 1");
        assert_eq!(result.errors()[1].message, "age must be at most 120");
        assert_eq!(result.errors()[1].severity, Severity::Warning);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(USER_YAML.as_bytes()).unwrap();

        let config = RuleSetConfig::load_from_file(file.path()).unwrap();
        assert_eq!(config.rules.len(), 2);
        assert_eq!(config.rules_for("age").count(), 1);
    }

    #[test]
    fn test_load_json_config() {
        let json = RuleSetConfig::default().to_json().unwrap();
        let config = RuleSetConfig::load_from_str(&json).unwrap();
        assert_eq!(config, RuleSetConfig::default());
    }

    #[test]
    fn test_yaml_round_trip_keeps_rules() {
        let yaml = RuleSetConfig::default().to_yaml().unwrap();
        assert!(yaml.contains("predicate: not_empty"));
        assert_eq!(RuleSetConfig::load_from_str(&yaml).unwrap(), RuleSetConfig::default());
    }

    #[test]
    fn test_missing_file_is_config_error() {
        let err = RuleSetConfig::load_from_file("/nonexistent/field_guardian.yaml").unwrap_err();
        assert!(matches!(err, GuardianError::Configuration { .. }));
    }

    #[test]
    fn test_rejects_unsupported_version() {
        let yaml = USER_YAML.replace("\"1.0\"", "\"2.0\"");
        assert!(RuleSetConfig::load_from_str(&yaml).is_err());
    }

    #[test]
    fn test_rejects_invalid_checks() {
        let yaml = r#"
version: "1.0"
entity: user
rules:
  - field: name
    checks:
      - predicate: length
        min: 10
        max: 2
"#;
        assert!(RuleSetConfig::load_from_str(yaml).is_err());

        let yaml = r#"
version: "1.0"
entity: user
rules:
  - field: name
    checks:
      - predicate: matches
        pattern: "[unclosed"
"#;
        assert!(RuleSetConfig::load_from_str(yaml).is_err());

        let yaml = "version: \"1.0\"\nentity: user\nrules:\n  - field: name\n    checks: []\n";
        assert!(RuleSetConfig::load_from_str(yaml).is_err());
    }

    #[test]
    fn test_unknown_field_fails_at_construction() {
        let config = ConfigBuilder::new("user")
            .add_rule("email", vec![CheckConfig::new(Predicate::EmailAddress, "bad email")])
            .build()
            .unwrap();

        let err = config.build::<User>().unwrap_err();
        assert!(matches!(err, GuardianError::UnknownField { ref field, .. } if field == "email"));
    }

    #[test]
    fn test_entity_mismatch_fails_at_construction() {
        let config = ConfigBuilder::new("order")
            .add_rule("name", vec![CheckConfig::new(Predicate::NotEmpty, "x")])
            .build()
            .unwrap();
        assert!(config.build::<User>().is_err());
    }

    #[test]
    fn test_type_mismatch_fails_at_construction() {
        let config = ConfigBuilder::new("user")
            .add_rule("age", vec![CheckConfig::new(Predicate::length_between(1, 3), "x")])
            .build()
            .unwrap();

        let err = config.build::<User>().unwrap_err();
        assert!(err.is_configuration());
        assert!(matches!(err, GuardianError::TypeMismatch { ref field, .. } if field == "age"));
    }

    #[test]
    fn test_mistyped_check_after_failing_check_fails_at_construction() {
        let config = RuleSetConfig::load_from_str(
            r#"
version: "1.0"
entity: user
rules:
  - field: name
    checks:
      - predicate: not_empty
      - predicate: greater_than
        value: 0
"#,
        )
        .unwrap();

        let err = config.build::<User>().unwrap_err();
        assert!(matches!(err, GuardianError::TypeMismatch { ref predicate, ref found, .. }
            if predicate == "greater_than" && found == "text"));
    }

    #[test]
    fn test_builder_extends_defaults() {
        let config = ConfigBuilder::from_defaults()
            .cascade(CascadeMode::Continue)
            .add_rule("id", vec![CheckConfig::new(Predicate::greater_than(0), "id must be set")])
            .build()
            .unwrap();

        let rules: RuleSet<User> = config.build().unwrap();
        let result = rules.validate(&User::new("", 0)).unwrap();
        let fields: Vec<&str> = result.errors().iter().map(|e| e.field_name.as_str()).collect();
        assert_eq!(fields, vec!["name", "name", "age", "id"]);
    }
}
