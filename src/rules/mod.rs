//! Rule engine for declarative field validation
//!
//! Architectural Principle: Service Layer - RuleSet orchestrates field rules against an entity
//! - FieldRule binds an accessor to an ordered list of checks
//! - Each check pairs a Predicate with a message template and severity
//! - Failing checks are translated to validation errors at the boundary

pub mod predicate;

use crate::domain::violations::{GuardianError, GuardianResult, Severity, ValidationError, ValidationResult};
use rayon::prelude::*;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

pub use predicate::{Number, Predicate};

/// A field value as seen by the predicates
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    /// Absent value (`None`)
    Missing,
    Text(String),
    Integer(i64),
    Float(f64),
    Bool(bool),
}

/// Declared type of a field, checked against predicates when a rule set is built
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Bool,
}

impl FieldKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Bool => "bool",
        }
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Self::Integer | Self::Float)
    }
}

impl fmt::Display for FieldKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FieldValue {
    pub fn is_missing(&self) -> bool {
        matches!(self, Self::Missing)
    }

    /// Name of the value's type, used in configuration errors
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Missing => "missing",
            Self::Text(_) => "text",
            Self::Integer(_) => "integer",
            Self::Float(_) => "float",
            Self::Bool(_) => "bool",
        }
    }

    /// Text form of the value, `None` when missing
    pub fn render(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Text(s) => Some(s.clone()),
            Self::Integer(i) => Some(i.to_string()),
            Self::Float(f) => Some(f.to_string()),
            Self::Bool(b) => Some(b.to_string()),
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<&String> for FieldValue {
    fn from(value: &String) -> Self {
        Self::Text(value.clone())
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<i32> for FieldValue {
    fn from(value: i32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<u32> for FieldValue {
    fn from(value: u32) -> Self {
        Self::Integer(value.into())
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl<V: Into<FieldValue>> From<Option<V>> for FieldValue {
    fn from(value: Option<V>) -> Self {
        value.map_or(Self::Missing, Into::into)
    }
}

/// Accessor output types whose field kind is known without a value
pub trait TypedValue: Into<FieldValue> {
    const KIND: FieldKind;
}

macro_rules! typed_value {
    ($kind:ident: $($ty:ty),+) => {
        $(impl TypedValue for $ty {
            const KIND: FieldKind = FieldKind::$kind;
        })+
    };
}

typed_value!(Text: &str, String, &String);
typed_value!(Integer: i64, i32, u32);
typed_value!(Float: f64);
typed_value!(Bool: bool);

impl<V: TypedValue> TypedValue for Option<V> {
    const KIND: FieldKind = V::KIND;
}

/// Entities whose fields can be looked up by name.
///
/// Required for rule sets built from configuration files, where the
/// accessor is a field name rather than a closure.
pub trait FieldAccess {
    /// Entity name as used in configuration files
    const ENTITY: &'static str;
    /// Every field `field_value` answers for, with its kind
    const FIELDS: &'static [(&'static str, FieldKind)];

    /// Value of the named field, `None` if the entity has no such field
    fn field_value(&self, field: &str) -> Option<FieldValue>;

    /// Declared kind of the named field
    fn field_kind(field: &str) -> Option<FieldKind> {
        Self::FIELDS
            .iter()
            .find(|(name, _)| *name == field)
            .map(|(_, kind)| *kind)
    }

    fn has_field(field: &str) -> bool {
        Self::field_kind(field).is_some()
    }
}

/// Whether evaluation continues after a failing check
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Hash)]
#[serde(rename_all = "snake_case")]
pub enum CascadeMode {
    /// Keep evaluating the remaining checks
    Continue,
    /// Stop at the first failure
    #[default]
    Stop,
}

/// One predicate with its message and severity
#[derive(Debug, Clone)]
pub struct Check {
    predicate: Predicate,
    message: Option<String>,
    severity: Severity,
    regex: Option<Regex>,
}

impl Check {
    /// Create a check using the predicate's default message
    pub fn new(predicate: Predicate) -> Self {
        Self {
            predicate,
            message: None,
            severity: Severity::Error,
            regex: None,
        }
    }

    /// Set the message template
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Set the severity reported on failure
    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn predicate(&self) -> &Predicate {
        &self.predicate
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    /// Configured template, or the predicate's default
    pub fn message_template(&self) -> &str {
        self.message
            .as_deref()
            .unwrap_or_else(|| self.predicate.default_message())
    }
}

type Accessor<T> = Arc<dyn Fn(&T) -> Option<FieldValue> + Send + Sync>;

/// Rule bound to one field of an entity
pub struct FieldRule<T> {
    field_name: String,
    display_name: Option<String>,
    kind: Option<FieldKind>,
    accessor: Accessor<T>,
    checks: Vec<Check>,
    cascade: Option<CascadeMode>,
}

impl<T> FieldRule<T> {
    /// Create a rule reading the field through a closure
    pub fn new<F, V>(field_name: impl Into<String>, accessor: F) -> Self
    where
        F: Fn(&T) -> V + Send + Sync + 'static,
        V: TypedValue,
    {
        Self::try_new(field_name, V::KIND, move |entity| Some(accessor(entity).into()))
    }

    /// Create a rule whose accessor may fail to produce a value.
    ///
    /// Returning `None` is reported as a configuration error, not as a
    /// validation failure.
    pub fn try_new<F>(field_name: impl Into<String>, kind: FieldKind, accessor: F) -> Self
    where
        F: Fn(&T) -> Option<FieldValue> + Send + Sync + 'static,
    {
        Self::with_accessor(field_name.into(), Some(kind), Arc::new(accessor))
    }

    fn with_accessor(field_name: String, kind: Option<FieldKind>, accessor: Accessor<T>) -> Self {
        Self {
            field_name,
            display_name: None,
            kind,
            accessor,
            checks: Vec::new(),
            cascade: None,
        }
    }

    /// Add a predicate with its failure message
    pub fn check(self, predicate: Predicate, message: impl Into<String>) -> Self {
        self.with_check(Check::new(predicate).with_message(message))
    }

    /// Add a fully configured check
    pub fn with_check(mut self, check: Check) -> Self {
        self.checks.push(check);
        self
    }

    /// Name substituted for `{field}` in messages
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Override the rule set's cascade mode for this field
    pub fn cascade(mut self, mode: CascadeMode) -> Self {
        self.cascade = Some(mode);
        self
    }

    pub fn field_name(&self) -> &str {
        &self.field_name
    }

    /// Display name if set, otherwise the field name
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.field_name)
    }

    pub fn checks(&self) -> &[Check] {
        &self.checks
    }

    pub fn cascade_mode(&self) -> Option<CascadeMode> {
        self.cascade
    }

    /// Declared kind of the field, `None` for a by-name rule on an undeclared field
    pub fn kind(&self) -> Option<FieldKind> {
        self.kind
    }

    fn evaluate(
        &self,
        entity: &T,
        cascade: CascadeMode,
        result: &mut ValidationResult,
    ) -> GuardianResult<()> {
        let value = (self.accessor)(entity)
            .ok_or_else(|| GuardianError::field_access(&self.field_name))?;

        for check in &self.checks {
            let passed = check
                .predicate
                .evaluate(&self.field_name, &value, check.regex.as_ref())?;
            tracing::trace!(
                field = %self.field_name,
                predicate = check.predicate.code(),
                passed,
                "evaluated check"
            );
            if passed {
                continue;
            }

            let message = check
                .predicate
                .render(check.message_template(), self.label(), &value);
            result.add_error(
                ValidationError::new(&self.field_name, message)
                    .with_code(check.predicate.code())
                    .with_severity(check.severity)
                    .with_attempted_value(value.render()),
            );

            if cascade == CascadeMode::Stop {
                break;
            }
        }

        Ok(())
    }
}

impl<T: FieldAccess> FieldRule<T> {
    /// Create a rule reading the field by name through `FieldAccess`
    pub fn by_name(field_name: impl Into<String>) -> Self {
        let field_name = field_name.into();
        let kind = T::field_kind(&field_name);
        let lookup = field_name.clone();
        Self::with_accessor(
            field_name,
            kind,
            Arc::new(move |entity: &T| entity.field_value(&lookup)),
        )
    }
}

impl<T> fmt::Debug for FieldRule<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldRule")
            .field("field_name", &self.field_name)
            .field("display_name", &self.display_name)
            .field("kind", &self.kind)
            .field("checks", &self.checks)
            .field("cascade", &self.cascade)
            .finish_non_exhaustive()
    }
}

/// Anything that can validate an entity of type `T`
pub trait Validator<T>: Send + Sync {
    fn validate(&self, entity: &T) -> GuardianResult<ValidationResult>;
}

/// Options for batch validation
#[derive(Debug, Clone)]
pub struct ValidationOptions {
    /// Whether to validate entities in parallel
    pub parallel: bool,
}

impl Default for ValidationOptions {
    fn default() -> Self {
        Self { parallel: true }
    }
}

/// Immutable, ordered set of field rules for one entity type
#[derive(Debug)]
pub struct RuleSet<T> {
    rules: Vec<FieldRule<T>>,
    cascade: CascadeMode,
    class_level_cascade: CascadeMode,
}

impl<T> RuleSet<T> {
    /// Start declaring a rule set
    pub fn builder() -> RuleSetBuilder<T> {
        RuleSetBuilder::new()
    }

    /// Run every rule against the entity.
    ///
    /// Failing checks become errors in the returned result. `Err` is only
    /// returned for misconfigured rules, such as a predicate applied to a
    /// value type it cannot check.
    pub fn validate(&self, entity: &T) -> GuardianResult<ValidationResult> {
        let mut result = ValidationResult::new();

        for rule in &self.rules {
            let before = result.errors().len();
            rule.evaluate(entity, rule.cascade.unwrap_or(self.cascade), &mut result)?;

            if self.class_level_cascade == CascadeMode::Stop && result.errors().len() > before {
                break;
            }
        }

        Ok(result)
    }

    /// Validate many entities, returning results in input order
    pub fn validate_all(
        &self,
        entities: &[T],
        options: &ValidationOptions,
    ) -> GuardianResult<Vec<ValidationResult>>
    where
        T: Sync,
    {
        if options.parallel && entities.len() > 1 {
            entities.par_iter().map(|entity| self.validate(entity)).collect()
        } else {
            entities.iter().map(|entity| self.validate(entity)).collect()
        }
    }

    pub fn rules(&self) -> &[FieldRule<T>] {
        &self.rules
    }

    /// Rules declared for one field
    pub fn rules_for<'a>(&'a self, field: &'a str) -> impl Iterator<Item = &'a FieldRule<T>> {
        self.rules.iter().filter(move |rule| rule.field_name == field)
    }

    /// Default cascade mode for fields
    pub fn cascade(&self) -> CascadeMode {
        self.cascade
    }

    pub fn class_level_cascade(&self) -> CascadeMode {
        self.class_level_cascade
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<T> Validator<T> for RuleSet<T> {
    fn validate(&self, entity: &T) -> GuardianResult<ValidationResult> {
        RuleSet::validate(self, entity)
    }
}

/// Builder declaring field rules in evaluation order
pub struct RuleSetBuilder<T> {
    rules: Vec<FieldRule<T>>,
    cascade: CascadeMode,
    class_level_cascade: CascadeMode,
}

impl<T> RuleSetBuilder<T> {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            cascade: CascadeMode::Stop,
            class_level_cascade: CascadeMode::Continue,
        }
    }

    /// Append a field rule
    pub fn field(mut self, rule: FieldRule<T>) -> Self {
        self.rules.push(rule);
        self
    }

    /// Default cascade mode for checks within a field
    pub fn cascade(mut self, mode: CascadeMode) -> Self {
        self.cascade = mode;
        self
    }

    /// Whether to stop after the first field that reported errors
    pub fn class_level_cascade(mut self, mode: CascadeMode) -> Self {
        self.class_level_cascade = mode;
        self
    }

    /// Check every rule against its field kind and compile regex predicates
    pub fn build(mut self) -> GuardianResult<RuleSet<T>> {
        for rule in &mut self.rules {
            if rule.field_name.trim().is_empty() {
                return Err(GuardianError::config("Field rule with empty field name"));
            }
            if rule.checks.is_empty() {
                return Err(GuardianError::config(format!(
                    "Field rule '{}' declares no checks",
                    rule.field_name
                )));
            }
            let kind = rule
                .kind
                .ok_or_else(|| GuardianError::field_access(&rule.field_name))?;

            for check in &mut rule.checks {
                if !check.predicate.applies_to(kind) {
                    return Err(GuardianError::type_mismatch(
                        &rule.field_name,
                        check.predicate.code(),
                        kind.as_str(),
                    ));
                }
                check.regex = check.predicate.prepare().map_err(|e| {
                    GuardianError::config(format!("Invalid check on field '{}': {e}", rule.field_name))
                })?;
            }

            tracing::debug!(
                "Adding rule for field '{}' with {} check(s)",
                rule.field_name,
                rule.checks.len()
            );
        }

        tracing::debug!("Built rule set with {} field rule(s)", self.rules.len());

        Ok(RuleSet {
            rules: self.rules,
            cascade: self.cascade,
            class_level_cascade: self.class_level_cascade,
        })
    }
}

impl<T> Default for RuleSetBuilder<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone)]
    struct Account {
        email: Option<String>,
        balance: f64,
        code: String,
    }

    impl FieldAccess for Account {
        const ENTITY: &'static str = "account";
        const FIELDS: &'static [(&'static str, FieldKind)] = &[
            ("email", FieldKind::Text),
            ("balance", FieldKind::Float),
            ("code", FieldKind::Text),
        ];

        fn field_value(&self, field: &str) -> Option<FieldValue> {
            match field {
                "email" => Some(self.email.clone().into()),
                "balance" => Some(self.balance.into()),
                "code" => Some((&self.code).into()),
                _ => None,
            }
        }
    }

    fn account(email: Option<&str>, balance: f64, code: &str) -> Account {
        Account {
            email: email.map(str::to_string),
            balance,
            code: code.to_string(),
        }
    }

    fn account_rules(cascade: CascadeMode) -> RuleSet<Account> {
        RuleSet::builder()
            .cascade(cascade)
            .field(
                FieldRule::by_name("email")
                    .with_check(Check::new(Predicate::NotNull))
                    .with_check(Check::new(Predicate::EmailAddress)),
            )
            .field(
                FieldRule::new("balance", |a: &Account| a.balance)
                    .check(Predicate::greater_than_or_equal(0), "balance must not be negative"),
            )
            .field(
                FieldRule::new("code", |a: &Account| a.code.clone())
                    .display_name("Account code")
                    .check(Predicate::NotEmpty, "{field} is required")
                    .check(Predicate::matches(r"^[A-Z]{3}$"), "{field} '{value}' must be three capitals")
                    .with_check(Check::new(Predicate::length_between(3, 3)).with_severity(Severity::Warning)),
            )
            .build()
            .unwrap()
    }

    #[test]
    fn test_valid_entity_has_no_errors() {
        let rules = account_rules(CascadeMode::Stop);
        let result = rules.validate(&account(Some("a@b.de"), 10.0, "ABC")).unwrap();
        assert!(result.is_valid());
    }

    #[test]
    fn test_missing_value_reported_by_presence_check_only() {
        let rules = account_rules(CascadeMode::Continue);
        let result = rules.validate(&account(None, 0.0, "ABC")).unwrap();

        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].code, "not_null");
        assert_eq!(result.errors()[0].message, "email must not be null");
        assert_eq!(result.errors()[0].attempted_value, None);
    }

    #[test]
    fn test_stop_cascade_reports_first_failure_per_field() {
        let rules = account_rules(CascadeMode::Stop);
        let result = rules.validate(&account(Some("x"), -1.0, "")).unwrap();

        let codes: Vec<&str> = result.errors().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["email_address", "greater_than_or_equal", "not_empty"]);
        assert_eq!(result.errors()[2].message, "Account code is required");
    }

    #[test]
    fn test_continue_cascade_accumulates_in_declaration_order() {
        let rules = account_rules(CascadeMode::Continue);
        let result = rules.validate(&account(Some("a@b.de"), 1.0, "abcd")).unwrap();

        let codes: Vec<&str> = result.errors().iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["matches", "length"]);
        assert_eq!(result.errors()[0].message, "Account code 'abcd' must be three capitals");
        assert_eq!(result.errors()[1].severity, Severity::Warning);
        assert_eq!(result.errors()[1].message, "Account code must be between 3 and 3 characters");
    }

    #[test]
    fn test_field_cascade_override() {
        let rules = RuleSet::builder()
            .cascade(CascadeMode::Stop)
            .field(
                FieldRule::new("code", |a: &Account| a.code.clone())
                    .cascade(CascadeMode::Continue)
                    .check(Predicate::MinLength { min: 2 }, "too short")
                    .check(Predicate::matches("^[A-Z]+$"), "not capitals"),
            )
            .build()
            .unwrap();

        let result = rules.validate(&account(None, 0.0, "a")).unwrap();
        assert_eq!(result.errors().len(), 2);
    }

    #[test]
    fn test_class_level_stop_ends_after_first_failing_field() {
        let rules = RuleSet::builder()
            .class_level_cascade(CascadeMode::Stop)
            .field(FieldRule::new("balance", |a: &Account| a.balance).check(Predicate::greater_than(0), "b"))
            .field(FieldRule::new("code", |a: &Account| a.code.clone()).check(Predicate::NotEmpty, "c"))
            .build()
            .unwrap();

        let result = rules.validate(&account(None, 0.0, "")).unwrap();
        assert_eq!(result.errors().len(), 1);
        assert_eq!(result.errors()[0].field_name, "balance");
    }

    #[test]
    fn test_type_mismatch_rejected_at_build() {
        let err = RuleSet::builder()
            .field(FieldRule::new("balance", |a: &Account| a.balance).check(Predicate::length_between(1, 2), "x"))
            .build()
            .unwrap_err();

        assert!(matches!(
            err,
            GuardianError::TypeMismatch { ref field, ref predicate, ref found }
                if field == "balance" && predicate == "length" && found == "float"
        ));
    }

    #[test]
    fn test_type_mismatch_behind_failing_check_is_still_rejected() {
        // Stop cascade never evaluates the second check for an empty code.
        let err = RuleSet::builder()
            .field(
                FieldRule::new("code", |a: &Account| a.code.clone())
                    .check(Predicate::NotEmpty, "required")
                    .check(Predicate::greater_than(0), "positive"),
            )
            .build()
            .unwrap_err();
        assert!(matches!(err, GuardianError::TypeMismatch { ref predicate, .. } if predicate == "greater_than"));

        let err = RuleSet::builder()
            .field(FieldRule::<Account>::by_name("email").check(Predicate::greater_than(0), "x"))
            .build()
            .unwrap_err();
        assert!(matches!(err, GuardianError::TypeMismatch { ref found, .. } if found == "text"));
    }

    #[test]
    fn test_optional_fields_take_inner_kind() {
        let rule = FieldRule::new("email", |a: &Account| a.email.clone());
        assert_eq!(rule.kind(), Some(FieldKind::Text));
        assert_eq!(FieldRule::<Account>::by_name("balance").kind(), Some(FieldKind::Float));
    }

    #[test]
    fn test_undeclared_field_is_configuration_error() {
        let err = RuleSet::builder()
            .field(FieldRule::<Account>::by_name("iban").with_check(Check::new(Predicate::NotEmpty)))
            .build()
            .unwrap_err();
        assert!(matches!(err, GuardianError::FieldAccess { ref field } if field == "iban"));
    }

    #[test]
    fn test_failing_accessor_is_configuration_error() {
        let rules = RuleSet::builder()
            .field(
                FieldRule::try_new("iban", FieldKind::Text, |_: &Account| None)
                    .with_check(Check::new(Predicate::NotEmpty)),
            )
            .build()
            .unwrap();

        let err = rules.validate(&account(None, 1.0, "ABC")).unwrap_err();
        assert!(matches!(err, GuardianError::FieldAccess { ref field } if field == "iban"));
    }

    #[test]
    fn test_build_rejects_malformed_rules() {
        let empty = RuleSet::<Account>::builder()
            .field(FieldRule::new("code", |a: &Account| a.code.clone()))
            .build();
        assert!(empty.is_err());

        let bad_regex = RuleSet::<Account>::builder()
            .field(FieldRule::new("code", |a: &Account| a.code.clone()).check(Predicate::matches("(["), "x"))
            .build();
        assert!(matches!(bad_regex, Err(GuardianError::Configuration { .. })));

        let unnamed = RuleSet::<Account>::builder()
            .field(FieldRule::new(" ", |a: &Account| a.code.clone()).check(Predicate::NotEmpty, "x"))
            .build();
        assert!(unnamed.is_err());
    }

    #[test]
    fn test_validate_all_keeps_input_order() {
        let rules = account_rules(CascadeMode::Stop);
        let accounts: Vec<Account> = (0..20)
            .map(|i| account(Some("a@b.de"), f64::from(i) - 10.0, "ABC"))
            .collect();

        let parallel = rules.validate_all(&accounts, &ValidationOptions::default()).unwrap();
        let sequential = rules
            .validate_all(&accounts, &ValidationOptions { parallel: false })
            .unwrap();

        assert_eq!(parallel, sequential);
        assert!(!parallel[0].is_valid());
        assert!(parallel[10].is_valid());
    }

    #[test]
    fn test_rule_set_is_shareable_across_threads() {
        fn assert_send_sync<V: Send + Sync>() {}
        assert_send_sync::<RuleSet<Account>>();

        let rules = Arc::new(account_rules(CascadeMode::Stop));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let rules = Arc::clone(&rules);
                std::thread::spawn(move || rules.validate(&account(None, -1.0, "")).unwrap())
            })
            .collect();

        let results: Vec<ValidationResult> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(results.windows(2).all(|pair| pair[0] == pair[1]));
    }
}
