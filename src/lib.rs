//! Field Guardian - Declarative field validation for Rust entities
//!
//! Architecture: Clean Architecture - Library interface serves as the application layer
//! - Pure rule evaluation separated from storage and presentation concerns
//! - Clean boundaries between the rule engine and the shells that host it
//! - The user service shows how a host gates storage on validation results

pub mod config;
pub mod domain;
pub mod report;
pub mod rules;
pub mod store;

// Re-export main types for convenient access
pub use domain::user::{user_rules, User};
pub use domain::violations::{
    GuardianError, GuardianResult, Severity, SeverityCounts, ValidationError, ValidationResult,
};

pub use config::{CheckConfig, ConfigBuilder, FieldRuleConfig, RuleSetConfig};

pub use rules::{
    CascadeMode, Check, FieldAccess, FieldKind, FieldRule, FieldValue, Number, Predicate, RuleSet,
    RuleSetBuilder, TypedValue, ValidationOptions, Validator,
};

pub use report::{created_response, OutputFormat, ReportFormatter, ReportOptions};

pub use store::{InMemoryUserRepository, UserRecord, UserRepository};

use std::sync::Arc;

/// Outcome of submitting user data to the service
#[derive(Debug, Clone, PartialEq)]
pub enum Submission {
    /// Data passed validation and was stored
    Accepted(User),
    /// Data failed validation; nothing was stored
    Rejected(ValidationResult),
}

impl Submission {
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The validation result, valid for accepted submissions
    pub fn validation(&self) -> ValidationResult {
        match self {
            Self::Accepted(_) => ValidationResult::new(),
            Self::Rejected(result) => result.clone(),
        }
    }
}

/// User operations gated on validation
pub struct UserService<R: UserRepository> {
    validator: Arc<dyn Validator<User>>,
    repository: R,
}

impl<R: UserRepository> UserService<R> {
    /// Create a service with a custom validator
    pub fn new(validator: Arc<dyn Validator<User>>, repository: R) -> Self {
        Self {
            validator,
            repository,
        }
    }

    /// Create a service using the reference user rules
    pub fn with_default_rules(repository: R) -> GuardianResult<Self> {
        Ok(Self::new(Arc::new(user_rules()?), repository))
    }

    /// Validate without storing
    pub fn validate(&self, user: &User) -> GuardianResult<ValidationResult> {
        self.validator.validate(user)
    }

    /// All stored users
    pub fn list(&self) -> Vec<User> {
        self.repository.list()
    }

    /// User with the given id
    pub fn find(&self, id: u32) -> Option<User> {
        self.repository.get(id)
    }

    /// Validate and store a new user
    pub fn create(&self, name: impl Into<String>, age: i32) -> GuardianResult<Submission> {
        let candidate = User::new(name, age);
        let result = self.validator.validate(&candidate)?;

        if !result.is_valid() {
            tracing::debug!("Rejected new user with {} error(s)", result.errors().len());
            return Ok(Submission::Rejected(result));
        }

        Ok(Submission::Accepted(
            self.repository.insert(candidate.name, candidate.age),
        ))
    }

    /// Validate and apply changes to an existing user
    pub fn update(&self, user: User) -> GuardianResult<Submission> {
        if self.repository.get(user.id).is_none() {
            return Err(GuardianError::NotFound { id: user.id });
        }

        let result = self.validator.validate(&user)?;
        if !result.is_valid() {
            tracing::debug!("Rejected update of user {} with {} error(s)", user.id, result.errors().len());
            return Ok(Submission::Rejected(result));
        }

        self.repository.update(user).map(Submission::Accepted)
    }

    /// Remove a user; deleting an unknown id is not an error
    pub fn delete(&self, id: u32) -> Option<User> {
        self.repository.delete(id)
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }
}

/// Convenience function to validate a user with the reference rules
pub fn validate_user(user: &User) -> GuardianResult<ValidationResult> {
    user_rules()?.validate(user)
}
