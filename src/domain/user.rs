//! The user entity and its reference rule set

use crate::domain::violations::GuardianResult;
use crate::rules::{CascadeMode, FieldAccess, FieldKind, FieldRule, FieldValue, Predicate, RuleSet};
use serde::{Deserialize, Serialize};

/// A user with a display name and an age in years
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct User {
    /// Identifier assigned by the repository, 0 for unsaved users
    #[serde(default)]
    pub id: u32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: i32,
}

impl User {
    /// Create an unsaved user
    pub fn new(name: impl Into<String>, age: i32) -> Self {
        Self {
            id: 0,
            name: name.into(),
            age,
        }
    }

    /// Same user with the given id
    pub fn with_id(mut self, id: u32) -> Self {
        self.id = id;
        self
    }
}

impl FieldAccess for User {
    const ENTITY: &'static str = "user";
    const FIELDS: &'static [(&'static str, FieldKind)] = &[
        ("id", FieldKind::Integer),
        ("name", FieldKind::Text),
        ("age", FieldKind::Integer),
    ];

    fn field_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "id" => Some(self.id.into()),
            "name" => Some((&self.name).into()),
            "age" => Some(self.age.into()),
            _ => None,
        }
    }
}

/// The two rules every shell applies to users.
///
/// `name` must be non-empty and 2 to 50 characters long; `age` must be in
/// `(0, 120]`. Fields stop at their first failure, so an empty name is not
/// also reported as too short.
pub fn user_rules() -> GuardianResult<RuleSet<User>> {
    RuleSet::builder()
        .cascade(CascadeMode::Stop)
        .field(
            FieldRule::new("name", |u: &User| u.name.clone())
                .check(Predicate::NotEmpty, "name must not be empty")
                .check(
                    Predicate::length_between(2, 50),
                    "name must be between 2 and 50 characters",
                ),
        )
        .field(
            FieldRule::new("age", |u: &User| u.age)
                .check(Predicate::greater_than(0), "age must be greater than 0")
                .check(Predicate::less_than_or_equal(120), "age must be at most 120"),
        )
        .build()
}
