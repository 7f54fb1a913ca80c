//! In-memory user storage for hosting shells
//!
//! CDD Principle: Infrastructure Layer - Repositories keep entities without affecting validation
//! - UserRepository is the seam hosts depend on for create/read/update/delete
//! - InMemoryUserRepository owns its data behind a lock, with no global state
//! - Validation happens before data reaches the repository, never inside it

use crate::domain::user::User;
use crate::domain::violations::{GuardianError, GuardianResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A stored user with bookkeeping timestamps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRecord {
    pub user: User,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Storage for users keyed by id
pub trait UserRepository: Send + Sync {
    /// All users ordered by id
    fn list(&self) -> Vec<User>;

    /// User with the given id
    fn get(&self, id: u32) -> Option<User>;

    /// Stored record including timestamps
    fn record(&self, id: u32) -> Option<UserRecord>;

    /// Store a new user under the next free id
    fn insert(&self, name: String, age: i32) -> User;

    /// Replace name and age of an existing user
    fn update(&self, user: User) -> GuardianResult<User>;

    /// Remove a user, returning it if it existed
    fn delete(&self, id: u32) -> Option<User>;
}

#[derive(Debug, Default)]
struct Inner {
    records: BTreeMap<u32, UserRecord>,
    last_id: u32,
}

/// Repository keeping users in process memory
#[derive(Debug, Default)]
pub struct InMemoryUserRepository {
    inner: RwLock<Inner>,
}

impl InMemoryUserRepository {
    /// Create an empty repository
    pub fn new() -> Self {
        Self::default()
    }

    /// Repository seeded with the two sample users
    pub fn with_sample_data() -> Self {
        let repository = Self::new();
        repository.insert("Max Muster".to_string(), 25);
        repository.insert("Anna Beispiel".to_string(), 30);
        repository
    }

    /// Number of stored users
    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Writers never panic mid-update, so a poisoned lock still holds consistent data.
    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl UserRepository for InMemoryUserRepository {
    fn list(&self) -> Vec<User> {
        self.read().records.values().map(|r| r.user.clone()).collect()
    }

    fn get(&self, id: u32) -> Option<User> {
        self.read().records.get(&id).map(|r| r.user.clone())
    }

    fn record(&self, id: u32) -> Option<UserRecord> {
        self.read().records.get(&id).cloned()
    }

    fn insert(&self, name: String, age: i32) -> User {
        let mut inner = self.write();
        inner.last_id += 1;
        let user = User {
            id: inner.last_id,
            name,
            age,
        };
        let now = Utc::now();
        inner.records.insert(
            user.id,
            UserRecord {
                user: user.clone(),
                created_at: now,
                updated_at: now,
            },
        );
        tracing::debug!("Stored user {} ('{}')", user.id, user.name);
        user
    }

    fn update(&self, user: User) -> GuardianResult<User> {
        let mut inner = self.write();
        let Some(record) = inner.records.get_mut(&user.id) else {
            tracing::warn!("Update for unknown user id {}", user.id);
            return Err(GuardianError::NotFound { id: user.id });
        };

        record.user.name = user.name;
        record.user.age = user.age;
        record.updated_at = Utc::now();
        Ok(record.user.clone())
    }

    fn delete(&self, id: u32) -> Option<User> {
        let removed = self.write().records.remove(&id).map(|r| r.user);
        if removed.is_none() {
            tracing::debug!("Delete for unknown user id {id} ignored");
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_data() {
        let repository = InMemoryUserRepository::with_sample_data();
        let users = repository.list();

        assert_eq!(users.len(), 2);
        assert_eq!(users[0], User::new("Max Muster", 25).with_id(1));
        assert_eq!(users[1], User::new("Anna Beispiel", 30).with_id(2));
    }

    #[test]
    fn test_insert_assigns_increasing_ids() {
        let repository = InMemoryUserRepository::new();
        let first = repository.insert("Jo".to_string(), 20);
        let second = repository.insert("Kim".to_string(), 40);

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(repository.get(2).map(|u| u.name), Some("Kim".to_string()));
    }

    #[test]
    fn test_ids_are_not_reused_after_delete() {
        let repository = InMemoryUserRepository::with_sample_data();
        repository.delete(2);
        let user = repository.insert("Lea".to_string(), 33);
        assert_eq!(user.id, 3);
    }

    #[test]
    fn test_update_existing() {
        let repository = InMemoryUserRepository::with_sample_data();
        let created_at = repository.record(1).unwrap().created_at;

        let updated = repository.update(User::new("Max Mustermann", 26).with_id(1)).unwrap();
        assert_eq!(updated.name, "Max Mustermann");

        let record = repository.record(1).unwrap();
        assert_eq!(record.user.age, 26);
        assert_eq!(record.created_at, created_at);
        assert!(record.updated_at >= created_at);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let repository = InMemoryUserRepository::new();
        let err = repository.update(User::new("Ghost", 30).with_id(9)).unwrap_err();
        assert!(matches!(err, GuardianError::NotFound { id: 9 }));
    }

    #[test]
    fn test_delete() {
        let repository = InMemoryUserRepository::with_sample_data();
        assert_eq!(repository.delete(1).map(|u| u.id), Some(1));
        assert_eq!(repository.delete(1), None);
        assert_eq!(repository.len(), 1);
        assert!(repository.get(1).is_none());
    }
}
