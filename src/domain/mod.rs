//! Domain layer for Field Guardian
//!
//! CDD Principle: Domain Model - Pure business logic for entity validation
//! - Contains the validation result aggregate, its errors and the user entity
//! - Independent of infrastructure concerns like storage, terminals or files
//! - Expresses the ubiquitous language of fields, checks and failures

pub mod user;
pub mod violations;

// Re-export main domain types for convenience
pub use user::*;
pub use violations::*;
