//! # studyhub-shared
//!
//! Types shared by every StudyHub crate: strongly-typed identifiers, the
//! peer / share / audit enums, domain constants, and the input validation
//! rules applied before anything reaches the store.

pub mod constants;
pub mod error;
pub mod types;
pub mod validate;

pub use error::ValidationError;
pub use types::*;
