//! # studyhub-core
//!
//! The authorization core of StudyHub: who may see, change, or share which
//! topics, and how peer relationships move through their lifecycle.
//!
//! Every operation takes the caller's [`UserId`](studyhub_shared::UserId)
//! (already resolved by [`identity::resolve`]) and a
//! [`Database`](studyhub_store::Database), consults [`access::Gate`] for the
//! caller's effective rights, and only then touches content. Failures come
//! back as a typed [`CoreError`].

pub mod access;
pub mod content;
pub mod identity;
pub mod peers;
pub mod shares;

mod error;

pub use error::{CoreError, CoreResult};

#[cfg(test)]
pub(crate) mod test_util;
