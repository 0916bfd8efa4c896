//! crates/ascendant_core/src/ports.rs
//!
//! Defines the service contracts (traits) the progression engine depends on.
//! These traits form the boundary of the hexagonal architecture, keeping the core
//! independent of where local slices are written and which backend holds the
//! remote profile.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::RemoteProfile;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., filesystem, database).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
    #[error("Unauthorized")]
    Unauthorized,
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

/// Durable key-value storage for serialized state slices.
///
/// Calls are synchronous: a mutation is persisted before the store returns.
pub trait LocalStorage: Send + Sync {
    /// Returns the stored value, or `None` when the key was never written.
    fn get(&self, key: &str) -> PortResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> PortResult<()>;

    /// Removing a missing key is not an error.
    fn remove(&self, key: &str) -> PortResult<()>;
}

/// The hosted record holding one profile snapshot per user.
#[async_trait]
pub trait RemoteProfileStore: Send + Sync {
    /// Fetches the user's profile, or `None` if it was never pushed.
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Option<RemoteProfile>>;

    /// Overwrites the user's profile wholesale. Last writer wins.
    async fn upsert_profile(&self, profile: &RemoteProfile) -> PortResult<()>;
}

/// Source of the current time, injectable so day boundaries can be tested.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// The wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
