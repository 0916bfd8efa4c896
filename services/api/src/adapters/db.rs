//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `RemoteProfileStore` port from the `core` crate. It keeps one row per
//! user in the PostgreSQL `profiles` table using `sqlx`.

use ascendant_core::domain::{PlayerStats, ProfileSettings, ProfileSnapshot, RemoteProfile};
use ascendant_core::ports::{PortError, PortResult, RemoteProfileStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `RemoteProfileStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    stats: Json<PlayerStats>,
    settings: Json<ProfileSettings>,
    onboarding_complete: bool,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> RemoteProfile {
        RemoteProfile {
            user_id: self.user_id,
            snapshot: ProfileSnapshot {
                stats: self.stats.0,
                settings: self.settings.0,
            },
            onboarding_complete: self.onboarding_complete,
            updated_at: self.updated_at,
        }
    }
}

//=========================================================================================
// `RemoteProfileStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl RemoteProfileStore for DbAdapter {
    async fn fetch_profile(&self, user_id: Uuid) -> PortResult<Option<RemoteProfile>> {
        let record = sqlx::query_as::<_, ProfileRecord>(
            "SELECT user_id, stats, settings, onboarding_complete, updated_at \
             FROM profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        Ok(record.map(ProfileRecord::to_domain))
    }

    async fn upsert_profile(&self, profile: &RemoteProfile) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO profiles (user_id, stats, settings, onboarding_complete, updated_at) \
             VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (user_id) DO UPDATE SET \
                stats = EXCLUDED.stats, \
                settings = EXCLUDED.settings, \
                onboarding_complete = EXCLUDED.onboarding_complete, \
                updated_at = EXCLUDED.updated_at",
        )
        .bind(profile.user_id)
        .bind(Json(&profile.snapshot.stats))
        .bind(Json(&profile.snapshot.settings))
        .bind(profile.onboarding_complete)
        .bind(profile.updated_at)
        .execute(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;
        Ok(())
    }
}
