//! Database query functions for the `creator_profiles` table.

use anyhow::{Context, Result};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::CreatorProfileRow;

/// Fields for creating or replacing a creator profile.
#[derive(Debug, Clone)]
pub struct NewCreatorProfile<'a> {
    pub owner_id: Uuid,
    pub handle: &'a str,
    pub display_name: Option<&'a str>,
    pub voice: &'a serde_json::Value,
    pub visual: &'a serde_json::Value,
}

/// Fetch a creator's profile, if one has been saved.
pub async fn get_profile(pool: &PgPool, owner_id: Uuid) -> Result<Option<CreatorProfileRow>> {
    let row = sqlx::query_as::<_, CreatorProfileRow>(
        "SELECT * FROM creator_profiles WHERE owner_id = $1",
    )
    .bind(owner_id)
    .fetch_optional(pool)
    .await
    .context("failed to fetch creator profile")?;

    Ok(row)
}

/// Insert or replace a creator profile. Returns the stored row.
pub async fn upsert_profile(
    pool: &PgPool,
    profile: &NewCreatorProfile<'_>,
) -> Result<CreatorProfileRow> {
    let row = sqlx::query_as::<_, CreatorProfileRow>(
        "INSERT INTO creator_profiles (owner_id, handle, display_name, voice, visual) \
         VALUES ($1, $2, $3, $4, $5) \
         ON CONFLICT (owner_id) DO UPDATE \
         SET handle = EXCLUDED.handle, \
             display_name = EXCLUDED.display_name, \
             voice = EXCLUDED.voice, \
             visual = EXCLUDED.visual, \
             updated_at = now() \
         RETURNING *",
    )
    .bind(profile.owner_id)
    .bind(profile.handle)
    .bind(profile.display_name)
    .bind(profile.voice)
    .bind(profile.visual)
    .fetch_one(pool)
    .await
    .context("failed to upsert creator profile")?;

    Ok(row)
}
