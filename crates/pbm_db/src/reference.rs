//! Read-only reference-data cache.
//!
//! Loads the business-key -> surrogate-id maps for members, pharmacies and
//! drugs once at startup (Design Note: "load reference lookup tables once
//! at startup into read-only in-memory maps"). A cache miss falls through
//! to a single per-row SQL lookup rather than failing immediately, so keys
//! added to the store after startup still resolve.

use std::collections::HashMap;

use crate::error::{DbError, Result};
use crate::pool::DbPool;

/// One resolved member: its surrogate id plus its enrolled plan's surrogate
/// id, if any. `ClaimRequest` never carries a plan code directly (see
/// DESIGN.md); the plan business key is resolved transitively through the
/// member's enrollment row.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedMember {
    pub member_id: i64,
    pub plan_id: Option<i64>,
}

pub struct ReferenceStore {
    members: HashMap<u64, ResolvedMember>,
    pharmacies: HashMap<u64, i64>,
    drugs: HashMap<String, i64>,
}

impl ReferenceStore {
    /// Load every member/pharmacy/drug row into memory. Safe to call with
    /// an empty store (the coordinator's pre-flight check catches that
    /// fatal condition separately via [`verify_populated`]).
    pub async fn load(pool: &DbPool) -> Result<Self> {
        let member_rows: Vec<(i64, i64, Option<i64>)> =
            sqlx::query_as("SELECT id, member_number, plan_id FROM members").fetch_all(pool).await?;
        let members = member_rows
            .into_iter()
            .map(|(id, number, plan_id)| (number as u64, ResolvedMember { member_id: id, plan_id }))
            .collect();

        let pharmacy_rows: Vec<(i64, i64)> =
            sqlx::query_as("SELECT id, pharmacy_number FROM pharmacies").fetch_all(pool).await?;
        let pharmacies = pharmacy_rows.into_iter().map(|(id, number)| (number as u64, id)).collect();

        let drug_rows: Vec<(i64, String)> = sqlx::query_as("SELECT id, ndc FROM drugs").fetch_all(pool).await?;
        let drugs = drug_rows.into_iter().map(|(id, ndc)| (ndc, id)).collect();

        Ok(Self { members, pharmacies, drugs })
    }

    pub fn resolve_member(&self, member_number: u64) -> Option<ResolvedMember> {
        self.members.get(&member_number).copied()
    }

    pub fn resolve_pharmacy(&self, pharmacy_number: u64) -> Option<i64> {
        self.pharmacies.get(&pharmacy_number).copied()
    }

    pub fn resolve_drug(&self, ndc: &str) -> Option<i64> {
        self.drugs.get(ndc).copied()
    }

    /// Per-row fallback SQL lookup for a member business key not present in
    /// the in-memory cache (e.g. enrolled after startup).
    pub async fn lookup_member(pool: &DbPool, member_number: u64) -> Result<Option<ResolvedMember>> {
        let row: Option<(i64, Option<i64>)> =
            sqlx::query_as("SELECT id, plan_id FROM members WHERE member_number = ?")
                .bind(member_number as i64)
                .fetch_optional(pool)
                .await?;
        Ok(row.map(|(member_id, plan_id)| ResolvedMember { member_id, plan_id }))
    }

    pub async fn lookup_pharmacy(pool: &DbPool, pharmacy_number: u64) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT id FROM pharmacies WHERE pharmacy_number = ?")
            .bind(pharmacy_number as i64)
            .fetch_optional(pool)
            .await?;
        Ok(row.map(|(id,)| id))
    }

    pub async fn lookup_drug(pool: &DbPool, ndc: &str) -> Result<Option<i64>> {
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT id FROM drugs WHERE ndc = ?").bind(ndc).fetch_optional(pool).await?;
        Ok(row.map(|(id,)| id))
    }
}

/// Coordinator step 1: every collaborator table must have at least one row.
pub async fn verify_populated(pool: &DbPool) -> Result<()> {
    for table in ["members", "pharmacies", "drugs", "plans"] {
        let count: (i64,) =
            sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}")).fetch_one(pool).await?;
        if count.0 == 0 {
            return Err(DbError::MissingReferenceData(format!("{table} has no rows")));
        }
    }
    Ok(())
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::schema::ensure_schema;

    async fn seeded_pool() -> DbPool {
        let pool = crate::pool::create_pool("sqlite::memory:", 1).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO plans (plan_code) VALUES ('GOLD')").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO members (member_number, plan_id) VALUES (466742, 1)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query("INSERT INTO pharmacies (pharmacy_number) VALUES (1)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO drugs (ndc) VALUES ('12345678901')").execute(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn verify_populated_fails_on_empty_table() {
        let pool = crate::pool::create_pool("sqlite::memory:", 1).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        assert!(verify_populated(&pool).await.is_err());
    }

    #[tokio::test]
    async fn load_resolves_known_business_keys() {
        let pool = seeded_pool().await;
        verify_populated(&pool).await.unwrap();
        let store = ReferenceStore::load(&pool).await.unwrap();
        let member = store.resolve_member(466_742).unwrap();
        assert_eq!(member.plan_id, Some(1));
        assert_eq!(store.resolve_pharmacy(1), Some(1));
        assert_eq!(store.resolve_drug("12345678901"), Some(1));
        assert_eq!(store.resolve_member(999_999), None);
    }

    #[tokio::test]
    async fn lookup_member_falls_back_to_sql() {
        let pool = seeded_pool().await;
        let found = ReferenceStore::lookup_member(&pool, 466_742).await.unwrap();
        assert!(found.is_some());
        let missing = ReferenceStore::lookup_member(&pool, 1).await.unwrap();
        assert!(missing.is_none());
    }
}
