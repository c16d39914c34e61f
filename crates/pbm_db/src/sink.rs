//! Persistence Sink: batched, transactional insertion of adjudicated
//! claims with business-key resolution.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use pbm_protocol::Claim;

use crate::error::{DbError, Result};
use crate::pool::{DbPool, DbTransaction};
use crate::reference::ReferenceStore;

/// Default rows-per-insert-call, per spec.md §4.3.
pub const DEFAULT_BATCH_SIZE: usize = 1000;

/// Default transaction timeout per spec.md §5: "Persistence operations
/// carry an optional transaction timeout (implementer default 60 s) after
/// which the transaction is aborted and surfaced."
pub const DEFAULT_TRANSACTION_TIMEOUT: Duration = Duration::from_secs(60);

/// Emit a progress line every this many successfully inserted rows.
const PROGRESS_EVERY: u64 = 10_000;

pub struct PersistenceSink {
    pool: DbPool,
    reference: ReferenceStore,
    total_inserted: AtomicU64,
    last_progress_log: AtomicU64,
    transaction_timeout: Duration,
}

impl PersistenceSink {
    pub fn new(pool: DbPool, reference: ReferenceStore) -> Self {
        Self::with_timeout(pool, reference, DEFAULT_TRANSACTION_TIMEOUT)
    }

    pub fn with_timeout(pool: DbPool, reference: ReferenceStore, transaction_timeout: Duration) -> Self {
        Self {
            pool,
            reference,
            total_inserted: AtomicU64::new(0),
            last_progress_log: AtomicU64::new(0),
            transaction_timeout,
        }
    }

    /// Insert every claim in `batch` inside one transaction: either all of
    /// them land or none do. Unknown business keys abort and roll back the
    /// whole batch (`DbError::Integrity`). The whole transaction is bounded
    /// by `transaction_timeout`; exceeding it surfaces `DbError::Timeout`
    /// (the transaction is dropped, which rolls it back) rather than
    /// blocking the coordinator indefinitely.
    pub async fn insert_batch(&self, batch: &[Claim]) -> Result<usize> {
        if batch.is_empty() {
            return Ok(0);
        }

        match tokio::time::timeout(self.transaction_timeout, self.insert_batch_inner(batch)).await {
            Ok(result) => result,
            Err(_) => Err(DbError::Timeout(self.transaction_timeout)),
        }
    }

    async fn insert_batch_inner(&self, batch: &[Claim]) -> Result<usize> {
        let mut tx = self.pool.begin().await?;
        let batch_first_claim = batch[0].claim_number.as_str().to_string();

        for claim in batch {
            if let Err(reason) = self.insert_one(&mut tx, claim).await {
                tx.rollback().await?;
                return Err(DbError::Integrity {
                    batch_first_claim,
                    batch_size: batch.len(),
                    claim_number: claim.claim_number.as_str().to_string(),
                    reason,
                });
            }
        }

        tx.commit().await?;

        let total = self.total_inserted.fetch_add(batch.len() as u64, Ordering::Relaxed) + batch.len() as u64;
        self.maybe_log_progress(total);

        Ok(batch.len())
    }

    fn maybe_log_progress(&self, total: u64) {
        let last = self.last_progress_log.load(Ordering::Relaxed);
        if total / PROGRESS_EVERY > last / PROGRESS_EVERY {
            self.last_progress_log.store(total, Ordering::Relaxed);
            tracing::info!(total_inserted = total, "persisted {} claims so far", total);
        }
    }

    async fn insert_one(&self, tx: &mut DbTransaction<'_>, claim: &Claim) -> std::result::Result<(), String> {
        let member = match self.reference.resolve_member(claim.request.member_id) {
            Some(m) => m,
            None => crate::reference::ReferenceStore::lookup_member(&self.pool, claim.request.member_id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("unknown member business key {}", claim.request.member_id))?,
        };
        let pharmacy_id = match self.reference.resolve_pharmacy(claim.request.pharmacy_id) {
            Some(id) => id,
            None => crate::reference::ReferenceStore::lookup_pharmacy(&self.pool, claim.request.pharmacy_id)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("unknown pharmacy business key {}", claim.request.pharmacy_id))?,
        };
        let drug_id = match self.reference.resolve_drug(&claim.request.ndc) {
            Some(id) => id,
            None => crate::reference::ReferenceStore::lookup_drug(&self.pool, &claim.request.ndc)
                .await
                .map_err(|e| e.to_string())?
                .ok_or_else(|| format!("unknown drug business key {}", claim.request.ndc))?,
        };

        sqlx::query(
            r#"
            INSERT INTO claims (
                claim_number, member_id, pharmacy_id, drug_id, plan_id,
                transaction_type, quantity_dispensed, days_supply, refill_number,
                date_of_service, ingredient_cost_submitted, dispensing_fee_submitted,
                daw_code, prescriber_npi,
                status, response_code, response_message,
                patient_pay, plan_pay, tax, tier,
                deductible_applied, out_of_pocket_applied,
                received_timestamp, processed_timestamp, processing_time_ms
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(claim.claim_number.as_str())
        .bind(member.member_id)
        .bind(pharmacy_id)
        .bind(drug_id)
        .bind(member.plan_id)
        .bind(claim.request.transaction_type.as_str())
        .bind(claim.request.quantity_dispensed.to_string())
        .bind(claim.request.days_supply)
        .bind(claim.request.refill_number)
        .bind(claim.request.date_of_service.to_string())
        .bind(claim.request.ingredient_cost_submitted.to_string())
        .bind(claim.request.dispensing_fee_submitted.to_string())
        .bind(claim.request.daw_code.as_deref())
        .bind(claim.request.prescriber_npi.as_deref())
        .bind(claim.status.as_str())
        .bind(&claim.response_code)
        .bind(&claim.response_message)
        .bind(claim.pricing.patient_pay.to_string())
        .bind(claim.pricing.plan_pay.to_string())
        .bind(claim.pricing.tax.to_string())
        .bind(claim.pricing.tier as i64)
        .bind(claim.pricing.deductible_applied.map(|d| d.to_string()))
        .bind(claim.pricing.out_of_pocket_applied.map(|d| d.to_string()))
        .bind(claim.received_timestamp.to_rfc3339())
        .bind(claim.processed_timestamp.to_rfc3339())
        .bind(claim.processing_time_ms)
        .execute(&mut **tx)
        .await
        .map_err(|e| e.to_string())?;

        Ok(())
    }

    /// Count of claims currently in the `claims` table, for the final
    /// report's database-side verification (§8 property 9/10).
    pub async fn count_all(&self) -> Result<i64> {
        let row: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM claims").fetch_one(&self.pool).await?;
        Ok(row.0)
    }

    pub async fn count_approved(&self) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM claims WHERE status = 'APPROVED'").fetch_one(&self.pool).await?;
        Ok(row.0)
    }

    pub async fn count_rejected(&self) -> Result<i64> {
        let row: (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM claims WHERE status = 'REJECTED'").fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}

#[cfg(all(test, feature = "sqlite"))]
mod tests {
    use super::*;
    use crate::pool::create_pool;
    use crate::schema::ensure_schema;
    use chrono::{NaiveDate, Utc};
    use pbm_protocol::{ClaimNumber, ClaimRequest, ClaimStatus, PricingBreakdown, TransactionType};
    use rust_decimal_macros::dec;

    async fn seeded_pool() -> DbPool {
        let pool = create_pool("sqlite::memory:", 1).await.unwrap();
        ensure_schema(&pool).await.unwrap();
        sqlx::query("INSERT INTO members (member_number) VALUES (466742)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO pharmacies (pharmacy_number) VALUES (1)").execute(&pool).await.unwrap();
        sqlx::query("INSERT INTO drugs (ndc) VALUES ('12345678901')").execute(&pool).await.unwrap();
        pool
    }

    fn approved_claim(claim_number: &str, member_id: u64) -> Claim {
        Claim {
            claim_number: ClaimNumber::new(claim_number).unwrap(),
            request: ClaimRequest {
                member_id,
                pharmacy_id: 1,
                ndc: "12345678901".to_string(),
                quantity_dispensed: dec!(30),
                days_supply: 30,
                refill_number: 0,
                date_of_service: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
                ingredient_cost_submitted: dec!(45.99),
                dispensing_fee_submitted: dec!(2.50),
                daw_code: None,
                prescriber_npi: None,
                transaction_type: TransactionType::B1,
            },
            received_timestamp: Utc::now(),
            processed_timestamp: Utc::now(),
            status: ClaimStatus::Approved,
            response_code: "0".to_string(),
            response_message: "Approved, tier 1".to_string(),
            pricing: PricingBreakdown { patient_pay: dec!(10.00), plan_pay: dec!(38.49), tax: dec!(0.00), tier: 1, deductible_applied: None, out_of_pocket_applied: None },
            processing_time_ms: 5,
        }
    }

    #[tokio::test]
    async fn insert_batch_commits_all_rows() {
        let pool = seeded_pool().await;
        let reference = ReferenceStore::load(&pool).await.unwrap();
        let sink = PersistenceSink::new(pool, reference);
        let batch = vec![approved_claim("CLM-1", 466_742), approved_claim("CLM-2", 466_742)];
        let inserted = sink.insert_batch(&batch).await.unwrap();
        assert_eq!(inserted, 2);
        assert_eq!(sink.count_all().await.unwrap(), 2);
        assert_eq!(sink.count_approved().await.unwrap(), 2);
    }

    /// Scenario E: one claim in the batch carries an unknown pharmacy
    /// business key. Expected: zero rows persisted, IntegrityError surfaced.
    #[tokio::test]
    async fn scenario_e_unknown_business_key_rolls_back_whole_batch() {
        let pool = seeded_pool().await;
        let reference = ReferenceStore::load(&pool).await.unwrap();
        let sink = PersistenceSink::new(pool, reference);

        let mut bad_claim = approved_claim("CLM-BAD", 466_742);
        bad_claim.request.pharmacy_id = 99_999;

        let batch = vec![approved_claim("CLM-OK", 466_742), bad_claim];
        let result = sink.insert_batch(&batch).await;
        assert!(matches!(result, Err(DbError::Integrity { .. })));
        assert_eq!(sink.count_all().await.unwrap(), 0);
    }
}
