//! Pipeline Coordinator: drives ingest -> adjudicate -> persist, owns the
//! running counters, emits periodic progress, and produces the final
//! report.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::SeedableRng;
use thiserror::Error;

use pbm_db::{create_pool, ensure_schema, verify_populated, DbError, PersistenceSink, ReferenceStore};
use pbm_engine::EngineConfig;
use pbm_ingest::{ClaimSource, IngestError, IngestReport};
use pbm_metrics::{MetricsRecorder, OperationSample};
use pbm_protocol::Claim;

use crate::cancel::CancellationToken;
use crate::config::RunConfig;
use crate::pacer::Pacer;

#[derive(Debug, Error)]
pub enum CoordinatorError {
    /// Step 1 found the reference store unreachable or missing required
    /// collaborator data. Maps to exit code 2.
    #[error("reference data verification failed: {0}")]
    ReferenceVerification(#[source] DbError),

    /// Claim Source could not discover any input files. Maps to exit code 3.
    #[error("input file discovery failed: {0}")]
    InputDiscovery(#[source] IngestError),

    /// A batch failed to persist (connection loss or integrity violation).
    /// Maps to exit code 4. The coordinator does not retry.
    #[error("persistence failed on batch starting near claim count {claims_processed_before_failure}: {source}")]
    Persistence { claims_processed_before_failure: u64, #[source] source: DbError },
}

/// Process-wide, monotonic adjudication counters. Owned exclusively by the
/// coordinator (never mutated from elsewhere) per spec.md §3.4/§9's note
/// against hidden global counters on the engine itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct AdjudicationCounters {
    pub total: u64,
    pub approved: u64,
    pub rejected: u64,
    pub cumulative_processing_ms: u64,
}

impl AdjudicationCounters {
    fn record(&mut self, claim: &Claim) {
        self.total += 1;
        match claim.status {
            pbm_protocol::ClaimStatus::Approved => self.approved += 1,
            pbm_protocol::ClaimStatus::Rejected => self.rejected += 1,
        }
        self.cumulative_processing_ms += claim.processing_time_ms.max(0) as u64;
    }

    pub fn approval_rate(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.approved as f64 / self.total as f64 }
    }

    pub fn mean_processing_ms(&self) -> f64 {
        if self.total == 0 { 0.0 } else { self.cumulative_processing_ms as f64 / self.total as f64 }
    }
}

/// End-of-run summary: wall-clock duration, totals, and database-side
/// counts for the property-9/10 cross-check against the coordinator's own
/// counters.
#[derive(Debug, Clone, Copy)]
pub struct FinalReport {
    pub duration: Duration,
    pub counters: AdjudicationCounters,
    pub overall_tps: f64,
    pub db_total: i64,
    pub db_approved: i64,
    pub db_rejected: i64,
    pub cancelled: bool,
}

impl FinalReport {
    pub fn approval_percentage(&self) -> f64 {
        self.counters.approval_rate() * 100.0
    }
}

/// Runs the full simulation end to end per spec.md §4.5's algorithm.
pub async fn run(config: &RunConfig, cancel: CancellationToken) -> Result<FinalReport, CoordinatorError> {
    let pool = create_pool(&config.database_url, 5)
        .await
        .map_err(CoordinatorError::ReferenceVerification)?;
    ensure_schema(&pool).await.map_err(CoordinatorError::ReferenceVerification)?;

    // Step 1: reference store reachability + populated collaborator data.
    verify_populated(&pool).await.map_err(CoordinatorError::ReferenceVerification)?;
    tracing::info!("reference store verified");
    if config.verify_reference_only {
        return Ok(FinalReport {
            duration: Duration::ZERO,
            counters: AdjudicationCounters::default(),
            overall_tps: 0.0,
            db_total: 0,
            db_approved: 0,
            db_rejected: 0,
            cancelled: false,
        });
    }

    let reference = ReferenceStore::load(&pool).await.map_err(CoordinatorError::ReferenceVerification)?;
    let sink = PersistenceSink::new(pool, reference);
    let metrics = MetricsRecorder::new(&config.metrics_dir, run_id());

    // Step 2: materialize all input claims, in file order.
    let source = ClaimSource::new(&config.input_dir, &config.input_pattern);
    let (claims, ingest_report) = source.load_all().map_err(CoordinatorError::InputDiscovery)?;
    log_ingest_report(&ingest_report);

    // Step 3: zero counters, start the clock.
    let mut counters = AdjudicationCounters::default();
    let started_at = Instant::now();
    let mut last_progress_at = started_at;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let engine_config = EngineConfig { fidelity_delays: config.fidelity_delays };
    let pacer = Pacer::new(config.batch_size, config.speedup);

    let total_claims = claims.len() as u64;
    let mut cancelled = false;

    // Step 4: contiguous slices of `batch_size`.
    for slice in claims.chunks(config.batch_size) {
        let mut adjudicated: Vec<Claim> = Vec::with_capacity(slice.len());
        for ingested in slice {
            let claim = pbm_engine::adjudicate_ingested(ingested.clone(), &mut rng, engine_config);
            counters.record(&claim);
            adjudicated.push(claim);
        }

        if !config.dry_run {
            let insert_started = Instant::now();
            let mut persisted = 0usize;
            for insert_chunk in adjudicated.chunks(config.insert_batch_size) {
                persisted += sink.insert_batch(insert_chunk).await.map_err(|source| {
                    CoordinatorError::Persistence { claims_processed_before_failure: counters.total, source }
                })?;
            }
            let elapsed_ms = insert_started.elapsed().as_secs_f64() * 1000.0;
            let bytes: u64 = adjudicated.iter().map(estimate_claim_bytes).sum();
            metrics.record("claim", "insert_batch", OperationSample::new(elapsed_ms, persisted as u64, bytes));
        }

        if last_progress_at.elapsed() >= Duration::from_secs(config.progress_interval_secs) {
            log_progress(&counters, total_claims, started_at.elapsed());
            last_progress_at = Instant::now();
        }

        if cancel.is_cancelled() {
            cancelled = true;
            tracing::warn!("cancellation requested; exiting after current batch's persistence commit");
            break;
        }

        pacer.sleep_after_batch(&cancel).await;
    }

    let duration = started_at.elapsed();
    let overall_tps = if duration.as_secs_f64() > 0.0 { counters.total as f64 / duration.as_secs_f64() } else { 0.0 };

    let (db_total, db_approved, db_rejected) = if config.dry_run {
        (0, 0, 0)
    } else {
        (
            sink.count_all().await.map_err(|source| CoordinatorError::Persistence {
                claims_processed_before_failure: counters.total,
                source,
            })?,
            sink.count_approved().await.map_err(|source| CoordinatorError::Persistence {
                claims_processed_before_failure: counters.total,
                source,
            })?,
            sink.count_rejected().await.map_err(|source| CoordinatorError::Persistence {
                claims_processed_before_failure: counters.total,
                source,
            })?,
        )
    };

    let report = FinalReport { duration, counters, overall_tps, db_total, db_approved, db_rejected, cancelled };
    log_final_report(&report);
    Ok(report)
}

fn run_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

/// Rough on-the-wire footprint of one persisted claim: the variable-length
/// string fields plus a fixed allowance for the numeric/timestamp columns.
/// Used only to derive the metrics log's bytes/mb-per-sec columns, not for
/// any capacity decision.
fn estimate_claim_bytes(claim: &Claim) -> u64 {
    const FIXED_COLUMN_BYTES: u64 = 128;
    let variable = claim.claim_number.as_str().len()
        + claim.request.ndc.len()
        + claim.response_code.len()
        + claim.response_message.len()
        + claim.request.daw_code.as_deref().map_or(0, str::len)
        + claim.request.prescriber_npi.as_deref().map_or(0, str::len);
    FIXED_COLUMN_BYTES + variable as u64
}

fn log_ingest_report(report: &IngestReport) {
    tracing::info!(
        files = report.files,
        total_rows = report.total_rows,
        parsed = report.parsed,
        warnings = report.warnings,
        "ingest complete"
    );
}

fn log_progress(counters: &AdjudicationCounters, total_claims: u64, elapsed: Duration) {
    let percent = if total_claims == 0 { 100.0 } else { counters.total as f64 / total_claims as f64 * 100.0 };
    let tps = if elapsed.as_secs_f64() > 0.0 { counters.total as f64 / elapsed.as_secs_f64() } else { 0.0 };
    tracing::info!(
        processed = counters.total,
        percent_complete = format!("{percent:.1}"),
        tps = format!("{tps:.1}"),
        mean_processing_ms = format!("{:.2}", counters.mean_processing_ms()),
        approved = counters.approved,
        rejected = counters.rejected,
        "progress"
    );
}

fn log_final_report(report: &FinalReport) {
    tracing::info!("{}", "=".repeat(60));
    tracing::info!("Simulation complete");
    tracing::info!("duration_secs = {:.2}", report.duration.as_secs_f64());
    tracing::info!("total_processed = {}", report.counters.total);
    tracing::info!("approved = {}", report.counters.approved);
    tracing::info!("rejected = {}", report.counters.rejected);
    tracing::info!("approval_pct = {:.2}", report.approval_percentage());
    tracing::info!("overall_tps = {:.2}", report.overall_tps);
    tracing::info!("mean_processing_ms = {:.2}", report.counters.mean_processing_ms());
    tracing::info!(
        "db_counts: total={} approved={} rejected={}",
        report.db_total,
        report.db_approved,
        report.db_rejected
    );
    if report.cancelled {
        tracing::info!("run ended via cooperative cancellation (partial report)");
    }
    tracing::info!("{}", "=".repeat(60));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use pbm_protocol::{ClaimNumber, ClaimRequest, ClaimStatus, PricingBreakdown, TransactionType};
    use rust_decimal_macros::dec;

    fn claim(status: ClaimStatus, processing_time_ms: i64) -> Claim {
        Claim {
            claim_number: ClaimNumber::new("CLM-TEST").unwrap(),
            request: ClaimRequest {
                member_id: 1,
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
            status,
            response_code: "0".to_string(),
            response_message: "Approved, tier 1".to_string(),
            pricing: PricingBreakdown::default(),
            processing_time_ms,
        }
    }

    #[test]
    fn counters_track_totals_and_means() {
        let mut counters = AdjudicationCounters::default();
        counters.record(&claim(ClaimStatus::Approved, 10));
        counters.record(&claim(ClaimStatus::Rejected, 20));
        assert_eq!(counters.total, 2);
        assert_eq!(counters.approved, 1);
        assert_eq!(counters.rejected, 1);
        assert_eq!(counters.approval_rate(), 0.5);
        assert_eq!(counters.mean_processing_ms(), 15.0);
    }

    #[test]
    fn empty_counters_do_not_divide_by_zero() {
        let counters = AdjudicationCounters::default();
        assert_eq!(counters.approval_rate(), 0.0);
        assert_eq!(counters.mean_processing_ms(), 0.0);
    }
}
