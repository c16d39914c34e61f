//! Scenario F (spec.md §8): a 10,000-claim input at speedup=100 completes
//! in roughly 8-15 seconds of wall time, with an approval rate in
//! [84%, 90%] and overall TPS > 500.

use std::io::Write;
use std::path::Path;

use pbm::cancel::CancellationToken;
use pbm::cli::Cli;
use pbm::config::RunConfig;
use pbm::coordinator;

const HEADER: &str = "member_id,pharmacy_id,ndc,quantity_dispensed,days_supply,refill_number,date_of_service,ingredient_cost_submitted,dispensing_fee_submitted\n";

fn write_fixture(dir: &Path, rows: usize) {
    let path = dir.join("pharmacy_claims_simulation_0.csv");
    let mut file = std::fs::File::create(path).unwrap();
    file.write_all(HEADER.as_bytes()).unwrap();
    for i in 0..rows {
        writeln!(
            file,
            "MBR{:09},1,12345678901,30,30,0,2024-06-15,45.99,2.50",
            i + 1
        )
        .unwrap();
    }
}

async fn seed_reference_store(database_url: &str) {
    let pool = pbm_db::create_pool(database_url, 5).await.unwrap();
    pbm_db::ensure_schema(&pool).await.unwrap();
    sqlx::query("INSERT INTO plans (plan_code) VALUES ('GOLD')").execute(&pool).await.unwrap();
    for i in 1..=10_000i64 {
        sqlx::query("INSERT INTO members (member_number, plan_id) VALUES (?, 1)")
            .bind(i)
            .execute(&pool)
            .await
            .unwrap();
    }
    sqlx::query("INSERT INTO pharmacies (pharmacy_number) VALUES (1)").execute(&pool).await.unwrap();
    sqlx::query("INSERT INTO drugs (ndc) VALUES ('12345678901')").execute(&pool).await.unwrap();
}

#[tokio::test]
async fn scenario_f_10k_claims_at_100x_speedup() {
    let data_dir = tempfile::tempdir().unwrap();
    write_fixture(data_dir.path(), 10_000);

    let db_dir = tempfile::tempdir().unwrap();
    let db_path = db_dir.path().join("pbm_scenario_f.db");
    let database_url = format!("sqlite://{}?mode=rwc", db_path.display());
    seed_reference_store(&database_url).await;

    let cli = Cli {
        speedup: 100.0,
        database_url,
        input_dir: data_dir.path().to_path_buf(),
        input_pattern: "pharmacy_claims_simulation_*.csv".to_string(),
        batch_size: 100,
        insert_batch_size: 1000,
        metrics_dir: db_dir.path().join("metrics"),
        progress_interval_secs: 10,
        fidelity_delays: false,
        seed: Some(42),
        dry_run: false,
        verify_reference: false,
        verbose: false,
    };
    let config = RunConfig::from_cli(cli).unwrap();

    let started = std::time::Instant::now();
    let report = coordinator::run(&config, CancellationToken::new()).await.unwrap();
    let wall_clock = started.elapsed();

    assert_eq!(report.counters.total, 10_000);
    assert!(
        wall_clock.as_secs_f64() >= 8.0 * 0.9,
        "completed too fast for the pacing contract: {wall_clock:?}"
    );
    assert!(wall_clock.as_secs_f64() <= 20.0, "completed too slowly: {wall_clock:?}");

    let approval_rate = report.counters.approval_rate();
    assert!(
        (0.84..=0.90).contains(&approval_rate),
        "approval rate {approval_rate} outside expected band"
    );
    assert!(report.overall_tps > 500.0, "overall TPS {} did not exceed 500", report.overall_tps);

    assert_eq!(report.db_total, 10_000);
    assert_eq!(report.db_approved as u64, report.counters.approved);
    assert_eq!(report.db_rejected as u64, report.counters.rejected);
}
