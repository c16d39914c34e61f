//! Schema creation for the reference tables and the `claims` table.
//!
//! DDL ownership is nominally out of scope (§1): a real deployment's
//! `members`/`pharmacies`/`drugs`/`plans` tables are populated by the
//! out-of-scope loaders before this binary ever runs. `ensure_schema`
//! creates them (and `claims`) only when missing, so the workspace and its
//! tests are runnable standalone against a scratch SQLite file.

use crate::error::Result;
use crate::pool::DbPool;

#[cfg(feature = "sqlite")]
const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS plans (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    plan_code TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS members (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    member_number INTEGER NOT NULL UNIQUE,
    plan_id INTEGER REFERENCES plans(id)
);

CREATE TABLE IF NOT EXISTS pharmacies (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    pharmacy_number INTEGER NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS drugs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    ndc TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS claims (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    claim_number TEXT NOT NULL UNIQUE,
    member_id INTEGER NOT NULL REFERENCES members(id),
    pharmacy_id INTEGER NOT NULL REFERENCES pharmacies(id),
    drug_id INTEGER NOT NULL REFERENCES drugs(id),
    plan_id INTEGER REFERENCES plans(id),
    transaction_type TEXT NOT NULL,
    quantity_dispensed TEXT NOT NULL,
    days_supply INTEGER NOT NULL,
    refill_number INTEGER NOT NULL,
    date_of_service TEXT NOT NULL,
    ingredient_cost_submitted TEXT NOT NULL,
    dispensing_fee_submitted TEXT NOT NULL,
    daw_code TEXT,
    prescriber_npi TEXT,
    status TEXT NOT NULL CHECK (status IN ('APPROVED', 'REJECTED')),
    response_code TEXT NOT NULL,
    response_message TEXT NOT NULL,
    patient_pay TEXT NOT NULL,
    plan_pay TEXT NOT NULL,
    tax TEXT NOT NULL,
    tier INTEGER NOT NULL,
    deductible_applied TEXT,
    out_of_pocket_applied TEXT,
    received_timestamp TEXT NOT NULL,
    processed_timestamp TEXT NOT NULL,
    processing_time_ms INTEGER NOT NULL
);
"#;

#[cfg(all(feature = "postgres", not(feature = "sqlite")))]
const DDL: &str = r#"
CREATE TABLE IF NOT EXISTS plans (
    id BIGSERIAL PRIMARY KEY,
    plan_code TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS members (
    id BIGSERIAL PRIMARY KEY,
    member_number BIGINT NOT NULL UNIQUE,
    plan_id BIGINT REFERENCES plans(id)
);

CREATE TABLE IF NOT EXISTS pharmacies (
    id BIGSERIAL PRIMARY KEY,
    pharmacy_number BIGINT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS drugs (
    id BIGSERIAL PRIMARY KEY,
    ndc TEXT NOT NULL UNIQUE
);

CREATE TABLE IF NOT EXISTS claims (
    id BIGSERIAL PRIMARY KEY,
    claim_number TEXT NOT NULL UNIQUE,
    member_id BIGINT NOT NULL REFERENCES members(id),
    pharmacy_id BIGINT NOT NULL REFERENCES pharmacies(id),
    drug_id BIGINT NOT NULL REFERENCES drugs(id),
    plan_id BIGINT REFERENCES plans(id),
    transaction_type TEXT NOT NULL,
    quantity_dispensed NUMERIC NOT NULL,
    days_supply INTEGER NOT NULL,
    refill_number INTEGER NOT NULL,
    date_of_service DATE NOT NULL,
    ingredient_cost_submitted NUMERIC NOT NULL,
    dispensing_fee_submitted NUMERIC NOT NULL,
    daw_code TEXT,
    prescriber_npi TEXT,
    status TEXT NOT NULL CHECK (status IN ('APPROVED', 'REJECTED')),
    response_code TEXT NOT NULL,
    response_message TEXT NOT NULL,
    patient_pay NUMERIC NOT NULL,
    plan_pay NUMERIC NOT NULL,
    tax NUMERIC NOT NULL,
    tier INTEGER NOT NULL,
    deductible_applied NUMERIC,
    out_of_pocket_applied NUMERIC,
    received_timestamp TIMESTAMPTZ NOT NULL,
    processed_timestamp TIMESTAMPTZ NOT NULL,
    processing_time_ms BIGINT NOT NULL
);
"#;

/// Create the reference tables and `claims` when absent. Idempotent.
pub async fn ensure_schema(pool: &DbPool) -> Result<()> {
    for statement in DDL.split(';').map(str::trim).filter(|s| !s.is_empty()) {
        sqlx::query(statement).execute(pool).await?;
    }
    Ok(())
}
