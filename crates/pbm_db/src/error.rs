//! Error types for the persistence sink and reference-data cache.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DbError>;

#[derive(Debug, Error)]
pub enum DbError {
    /// Connection or query failure surfaced from the driver.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Step 1 reference-data verification found an empty or missing
    /// collaborator table (members/pharmacies/drugs/plans).
    #[error("reference data missing or empty: {0}")]
    MissingReferenceData(String),

    /// A claim's business keys did not resolve to a surrogate id in the
    /// reference store. Aborts and rolls back the whole batch.
    #[error(
        "integrity violation resolving claim {claim_number} (batch of {batch_size} starting at {batch_first_claim}): {reason}"
    )]
    Integrity { batch_first_claim: String, batch_size: usize, claim_number: String, reason: String },

    /// The transaction exceeded its configured timeout and was aborted.
    #[error("persistence transaction timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// `create_pool` was asked for a backend this build was not compiled
    /// with (neither the `sqlite` nor the `postgres` feature is enabled).
    #[error("pbm_db was not compiled with a database backend: {0}")]
    NotCompiled(String),
}
