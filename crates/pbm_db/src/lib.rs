//! Persistence Sink and reference-data cache for the pharmacy claims
//! adjudication simulator.
//!
//! `schema::ensure_schema` creates the `claims` table and the (nominally
//! out-of-scope, assumed-present) reference tables when missing, so the
//! workspace is runnable standalone against a scratch SQLite file.
//! `ReferenceStore` caches business-key -> surrogate-id lookups once at
//! startup; `PersistenceSink` resolves them per row and commits one batch
//! per transaction.

pub mod error;
pub mod pool;
pub mod reference;
pub mod schema;
pub mod sink;

pub use error::{DbError, Result};
pub use pool::{create_pool, DbPool, DbTransaction};
pub use reference::{verify_populated, ReferenceStore, ResolvedMember};
pub use schema::ensure_schema;
pub use sink::{PersistenceSink, DEFAULT_BATCH_SIZE};
