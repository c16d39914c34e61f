//! Shared claim payload types used by every crate in the simulator.
//!
//! These are the canonical definitions — ingestion, the decision engine,
//! persistence and metrics all build on the same `ClaimRequest` / `Claim`
//! types rather than each crate defining its own view.

pub mod claim;
pub mod ids;

pub use claim::{Claim, ClaimRequest, ClaimStatus, IngestedClaim, PricingBreakdown, TransactionType};
pub use ids::ClaimNumber;
