//! Claim request/response payload types (NCPDP-flavored, simulator-scoped).

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::ids::ClaimNumber;

/// NCPDP transaction type tag. The engine only exercises `B1` end to end;
/// `B2`/`B3` are carried through the pipeline untouched (see Non-goals).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    #[default]
    B1,
    B2,
    B3,
}

impl TransactionType {
    pub fn as_str(self) -> &'static str {
        match self {
            TransactionType::B1 => "B1",
            TransactionType::B2 => "B2",
            TransactionType::B3 => "B3",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "" => Some(TransactionType::B1),
            "B1" => Some(TransactionType::B1),
            "B2" => Some(TransactionType::B2),
            "B3" => Some(TransactionType::B3),
            _ => None,
        }
    }
}

/// Disposition of an adjudicated claim. Exactly one variant applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ClaimStatus {
    Approved,
    Rejected,
}

impl ClaimStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ClaimStatus::Approved => "APPROVED",
            ClaimStatus::Rejected => "REJECTED",
        }
    }
}

/// What the ingestor parses out of one CSV row, before adjudication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimRequest {
    pub member_id: u64,
    pub pharmacy_id: u64,
    /// 11-character National Drug Code.
    pub ndc: String,
    pub quantity_dispensed: Decimal,
    pub days_supply: i32,
    pub refill_number: i32,
    pub date_of_service: NaiveDate,
    pub ingredient_cost_submitted: Decimal,
    pub dispensing_fee_submitted: Decimal,
    pub daw_code: Option<String>,
    pub prescriber_npi: Option<String>,
    pub transaction_type: TransactionType,
}

impl ClaimRequest {
    /// Required-field validation applied at adjudication step 1.
    ///
    /// Column presence and cell-level parse failures are already handled by
    /// the ingestor (a row that fails to parse never reaches this type); this
    /// re-checks the handful of fields the engine additionally requires to
    /// be *meaningful*, not merely present.
    pub fn is_valid(&self) -> bool {
        !self.ndc.trim().is_empty()
            && self.ndc.len() == 11
            && self.quantity_dispensed > Decimal::ZERO
            && self.days_supply > 0
            && self.member_id > 0
            && self.pharmacy_id > 0
    }

    pub fn total_cost(&self) -> Decimal {
        self.ingredient_cost_submitted + self.dispensing_fee_submitted
    }
}

/// Patient-pay / plan-pay / tax split for an approved claim. All zero on
/// rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct PricingBreakdown {
    pub patient_pay: Decimal,
    pub plan_pay: Decimal,
    pub tax: Decimal,
    /// 0 = no tier assigned (rejected claims); 1-5 for approved claims.
    pub tier: u8,
    pub deductible_applied: Option<Decimal>,
    pub out_of_pocket_applied: Option<Decimal>,
}

impl PricingBreakdown {
    pub const REJECTED: PricingBreakdown = PricingBreakdown {
        patient_pay: Decimal::ZERO,
        plan_pay: Decimal::ZERO,
        tax: Decimal::ZERO,
        tier: 0,
        deductible_applied: None,
        out_of_pocket_applied: None,
    };
}

/// A parsed-but-not-yet-adjudicated claim: the claim number and
/// received-timestamp assigned at ingest, plus the raw request. This is the
/// value the ingestor produces and the engine consumes; adjudication turns
/// it into a [`Claim`] by filling in the remaining fields exactly once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestedClaim {
    pub claim_number: ClaimNumber,
    pub received_timestamp: DateTime<Utc>,
    pub request: ClaimRequest,
}

/// A fully adjudicated claim, ready for persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claim {
    pub claim_number: ClaimNumber,
    pub request: ClaimRequest,
    pub received_timestamp: DateTime<Utc>,
    pub processed_timestamp: DateTime<Utc>,
    pub status: ClaimStatus,
    pub response_code: String,
    pub response_message: String,
    pub pricing: PricingBreakdown,
    pub processing_time_ms: i64,
}

impl Claim {
    /// `patient_pay + plan_pay + tax == ingredient_cost + dispensing_fee` on
    /// approval, per the persisted-record invariant.
    pub fn pricing_balances(&self) -> bool {
        match self.status {
            ClaimStatus::Rejected => {
                self.pricing.patient_pay.is_zero()
                    && self.pricing.plan_pay.is_zero()
                    && self.pricing.tax.is_zero()
            }
            ClaimStatus::Approved => {
                let total = self.pricing.patient_pay + self.pricing.plan_pay + self.pricing.tax;
                total == self.request.total_cost()
            }
        }
    }
}
