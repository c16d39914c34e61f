//! The eight-step adjudication state machine.

use std::thread;
use std::time::Duration;

use rand::RngCore;

use pbm_protocol::ClaimRequest;

use crate::EngineConfig;

/// NCPDP-flavored rejection/response code. `Approved` carries no code here;
/// the caller assigns `"0"` on approval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionCode {
    /// Missing/Invalid Request Data
    M0,
    /// Patient Not Covered
    Code85,
    /// Pharmacy Not In Network / Prior Authorization Required (NCPDP 75 is
    /// reused for both per the spec's response-code table).
    Code75,
    /// Product Not Covered
    Code70,
    /// DUR Reject
    Code88,
    /// Plan Limitations Exceeded
    Code76,
}

impl RejectionCode {
    pub fn as_str(self) -> &'static str {
        match self {
            RejectionCode::M0 => "M0",
            RejectionCode::Code85 => "85",
            RejectionCode::Code75 => "75",
            RejectionCode::Code70 => "70",
            RejectionCode::Code88 => "88",
            RejectionCode::Code76 => "76",
        }
    }
}

pub enum Outcome {
    Rejected { code: RejectionCode, message: String },
    Approved { tier: u8 },
}

/// Failure probabilities, named after the step they gate. Their joint
/// effect on the conditional rejection-reason mix is documented in
/// `SPEC_FULL.md` §4.2 and verified (approximately) by
/// `super::tests::approval_rate_and_tier_mix_approximate_targets`.
const P_ELIGIBILITY_FAIL: f64 = 0.05;
const P_NETWORK_FAIL: f64 = 0.05;
const P_FORMULARY_FAIL: f64 = 0.03;
const P_DUR_FAIL: f64 = 0.02;
const P_PRIOR_AUTH_FAIL: f64 = 0.02;
const P_QUANTITY_SOFT_FAIL: f64 = 0.01;

const TIER_WEIGHTS: [(u8, f64); 5] = [(1, 0.60), (2, 0.20), (3, 0.10), (4, 0.07), (5, 0.03)];

/// Deterministic uniform sample in `[0, 1)` derived from one `next_u64`
/// draw. Kept as a free function (rather than going through
/// `rand::Rng::gen::<f64>()`) so the exact mapping from RNG output to
/// decision is simple enough to unit test with a scripted RNG.
fn unit_sample(rng: &mut impl RngCore) -> f64 {
    (rng.next_u64() as f64) / (u64::MAX as f64)
}

pub fn run_pipeline(request: &ClaimRequest, rng: &mut impl RngCore, config: EngineConfig) -> Outcome {
    // Step 1: validate
    if !request.is_valid() {
        return Outcome::Rejected {
            code: RejectionCode::M0,
            message: "Missing/Invalid Request Data".to_string(),
        };
    }
    maybe_delay(config, 50, 100);

    // Step 2: eligibility
    if unit_sample(rng) < P_ELIGIBILITY_FAIL {
        return Outcome::Rejected {
            code: RejectionCode::Code85,
            message: "Patient Not Covered".to_string(),
        };
    }
    maybe_delay(config, 100, 200);

    // Step 3: pharmacy network
    if unit_sample(rng) < P_NETWORK_FAIL {
        return Outcome::Rejected {
            code: RejectionCode::Code75,
            message: "Pharmacy Not In Network".to_string(),
        };
    }

    // Step 4: formulary coverage
    if unit_sample(rng) < P_FORMULARY_FAIL {
        return Outcome::Rejected {
            code: RejectionCode::Code70,
            message: "Product Not Covered".to_string(),
        };
    }
    maybe_delay(config, 50, 150);

    // Step 5: clinical edits (DUR)
    if unit_sample(rng) < P_DUR_FAIL {
        return Outcome::Rejected {
            code: RejectionCode::Code88,
            message: "DUR Reject".to_string(),
        };
    }
    maybe_delay(config, 200, 500);

    // Step 6: prior authorization
    if unit_sample(rng) < P_PRIOR_AUTH_FAIL {
        return Outcome::Rejected {
            code: RejectionCode::Code75,
            message: "Prior Authorization Required".to_string(),
        };
    }

    // Step 7: quantity limits
    let quantity_limit_exceeded = request.quantity_dispensed > rust_decimal::Decimal::from(360)
        || request.days_supply > 100
        || request.days_supply <= 0;
    if quantity_limit_exceeded {
        return Outcome::Rejected {
            code: RejectionCode::Code76,
            message: "Plan Limitations Exceeded".to_string(),
        };
    }
    if unit_sample(rng) < P_QUANTITY_SOFT_FAIL {
        return Outcome::Rejected {
            code: RejectionCode::Code76,
            message: "Plan Limitations Exceeded".to_string(),
        };
    }

    // Step 8: pricing (tier draw happens here, pricing math lives in
    // `crate::pricing`)
    maybe_delay(config, 100, 200);
    let tier = draw_tier(rng);
    Outcome::Approved { tier }
}

fn draw_tier(rng: &mut impl RngCore) -> u8 {
    let r = unit_sample(rng);
    let mut cumulative = 0.0;
    for (tier, weight) in TIER_WEIGHTS {
        cumulative += weight;
        if r < cumulative {
            return tier;
        }
    }
    // Floating point rounding may leave r just at 1.0; fall back to the
    // highest tier rather than panicking.
    5
}

fn maybe_delay(config: EngineConfig, min_ms: u64, max_ms: u64) {
    if !config.fidelity_delays {
        return;
    }
    let span = max_ms.saturating_sub(min_ms).max(1);
    // Deterministic midpoint delay; fidelity mode is for human-observable
    // latency realism, not a distributional property under test.
    thread::sleep(Duration::from_millis(min_ms + span / 2));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_draw_respects_cumulative_boundaries() {
        struct Fixed(u64);
        impl RngCore for Fixed {
            fn next_u32(&mut self) -> u32 {
                self.0 as u32
            }
            fn next_u64(&mut self) -> u64 {
                self.0
            }
            fn fill_bytes(&mut self, dest: &mut [u8]) {
                dest.fill(0);
            }
            fn try_fill_bytes(&mut self, dest: &mut [u8]) -> Result<(), rand::Error> {
                self.fill_bytes(dest);
                Ok(())
            }
        }

        let frac = |f: f64| (f * u64::MAX as f64) as u64;
        assert_eq!(draw_tier(&mut Fixed(frac(0.10))), 1);
        assert_eq!(draw_tier(&mut Fixed(frac(0.70))), 2);
        assert_eq!(draw_tier(&mut Fixed(frac(0.85))), 3);
        assert_eq!(draw_tier(&mut Fixed(frac(0.95))), 4);
        assert_eq!(draw_tier(&mut Fixed(frac(0.99))), 5);
    }
}
