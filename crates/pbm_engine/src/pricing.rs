//! Pricing calculation for an approved claim (adjudication step 8).

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use pbm_protocol::{ClaimRequest, PricingBreakdown};

fn copay_for_tier(tier: u8) -> Decimal {
    match tier {
        1 => dec!(10),
        2 => dec!(25),
        3 => dec!(50),
        4 => dec!(100),
        5 => dec!(150),
        _ => unreachable!("tier must be 1-5 when pricing an approved claim"),
    }
}

/// Price an approved claim for the given tier. `tax` is always zero in the
/// simulator.
pub fn price(request: &ClaimRequest, tier: u8) -> PricingBreakdown {
    let total_cost = request.total_cost();
    let (patient_pay, plan_pay) = if tier <= 3 {
        // Copay is capped at total cost: a flat $10 copay on a $5 fill
        // cannot leave plan_pay negative, and patient_pay + plan_pay must
        // reconstruct total_cost exactly (invariant 2).
        let patient_pay = copay_for_tier(tier).min(total_cost);
        let plan_pay = total_cost - patient_pay;
        (patient_pay, plan_pay)
    } else {
        let patient_pay = (total_cost * dec!(0.30)).round_dp(2);
        let plan_pay = total_cost - patient_pay;
        (patient_pay, plan_pay)
    };

    PricingBreakdown {
        patient_pay,
        plan_pay,
        tax: Decimal::ZERO,
        tier,
        deductible_applied: None,
        out_of_pocket_applied: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request_with_cost(ingredient: Decimal, fee: Decimal) -> ClaimRequest {
        ClaimRequest {
            member_id: 1,
            pharmacy_id: 1,
            ndc: "12345678901".to_string(),
            quantity_dispensed: dec!(30),
            days_supply: 30,
            refill_number: 0,
            date_of_service: NaiveDate::from_ymd_opt(2024, 6, 15).unwrap(),
            ingredient_cost_submitted: ingredient,
            dispensing_fee_submitted: fee,
            daw_code: None,
            prescriber_npi: None,
            transaction_type: pbm_protocol::TransactionType::B1,
        }
    }

    #[test]
    fn tier_one_uses_fixed_copay() {
        let request = request_with_cost(dec!(45.99), dec!(2.50));
        let pricing = price(&request, 1);
        assert_eq!(pricing.patient_pay, dec!(10.00));
        assert_eq!(pricing.plan_pay, dec!(38.49));
    }

    #[test]
    fn tier_four_uses_coinsurance() {
        let request = request_with_cost(dec!(500.00), dec!(2.50));
        let pricing = price(&request, 4);
        assert_eq!(pricing.patient_pay, dec!(150.75));
        assert_eq!(pricing.plan_pay, dec!(351.75));
    }

    #[test]
    fn copay_never_pushes_plan_pay_negative() {
        // A copay larger than total cost must cap at total cost, not
        // push plan_pay negative.
        let request = request_with_cost(dec!(5.00), dec!(0.00));
        let pricing = price(&request, 3);
        assert_eq!(pricing.patient_pay, dec!(5.00));
        assert_eq!(pricing.plan_pay, Decimal::ZERO);
    }

    proptest::proptest! {
        /// Invariant 2 from the testable-properties list, checked across the
        /// full cost/tier space rather than a handful of fixed points:
        /// patient_pay + plan_pay + tax always reconstructs total_cost, and
        /// neither pay amount ever goes negative.
        #[test]
        fn pricing_balances_for_any_cost_and_tier(
            ingredient in 0i64..100_000,
            fee in 0i64..5_000,
            tier in 1u8..=5,
        ) {
            let request = request_with_cost(
                Decimal::new(ingredient, 2),
                Decimal::new(fee, 2),
            );
            let pricing = price(&request, tier);
            let total = pricing.patient_pay + pricing.plan_pay + pricing.tax;
            prop_assert_eq!(total, request.total_cost());
            prop_assert!(pricing.patient_pay >= Decimal::ZERO);
            prop_assert!(pricing.plan_pay >= Decimal::ZERO);
        }
    }
}
