//! Property-based tests for domain value objects
//!
//! These tests use proptest to verify invariants across many random inputs.

use domain::value_objects::{
    ComparisonOperator, Filter, FilterTerm, Percentage, Rate, RateUnit, TimeSpan, TimeUnit,
};
use domain::LoopRange;
use proptest::prelude::*;

fn time_unit() -> impl Strategy<Value = TimeUnit> {
    prop_oneof![
        Just(TimeUnit::Milliseconds),
        Just(TimeUnit::Seconds),
        Just(TimeUnit::Minutes)
    ]
}

fn rate_unit() -> impl Strategy<Value = RateUnit> {
    prop_oneof![Just(RateUnit::Kbps), Just(RateUnit::Mbps), Just(RateUnit::Gbps)]
}

// ============================================================================
// TimeSpan Property Tests
// ============================================================================

mod time_span_tests {
    use super::*;

    proptest! {
        #[test]
        fn positive_spans_are_valid(magnitude in 0.001f64..100_000.0, unit in time_unit()) {
            prop_assert!(TimeSpan::new(magnitude, unit).is_ok());
        }

        #[test]
        fn millis_follow_conversion_table(magnitude in 0.0f64..10_000.0, unit in time_unit()) {
            let span = TimeSpan::from_literal(magnitude, unit);
            let expected = magnitude * unit.millis_per_unit();
            prop_assert!((span.as_millis() - expected).abs() < 1e-9);
        }

        #[test]
        fn std_duration_matches_millis(millis in 1u64..10_000_000) {
            let span = TimeSpan::from_millis(millis);
            prop_assert_eq!(span.to_duration().map(|d| d.as_millis()), Some(u128::from(millis)));
        }
    }
}

// ============================================================================
// Percentage Property Tests
// ============================================================================

mod percentage_tests {
    use super::*;

    proptest! {
        #[test]
        fn in_range_is_valid(value in 0.0f64..=100.0) {
            prop_assert!(Percentage::new(value).is_ok());
        }

        #[test]
        fn out_of_range_is_invalid(value in prop_oneof![(-1000.0f64..-0.001), (100.001f64..1000.0)]) {
            prop_assert!(Percentage::new(value).is_err());
        }
    }
}

// ============================================================================
// Rate Property Tests
// ============================================================================

mod rate_tests {
    use super::*;

    proptest! {
        #[test]
        fn kbps_is_monotonic_in_unit(magnitude in 0.001f64..10_000.0) {
            let kbps = Rate::from_literal(magnitude, RateUnit::Kbps).as_kbps();
            let mbps = Rate::from_literal(magnitude, RateUnit::Mbps).as_kbps();
            let gbps = Rate::from_literal(magnitude, RateUnit::Gbps).as_kbps();
            prop_assert!(kbps < mbps && mbps < gbps);
        }

        #[test]
        fn positive_rates_are_valid(magnitude in 0.001f64..10_000.0, unit in rate_unit()) {
            prop_assert!(Rate::new(magnitude, unit).is_ok());
        }
    }
}

// ============================================================================
// Comparison, Filter and Loop Property Tests
// ============================================================================

mod misc_tests {
    use super::*;

    proptest! {
        #[test]
        fn strict_operators_are_mutually_exclusive(lhs in -1e9f64..1e9, rhs in -1e9f64..1e9) {
            let gt = ComparisonOperator::GreaterThan.evaluate(lhs, rhs);
            let le = ComparisonOperator::LessOrEqual.evaluate(lhs, rhs);
            prop_assert_ne!(gt, le);
        }

        #[test]
        fn equal_and_not_equal_disagree(lhs in -1e6f64..1e6, rhs in -1e6f64..1e6) {
            prop_assert_ne!(
                ComparisonOperator::Equal.evaluate(lhs, rhs),
                ComparisonOperator::NotEqual.evaluate(lhs, rhs)
            );
        }

        #[test]
        fn filter_with_distinct_keys_has_no_duplicates(keys in prop::collection::hash_set("[a-z]{1,6}", 1..6)) {
            let terms = keys.into_iter().map(|k| FilterTerm::new(k, "v")).collect();
            let filter = Filter::new(terms).unwrap();
            prop_assert!(filter.duplicate_keys().is_empty());
        }

        #[test]
        fn loop_iterations_match_values(start in -50i64..50, end in -50i64..50) {
            let range = LoopRange::new(start, end);
            prop_assert_eq!(range.iterations(), range.values().count() as u64);
        }
    }
}
