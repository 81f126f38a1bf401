//! Property-based tests for the pure pieces of both pipelines.
//!
//! - Governed loops never run past their ceiling
//! - Apportioned targets always sum to the total
//! - Query normalization is idempotent and the ledger never repeats a query
//! - Classification never fails and always yields a positive target

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use proptest::prelude::*;

    use crate::classifier::RequestClassifier;
    use crate::config::{default_outline, ResearchConfig};
    use crate::governor::{IterationGovernor, LoopKind};
    use crate::queries::QueryLedger;
    use crate::report::{apportion, ReportPlan};
    use crate::text::{count_words, normalize_query};

    fn query() -> impl Strategy<Value = String> {
        prop_oneof![
            "[a-zA-Z ]{0,20}",
            Just("AI in healthcare".to_string()),
            Just("  ai IN   healthcare ".to_string()),
        ]
    }

    proptest! {
        /// An always-insufficient verdict still stops at the ceiling.
        #[test]
        fn governor_never_exceeds_ceiling(ceiling in 0u32..20, verdicts in prop::collection::vec(any::<bool>(), 0..40)) {
            let mut governor = IterationGovernor::new(LoopKind::Research, ceiling);
            let mut iterations = 0;
            let mut verdicts = verdicts.into_iter();
            loop {
                iterations += 1;
                let sufficient = verdicts.next().unwrap_or(false);
                if governor.record_and_decide(sufficient).should_stop() {
                    break;
                }
                prop_assert!(iterations <= 40);
            }
            prop_assert!(governor.count() <= ceiling.max(1));
            prop_assert_eq!(governor.count(), iterations);
        }

        /// Section sub-loops allow at most two passes whatever is configured.
        #[test]
        fn section_ceiling_at_most_two(extra in any::<u32>()) {
            let config = ResearchConfig::default().with_section_extra_iterations(extra);
            let governor = IterationGovernor::for_section(&config);
            prop_assert!(governor.ceiling() >= 1 && governor.ceiling() <= 2);
        }

        #[test]
        fn apportion_sums_to_total(total in 0usize..200_000, weights in prop::collection::vec(1u32..100, 1..10)) {
            let shares = apportion(total, &weights);
            prop_assert_eq!(shares.len(), weights.len());
            prop_assert_eq!(shares.iter().sum::<usize>(), total);
            if total >= weights.len() {
                prop_assert!(shares.iter().all(|s| *s > 0));
            }
        }

        #[test]
        fn fallback_plan_targets_sum(target in 100usize..100_000) {
            let plan = ReportPlan::fallback("topic", target, &default_outline());
            prop_assert_eq!(plan.planned_words(), target);
            prop_assert!(plan.sections.iter().all(|s| s.target_words > 0));
        }

        #[test]
        fn normalize_is_idempotent(q in query()) {
            let once = normalize_query(&q);
            prop_assert_eq!(normalize_query(&once), once);
        }

        /// Nothing the ledger issued normalizes to the same string twice.
        #[test]
        fn ledger_never_repeats(queries in prop::collection::vec(query(), 0..30)) {
            let mut ledger = QueryLedger::new();
            for q in &queries {
                ledger.issue(q);
            }
            let normalized: HashSet<String> = ledger.issued().iter().map(|q| normalize_query(q)).collect();
            prop_assert_eq!(normalized.len(), ledger.len());
        }

        #[test]
        fn classifier_is_total(message in "\\PC{0,200}") {
            let decision = RequestClassifier::default().classify(&message);
            prop_assert!(decision.target_word_count > 0);
        }

        #[test]
        fn ascii_word_count_matches_whitespace_split(text in "[a-z ]{0,100}") {
            prop_assert_eq!(count_words(&text), text.split_whitespace().count());
        }
    }
}
