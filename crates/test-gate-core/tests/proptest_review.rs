// crates/test-gate-core/tests/proptest_review.rs
// ============================================================================
// Module: Review Record Property-Based Tests
// Description: Property tests for persisted review record shapes.
// Purpose: Detect lossy serialization across every review state.
// ============================================================================

//! Property-based tests for review record serialization.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only assertions and helpers are permitted."
)]

use proptest::prelude::*;
use test_gate_core::ArtifactId;
use test_gate_core::ReviewId;
use test_gate_core::ReviewRecord;
use test_gate_core::ReviewState;
use test_gate_core::RunId;
use test_gate_core::Timestamp;

fn state_strategy() -> impl Strategy<Value = ReviewState> {
    prop_oneof![
        Just(ReviewState::Pending),
        Just(ReviewState::Approved),
        Just(ReviewState::Rejected),
        Just(ReviewState::Expired),
    ]
}

fn timestamp_strategy() -> impl Strategy<Value = Timestamp> {
    prop_oneof![any::<u64>().prop_map(Timestamp::Logical), any::<i64>().prop_map(Timestamp::UnixMillis)]
}

fn text_strategy() -> impl Strategy<Value = String> {
    "[ -~\u{e9}\u{4e2d}\n]{0,24}"
}

prop_compose! {
    fn record_strategy()(
        state in state_strategy(),
        artifact in "art-[0-9a-f]{16}",
        attempt in 1_u32 .. 9,
        run_id in proptest::option::of("run-[0-9a-f]{16}"),
        created_at in timestamp_strategy(),
        decided_at in proptest::option::of(timestamp_strategy()),
        reviewer in proptest::option::of(text_strategy()),
        reason in proptest::option::of(text_strategy()),
        version in 1_u64 .. 1_000,
        checklist in prop::collection::vec(text_strategy(), 0 .. 4),
        verdict_reason in text_strategy(),
    ) -> ReviewRecord {
        ReviewRecord {
            review_id: ReviewId::new(format!("{artifact}-r{attempt}")),
            artifact_id: ArtifactId::new(artifact),
            run_id: run_id.map(RunId::new),
            state,
            created_at,
            decided_at,
            reviewer,
            reason,
            version,
            checklist,
            verdict_reason,
        }
    }
}

proptest! {
    #[test]
    fn review_records_round_trip_through_json(record in record_strategy()) {
        let value = serde_json::to_value(&record).unwrap();
        prop_assert_eq!(&value["state"], &serde_json::json!(record.state.as_str()));
        let restored: ReviewRecord = serde_json::from_value(value).unwrap();
        prop_assert_eq!(restored, record);
    }

    #[test]
    fn review_state_labels_parse_back(state in state_strategy()) {
        prop_assert_eq!(ReviewState::parse(state.as_str()), Some(state));
        let encoded = serde_json::to_string(&state).unwrap();
        prop_assert_eq!(encoded, format!("\"{}\"", state.as_str()));
        let decoded: ReviewState = serde_json::from_str(&format!("\"{}\"", state.as_str())).unwrap();
        prop_assert_eq!(decoded, state);
    }
}
