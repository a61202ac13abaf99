// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[yare::parameterized(
    future      = { 500, 500 },
    at_floor    = { 100, 100 },
    below_floor = { 20, 100 },
    now         = { 0, 100 },
    past        = { -60_000, 100 },
    hour        = { 3_600_000, 3_600_000 },
)]
fn delay_is_floored(access_expires_in: i64, expected_ms: u64) {
    let policy = RefreshPolicy::default();
    assert_eq!(policy.delay_for(access_expires_in), Duration::from_millis(expected_ms));
}

#[yare::parameterized(
    expired      = { -1, true },
    half_second  = { 500, true },
    just_under   = { 999, true },
    at_mark      = { 1000, false },
    ten_seconds  = { 10_000, false },
)]
fn lapse_threshold(refresh_expires_in: i64, lapses: bool) {
    assert_eq!(RefreshPolicy::default().should_lapse(refresh_expires_in), lapses);
}

proptest::proptest! {
    #[test]
    fn delay_never_below_floor(ms in proptest::num::i64::ANY, floor in 1u64..10_000) {
        let policy = RefreshPolicy {
            min_delay: Duration::from_millis(floor),
            ..RefreshPolicy::default()
        };
        proptest::prop_assert!(policy.delay_for(ms) >= policy.min_delay);
    }
}
