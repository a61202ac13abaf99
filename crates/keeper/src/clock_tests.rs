// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::time::Duration;

use super::*;

#[yare::parameterized(
    zero          = { 0, "0ms" },
    sub_second    = { 750, "750ms" },
    one_second    = { 1_000, "1s" },
    truncates_ms  = { 1_999, "1s" },
    minutes       = { 200_000, "3m 20s" },
    exact_hour    = { 3_600_000, "1h" },
    hour_and_min  = { 3_660_000, "1h 1m" },
    drops_seconds = { 3_661_000, "1h 1m" },
    days          = { 100_800_000, "1d 4h" },
)]
fn formats_duration(ms: u64, expected: &str) {
    assert_eq!(format_duration(ms), expected);
}

#[test]
fn ms_until_is_signed() {
    assert_eq!(ms_until(1_500, 1_000), 500);
    assert_eq!(ms_until(1_000, 1_500), -500);
}

#[tokio::test(start_paused = true)]
async fn system_clock_follows_virtual_time() {
    let clock = SystemClock::starting_at(1_000_000);
    assert_eq!(clock.now_ms(), 1_000_000);

    tokio::time::advance(Duration::from_millis(2_500)).await;
    assert_eq!(clock.now_ms(), 1_002_500);
}

#[test]
fn epoch_ms_is_after_2020() {
    assert!(epoch_ms() > 1_577_836_800_000);
}
