// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::OnceLock,
    time::{Duration, Instant},
};

// shared by every call site so that their deadlines are comparable
#[doc(hidden)]
pub(crate) fn secs_since_first_use() -> u64 {
    static FIRST_USE: OnceLock<Instant> = OnceLock::new();
    let first_use = *FIRST_USE.get_or_init(Instant::now);
    Instant::now().duration_since(first_use).as_secs()
}

#[doc(hidden)]
pub(crate) fn deadline_after(now_secs: u64, interval: Duration) -> u64 {
    now_secs.saturating_add(interval.as_secs())
}

/// `rate_limited!(interval, diagnostic)` evaluates `diagnostic` at most once per `interval` for each call site.
///
/// The background writer uses this for the `tracing` events it emits about its own trouble: failed writes and
/// flushes of an output, and messages dropped because the buffer was full. Those conditions tend to repeat on every
/// record of every pass, so an unlimited event per occurrence would flood whatever consumes the application's
/// diagnostics. The counters in [`WriterStats`](crate::WriterStats) still see every occurrence.
///
/// Only whole seconds are supported.
macro_rules! rate_limited {
    ($interval:expr, $diagnostic:expr) => {{
        use std::sync::atomic::{AtomicU64, Ordering};
        static ALLOWED_FROM_SECS: AtomicU64 = AtomicU64::new(0);
        let interval: std::time::Duration = $interval;
        assert!(
            interval >= std::time::Duration::from_secs(1),
            "diagnostics can only be rate limited to whole seconds"
        );

        let now = $crate::rate_limit::secs_since_first_use();
        let allowed_from = ALLOWED_FROM_SECS.load(Ordering::Relaxed);
        // of several threads racing past the deadline, only the one moving it forward emits
        if allowed_from <= now
            && ALLOWED_FROM_SECS
                .compare_exchange(
                    allowed_from,
                    $crate::rate_limit::deadline_after(now, interval),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                )
                .is_ok()
        {
            $diagnostic;
        }
    }};
}
pub(crate) use rate_limited;

#[cfg(test)]
mod tests {
    use std::{cell::Cell, time::Duration};

    use super::deadline_after;

    #[test]
    fn first_occurrence_is_reported_then_suppressed() {
        let reported = Cell::new(0u64);
        let write_failed = || rate_limited!(Duration::MAX, reported.set(reported.get() + 1));
        write_failed();
        assert_eq!(reported.get(), 1);
        for _ in 0..1000 {
            write_failed();
        }
        assert_eq!(reported.get(), 1);
    }

    #[test]
    fn each_diagnostic_has_its_own_limit() {
        let reported = Cell::new(0u64);
        rate_limited!(Duration::MAX, reported.set(reported.get() + 1));
        rate_limited!(Duration::MAX, reported.set(reported.get() + 1));
        assert_eq!(reported.get(), 2);
    }

    #[test]
    fn deadline_saturates() {
        assert_eq!(deadline_after(10, Duration::from_secs(1)), 11);
        assert_eq!(deadline_after(10, Duration::MAX), u64::MAX);
    }

    #[test]
    #[should_panic(expected = "whole seconds")]
    fn sub_second_interval_is_rejected() {
        rate_limited!(Duration::from_millis(10), ());
    }
}
