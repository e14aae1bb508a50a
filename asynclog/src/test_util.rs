// Copyright Amazon.com, Inc. or its affiliates. All Rights Reserved.
// SPDX-License-Identifier: Apache-2.0

//! Helpers for testing code that logs through an [`AsyncLogWriter`](crate::AsyncLogWriter).
//!
//! This requires that the `test-util` feature be enabled.

use std::{
    thread,
    time::{Duration, Instant},
};

pub use asynclog_core::test_output::{RecordedLine, RecordingOutput};

/// Poll `condition` until it holds or `timeout` passes. Returns the last result.
///
/// Records are written by a background thread, so tests observe them eventually rather than right after logging.
pub fn wait_for(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
