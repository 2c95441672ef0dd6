// Copyright 2025 Kore Ledger, SL
// SPDX-License-Identifier: Apache-2.0

//! Wall clock used to schedule messages.

use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds elapsed since the UNIX epoch.
///
/// Message delivery times are absolute values on this clock. A clock set
/// before the epoch reads as `0`.
pub fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or(0)
}
