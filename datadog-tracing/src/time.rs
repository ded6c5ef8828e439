// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    sync::Arc,
    time::{Duration, Instant, SystemTime},
};

/// A point in time as both a wall clock reading (for reporting epoch
/// timestamps to the agent) and a monotonic reading (for measuring
/// durations).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimePoint {
    pub wall: SystemTime,
    pub tick: Instant,
}

impl TimePoint {
    pub fn now() -> Self {
        TimePoint {
            wall: SystemTime::now(),
            tick: Instant::now(),
        }
    }

    /// Nanoseconds since the Unix epoch of the wall component. Readings
    /// before the epoch saturate to zero.
    pub fn wall_nanos(&self) -> u64 {
        self.wall
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0)
    }
}

/// Time source shared by the tracer and its trace segments. Replaceable in
/// tests with a deterministic function.
pub type Clock = Arc<dyn Fn() -> TimePoint + Send + Sync>;

pub fn default_clock() -> Clock {
    Arc::new(TimePoint::now)
}

/// A fixed-epoch clock used by tests: always returns `origin` shifted by
/// `offset`.
pub fn fixed_clock(origin: TimePoint, offset: Duration) -> Clock {
    Arc::new(move || TimePoint {
        wall: origin.wall + offset,
        tick: origin.tick + offset,
    })
}
