// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use datadog_tracing::{Result, SpanData};

/// Consumer of finished trace segments. The default implementation is
/// [`crate::DatadogAgent`]; tests and custom exporters substitute their
/// own.
pub trait Collector: Send + Sync {
    /// Accepts the finished spans of one trace segment. Implementations
    /// must not block the calling thread beyond a short critical section;
    /// delivery is best effort.
    fn send(&self, batch: Vec<SpanData>) -> Result<()>;
}
