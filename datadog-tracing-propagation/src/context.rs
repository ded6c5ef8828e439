// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use datadog_tracing::sampling::{SamplingMechanism, SamplingPriority};

/// The sampling part of a propagated context. Either or both parts may be
/// absent when the upstream service made no decision.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct Sampling {
    pub priority: Option<SamplingPriority>,
    pub mechanism: Option<SamplingMechanism>,
}

/// Trace context as carried across process boundaries.
///
/// On extraction, `span_id` is the id of the upstream span, which becomes
/// the parent of the local root. On injection, `span_id` is the id of the
/// injecting span.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct SpanContext {
    pub trace_id: u64,
    pub span_id: u64,
    pub sampling: Sampling,
    pub origin: Option<String>,
    /// Propagated trace tags (the `_dd.p.` subset), plus a
    /// `_dd.propagation_error` entry when decoding failed.
    pub tags: HashMap<String, String>,
}
