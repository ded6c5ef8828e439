// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling for the Datadog tracing client: rule matching, token-bucket
//! rate limiting, the whole-trace sampler, and the per-span sampler used
//! when a trace is dropped.

pub mod constants;
pub mod glob_matcher;
pub mod rate_limiter;
pub mod span_matcher;
pub mod span_sampler;
pub mod trace_sampler;

pub use glob_matcher::GlobMatcher;
pub use rate_limiter::RateLimiter;
pub use span_matcher::SpanMatcher;
pub use span_sampler::{SpanSampler, SpanSamplingDecision};
pub use trace_sampler::{TraceSampler, TraceSamplingDecision};
