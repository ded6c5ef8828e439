// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use datadog_tracing::{configuration::SpanSamplingRuleConfig, SpanData};

use crate::{rate_limiter::RateLimiter, span_matcher::SpanMatcher, trace_sampler::knuth_keep};

struct SpanRule {
    matcher: SpanMatcher,
    sample_rate: f64,
    max_per_second: Option<f64>,
    limiter: Option<RateLimiter>,
}

/// A kept span's sampling parameters, reported as the
/// `_dd.span_sampling.*` numeric tags.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpanSamplingDecision {
    pub rule_rate: f64,
    pub max_per_second: Option<f64>,
}

/// Decides, independently per span, whether a span of a dropped trace is
/// kept anyway. The first matching rule applies; an unmatched span is
/// dropped.
pub struct SpanSampler {
    rules: Vec<SpanRule>,
}

impl SpanSampler {
    pub fn new(rules: &[SpanSamplingRuleConfig]) -> Self {
        SpanSampler {
            rules: rules
                .iter()
                .map(|rule| SpanRule {
                    matcher: SpanMatcher::from_span_rule(rule),
                    sample_rate: rule.sample_rate,
                    max_per_second: rule.max_per_second,
                    // A rule without `max_per_second` is unlimited.
                    limiter: rule.max_per_second.map(RateLimiter::new),
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Returns the sampling parameters when `span` is kept, `None` when it
    /// is dropped.
    pub fn decide(&self, span: &SpanData) -> Option<SpanSamplingDecision> {
        let rule = self.rules.iter().find(|rule| rule.matcher.matches(span))?;
        if !knuth_keep(span.span_id, rule.sample_rate) {
            return None;
        }
        if let Some(ref limiter) = rule.limiter {
            if !limiter.allow() {
                return None;
            }
        }
        Some(SpanSamplingDecision {
            rule_rate: rule.sample_rate,
            max_per_second: rule.max_per_second,
        })
    }
}
