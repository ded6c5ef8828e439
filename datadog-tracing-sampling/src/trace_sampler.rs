// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;

use datadog_tracing::{
    configuration::TraceSamplingRuleConfig,
    sampling::{mechanism, priority, SamplingMechanism, SamplingPriority},
    SpanData,
};

use crate::{
    constants::numeric::{KNUTH_FACTOR, MAX_UINT_64BITS},
    rate_limiter::RateLimiter,
    span_matcher::SpanMatcher,
};

/// Deterministic keep-test shared across Datadog tracers: keep iff
/// `id * KNUTH_FACTOR (mod 2⁶⁴) < rate * 2⁶⁴`.
pub(crate) fn knuth_keep(id: u64, rate: f64) -> bool {
    if rate >= 1.0 {
        return true;
    }
    if rate <= 0.0 {
        return false;
    }
    let threshold = (rate * MAX_UINT_64BITS as f64) as u64;
    id.wrapping_mul(KNUTH_FACTOR) < threshold
}

struct TraceRule {
    matcher: SpanMatcher,
    sample_rate: f64,
}

/// The outcome of a whole-trace sampling decision, together with the sample
/// rates that the trace segment reports as tags on the local root span.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TraceSamplingDecision {
    pub priority: SamplingPriority,
    pub mechanism: SamplingMechanism,
    /// Set when a rule made the decision (`_dd.rule.psr`).
    pub rule_rate: Option<f64>,
    /// Set when a rule made the decision (`_dd.limit_psr`).
    pub limiter_rate: Option<f64>,
    /// Set when the agent table or the default made the decision
    /// (`_dd.agent_psr`).
    pub agent_rate: Option<f64>,
}

/// Decides keep/drop for whole traces: first-matching user rule, then the
/// agent-supplied per-service rate table, then a catch-all default.
///
/// The rate table is replaced wholesale by the uploader when the agent
/// responds; readers are lock-free.
pub struct TraceSampler {
    rules: Vec<TraceRule>,
    limiter: RateLimiter,
    agent_rates: ArcSwap<HashMap<String, f64>>,
}

const DEFAULT_RATE_KEY: &str = "service:,env:";

fn service_key(service: &str, env: &str) -> String {
    format!("service:{service},env:{env}")
}

impl TraceSampler {
    pub fn new(rules: &[TraceSamplingRuleConfig], rate_limit_per_second: f64) -> Self {
        TraceSampler {
            rules: rules
                .iter()
                .map(|rule| TraceRule {
                    matcher: SpanMatcher::from_trace_rule(rule),
                    sample_rate: rule.sample_rate,
                })
                .collect(),
            limiter: RateLimiter::new(rate_limit_per_second),
            agent_rates: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Replaces the agent rate table with `rates`, as parsed from the
    /// agent's `rate_by_service` response field.
    pub fn update_agent_rates(&self, rates: HashMap<String, f64>) {
        self.agent_rates.store(Arc::new(rates));
    }

    /// Decides keep/drop for the trace whose local root is `root`.
    pub fn decide(&self, root: &SpanData) -> TraceSamplingDecision {
        if let Some(rule) = self.rules.iter().find(|rule| rule.matcher.matches(root)) {
            let mut keep = knuth_keep(root.trace_id, rule.sample_rate);
            let mut limiter_rate = None;
            if keep {
                keep = self.limiter.allow();
                limiter_rate = Some(self.limiter.effective_rate());
            }
            return TraceSamplingDecision {
                priority: if keep {
                    priority::USER_KEEP
                } else {
                    priority::AUTO_REJECT
                },
                mechanism: mechanism::LOCAL_USER_TRACE_SAMPLING_RULE,
                rule_rate: Some(rule.sample_rate),
                limiter_rate,
                agent_rate: None,
            };
        }

        let rates = self.agent_rates.load();
        let key = service_key(&root.service, root.environment().unwrap_or(""));
        if let Some(&rate) = rates.get(&key) {
            return TraceSamplingDecision {
                priority: if knuth_keep(root.trace_id, rate) {
                    priority::AUTO_KEEP
                } else {
                    priority::AUTO_REJECT
                },
                mechanism: mechanism::AGENT_RATE_BY_SERVICE,
                rule_rate: None,
                limiter_rate: None,
                agent_rate: Some(rate),
            };
        }

        let rate = rates.get(DEFAULT_RATE_KEY).copied().unwrap_or(1.0);
        TraceSamplingDecision {
            priority: if knuth_keep(root.trace_id, rate) {
                priority::AUTO_KEEP
            } else {
                priority::AUTO_REJECT
            },
            mechanism: mechanism::DEFAULT,
            rule_rate: None,
            limiter_rate: None,
            agent_rate: Some(rate),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn root(service: &str, name: &str, trace_id: u64) -> SpanData {
        let mut span = SpanData::with_ids(trace_id, 1, 0);
        span.service = service.to_string();
        span.name = name.to_string();
        span.resource = name.to_string();
        span
    }

    fn rule(service: &str, name: &str, sample_rate: f64) -> TraceSamplingRuleConfig {
        TraceSamplingRuleConfig {
            service: Some(service.to_string()),
            name: Some(name.to_string()),
            sample_rate,
            ..Default::default()
        }
    }

    #[test]
    fn test_default_keeps_everything() {
        let sampler = TraceSampler::new(&[], 100.0);
        let decision = sampler.decide(&root("testsvc", "op", 12345));
        assert_eq!(decision.priority, priority::AUTO_KEEP);
        assert_eq!(decision.mechanism, mechanism::DEFAULT);
        assert_eq!(decision.agent_rate, Some(1.0));
        assert_eq!(decision.rule_rate, None);
    }

    #[test]
    fn test_rule_drop() {
        let sampler = TraceSampler::new(&[rule("poohbear", "get.honey", 0.0)], 100.0);
        let decision = sampler.decide(&root("poohbear", "get.honey", 7));
        assert_eq!(decision.priority, priority::AUTO_REJECT);
        assert_eq!(decision.mechanism, mechanism::LOCAL_USER_TRACE_SAMPLING_RULE);
        assert_eq!(decision.rule_rate, Some(0.0));
        assert_eq!(decision.limiter_rate, None);
    }

    #[test]
    fn test_rule_keep_records_limiter_rate() {
        let sampler = TraceSampler::new(&[rule("web", "*", 1.0)], 100.0);
        let decision = sampler.decide(&root("web", "op", 42));
        assert_eq!(decision.priority, priority::USER_KEEP);
        assert_eq!(decision.rule_rate, Some(1.0));
        assert_eq!(decision.limiter_rate, Some(1.0));
    }

    #[test]
    fn test_first_matching_rule_wins() {
        let sampler = TraceSampler::new(
            &[rule("web", "*", 0.0), rule("web", "op", 1.0)],
            100.0,
        );
        let decision = sampler.decide(&root("web", "op", 42));
        assert_eq!(decision.rule_rate, Some(0.0));
    }

    #[test]
    fn test_unmatched_rule_falls_through() {
        let sampler = TraceSampler::new(&[rule("other", "*", 0.0)], 100.0);
        let decision = sampler.decide(&root("web", "op", 42));
        assert_eq!(decision.mechanism, mechanism::DEFAULT);
        assert_eq!(decision.priority, priority::AUTO_KEEP);
    }

    #[test]
    fn test_agent_rate_table() {
        let sampler = TraceSampler::new(&[], 100.0);
        sampler.update_agent_rates(HashMap::from([
            ("service:web,env:prod".to_string(), 0.0),
            ("service:,env:".to_string(), 1.0),
        ]));

        let mut span = root("web", "op", 99);
        span.tags
            .insert("env".to_string(), "prod".to_string());
        let decision = sampler.decide(&span);
        assert_eq!(decision.priority, priority::AUTO_REJECT);
        assert_eq!(decision.mechanism, mechanism::AGENT_RATE_BY_SERVICE);
        assert_eq!(decision.agent_rate, Some(0.0));

        // A service absent from the table uses the default entry.
        let decision = sampler.decide(&root("db", "op", 99));
        assert_eq!(decision.mechanism, mechanism::DEFAULT);
        assert_eq!(decision.agent_rate, Some(1.0));
    }

    #[test]
    fn test_decisions_are_deterministic_per_trace_id() {
        let sampler_a = TraceSampler::new(&[rule("web", "*", 0.5)], 1e9);
        let sampler_b = TraceSampler::new(&[rule("web", "*", 0.5)], 1e9);
        for trace_id in [1u64, 17, 12345, u64::MAX / 3, u64::MAX] {
            let a = sampler_a.decide(&root("web", "op", trace_id));
            let b = sampler_b.decide(&root("web", "op", trace_id));
            assert_eq!(a.priority, b.priority, "disagreed on {trace_id}");
        }
    }

    #[test]
    fn test_knuth_keep_boundaries() {
        assert!(knuth_keep(u64::MAX, 1.0));
        assert!(!knuth_keep(0, 0.0));
        // Id zero hashes to zero, which is below any positive threshold.
        assert!(knuth_keep(0, 0.001));
    }

    #[test]
    fn test_rule_keep_is_limited() {
        let sampler = TraceSampler::new(&[rule("web", "*", 1.0)], 2.0);
        let mut kept = 0;
        for trace_id in 1..=10u64 {
            let decision = sampler.decide(&root("web", "op", trace_id));
            if decision.priority.is_keep() {
                kept += 1;
            }
        }
        assert_eq!(kept, 2);
    }
}
