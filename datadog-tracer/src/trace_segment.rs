// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The per-process portion of a trace. All live spans of one trace in this
//! process share a `TraceSegment`; the segment tracks how many are still
//! open, finalizes the sampling decision, enriches the local root span, and
//! submits the finished batch to the collector when the last span closes.

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use datadog_tracing::{
    configuration::SpanDefaults,
    constants,
    dd_error,
    sampling::{mechanism, DecisionOrigin, SamplingDecision, SamplingPriority},
    SpanData,
};
use datadog_tracing_propagation::{
    carrier::Injector,
    context::{Sampling, SpanContext},
};

use crate::tracer::TracerShared;

pub(crate) type SpanSlot = Arc<Mutex<SpanData>>;

struct SegmentState {
    /// Every span slot of this segment, the local root first. A slot stays
    /// here after its span closes; submission drains the lot.
    spans: Vec<SpanSlot>,
    /// Live spans. The segment submits exactly once, when this returns to
    /// zero.
    open_count: usize,
    submitted: bool,
    sampling_decision: Option<SamplingDecision>,
    /// Numeric sample-rate tags pending for the local root
    /// (`_dd.rule.psr`, `_dd.limit_psr`, `_dd.agent_psr`).
    rate_tags: Vec<(&'static str, f64)>,
    /// Propagated trace tags, the `_dd.p.` subset.
    trace_tags: HashMap<String, String>,
    /// A deferred `_dd.propagation_error` value for the local root.
    propagation_error: Option<String>,
}

pub struct TraceSegment {
    shared: Arc<TracerShared>,
    trace_id: u64,
    origin: Option<String>,
    hostname: Option<String>,
    state: Mutex<SegmentState>,
}

impl TraceSegment {
    /// Creates a segment around `root`, which has its ids already assigned.
    /// `extracted` carries the sampling decision, origin, and trace tags of
    /// an upstream context, when there is one.
    pub(crate) fn new(
        shared: Arc<TracerShared>,
        root: SpanData,
        extracted: Option<&SpanContext>,
        extra_trace_tags: HashMap<String, String>,
    ) -> Arc<TraceSegment> {
        let trace_id = root.trace_id;

        let mut trace_tags = extra_trace_tags;
        let mut propagation_error = None;
        let mut sampling_decision = None;
        let mut origin = None;
        if let Some(context) = extracted {
            origin = context.origin.clone();
            for (key, value) in &context.tags {
                if key.starts_with(constants::PROPAGATION_TAG_PREFIX) {
                    trace_tags.insert(key.clone(), value.clone());
                } else if key == constants::PROPAGATION_ERROR_TAG {
                    propagation_error = Some(value.clone());
                }
            }
            sampling_decision = context.sampling.priority.map(|priority| SamplingDecision {
                priority,
                mechanism: context
                    .tags
                    .get(constants::SAMPLING_DECISION_MAKER_TAG)
                    .and_then(|dm| dm.parse().ok()),
                origin: DecisionOrigin::Extracted,
            });
        }

        let hostname = if shared.config.report_hostname() {
            shared.hostname.clone()
        } else {
            None
        };

        Arc::new(TraceSegment {
            shared,
            trace_id,
            origin,
            hostname,
            state: Mutex::new(SegmentState {
                spans: vec![Arc::new(Mutex::new(root))],
                open_count: 1,
                submitted: false,
                sampling_decision,
                rate_tags: Vec::new(),
                trace_tags,
                propagation_error,
            }),
        })
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn origin(&self) -> Option<&str> {
        self.origin.as_deref()
    }

    pub fn hostname(&self) -> Option<&str> {
        self.hostname.as_deref()
    }

    pub fn defaults(&self) -> &SpanDefaults {
        self.shared.config.defaults()
    }

    pub fn sampling_decision(&self) -> Option<SamplingDecision> {
        self.state.lock().unwrap().sampling_decision
    }

    /// Replaces the sampling decision with an operator-initiated one
    /// (mechanism MANUAL, origin local). Allowed any time before
    /// submission; conflicting rule/agent rate tags are cleared. A priority
    /// already sent in an earlier injection is not retracted.
    pub fn override_sampling_priority(&self, priority: i8) {
        let mut state = self.state.lock().unwrap();
        if state.submitted {
            return;
        }
        let priority = SamplingPriority::from_i8(priority);
        state.sampling_decision = Some(SamplingDecision {
            priority,
            mechanism: Some(mechanism::MANUAL),
            origin: DecisionOrigin::Local,
        });
        state.rate_tags.clear();
        if priority.is_keep() {
            state.trace_tags.insert(
                constants::SAMPLING_DECISION_MAKER_TAG.to_string(),
                mechanism::MANUAL.to_cow().into_owned(),
            );
        } else {
            state
                .trace_tags
                .remove(constants::SAMPLING_DECISION_MAKER_TAG);
        }
    }

    pub(crate) fn shared(&self) -> &Arc<TracerShared> {
        &self.shared
    }

    pub(crate) fn root_slot(&self) -> SpanSlot {
        self.state.lock().unwrap().spans[0].clone()
    }

    /// Adds a slot for a new child span. The caller holds a live span of
    /// this segment, so the segment cannot be submitting concurrently.
    pub(crate) fn register_span(&self, data: SpanData) -> SpanSlot {
        let slot = Arc::new(Mutex::new(data));
        let mut state = self.state.lock().unwrap();
        debug_assert!(state.open_count > 0, "child created after submission");
        state.spans.push(slot.clone());
        state.open_count += 1;
        slot
    }

    /// Called by a span as it finishes. The decrement to zero and the
    /// batch preparation form one critical region; the collector call
    /// happens after the lock is released.
    pub(crate) fn close_span(&self) {
        let batch = {
            let mut state = self.state.lock().unwrap();
            state.open_count -= 1;
            if state.open_count != 0 || state.submitted {
                return;
            }
            state.submitted = true;
            self.prepare_batch(&mut state)
        };

        if batch.is_empty() || !self.shared.config.enabled() {
            return;
        }
        if let Err(e) = self.shared.collector.send(batch) {
            dd_error!("failed to send trace {}: {}", self.trace_id, e);
        }
    }

    /// Writes this segment's context into `carrier` on behalf of the span
    /// with `span_id`. Forces a sampling decision if none has been made.
    pub(crate) fn inject(&self, span_id: u64, carrier: &mut dyn Injector) {
        let context = {
            let mut state = self.state.lock().unwrap();
            self.make_sampling_decision_if_none(&mut state);
            SpanContext {
                trace_id: self.trace_id,
                span_id,
                sampling: Sampling {
                    priority: state.sampling_decision.map(|decision| decision.priority),
                    mechanism: state.sampling_decision.and_then(|decision| decision.mechanism),
                },
                origin: self.origin.clone(),
                tags: state.trace_tags.clone(),
            }
        };

        if let Err(e) = self.shared.propagator.inject(&context, carrier) {
            let code = if e.code == datadog_tracing::ErrorCode::TagsInjectMaxSize {
                "inject_max_size"
            } else {
                "inject_failed"
            };
            let mut state = self.state.lock().unwrap();
            state.propagation_error = Some(code.to_string());
        }
    }

    fn make_sampling_decision_if_none(&self, state: &mut SegmentState) {
        if state.sampling_decision.is_some() {
            return;
        }
        let decision = {
            let root = state.spans[0].lock().unwrap();
            self.shared.trace_sampler.decide(&root)
        };
        if let Some(rate) = decision.rule_rate {
            state.rate_tags.push((constants::SAMPLING_RULE_RATE_TAG, rate));
        }
        if let Some(rate) = decision.limiter_rate {
            state
                .rate_tags
                .push((constants::SAMPLING_LIMITER_RATE_TAG, rate));
        }
        if let Some(rate) = decision.agent_rate {
            state
                .rate_tags
                .push((constants::SAMPLING_AGENT_RATE_TAG, rate));
        }
        if decision.priority.is_keep() {
            // First local keep decision: record the decision maker for
            // downstream services.
            state
                .trace_tags
                .entry(constants::SAMPLING_DECISION_MAKER_TAG.to_string())
                .or_insert_with(|| decision.mechanism.to_cow().into_owned());
        }
        state.sampling_decision = Some(SamplingDecision {
            priority: decision.priority,
            mechanism: Some(decision.mechanism),
            origin: DecisionOrigin::Local,
        });
    }

    /// Finalizes sampling, enriches the local root, and returns the spans
    /// to submit. Runs under the segment lock, exactly once.
    fn prepare_batch(&self, state: &mut SegmentState) -> Vec<SpanData> {
        self.make_sampling_decision_if_none(state);
        let decision = state
            .sampling_decision
            .expect("a sampling decision exists at submission");

        {
            let mut root = state.spans[0].lock().unwrap();
            root.numeric_tags.insert(
                constants::SAMPLING_PRIORITY_TAG.to_string(),
                f64::from(decision.priority.into_i8()),
            );
            for (key, rate) in &state.rate_tags {
                root.numeric_tags.insert((*key).to_string(), *rate);
            }
            if let Some(ref hostname) = self.hostname {
                root.tags
                    .insert(constants::HOSTNAME_TAG.to_string(), hostname.clone());
            }
            if let Some(ref origin) = self.origin {
                root.tags
                    .insert(constants::ORIGIN_TAG.to_string(), origin.clone());
            }
            if let Some(ref error) = state.propagation_error {
                root.tags
                    .insert(constants::PROPAGATION_ERROR_TAG.to_string(), error.clone());
            }
            for (key, value) in &state.trace_tags {
                root.tags.insert(key.clone(), value.clone());
            }
        }

        let slots = std::mem::take(&mut state.spans);
        if decision.priority.is_keep() {
            return slots.into_iter().map(take_span).collect();
        }

        // The trace is dropped; spans kept by the span sampler survive
        // individually, ids untouched so topology is preserved.
        let span_sampler = &self.shared.span_sampler;
        slots
            .into_iter()
            .map(take_span)
            .filter_map(|mut span| {
                let kept = span_sampler.decide(&span)?;
                span.numeric_tags.insert(
                    constants::SPAN_SAMPLING_MECHANISM_TAG.to_string(),
                    f64::from(mechanism::SPAN_SAMPLING_RULE.into_u8()),
                );
                span.numeric_tags.insert(
                    constants::SPAN_SAMPLING_RULE_RATE_TAG.to_string(),
                    kept.rule_rate,
                );
                if let Some(max_per_second) = kept.max_per_second {
                    span.numeric_tags.insert(
                        constants::SPAN_SAMPLING_LIMIT_TAG.to_string(),
                        max_per_second,
                    );
                }
                Some(span)
            })
            .collect()
    }

}

fn take_span(slot: SpanSlot) -> SpanData {
    // All spans are closed by now, so the segment holds the only reference.
    match Arc::try_unwrap(slot) {
        Ok(mutex) => mutex.into_inner().unwrap(),
        Err(slot) => slot.lock().unwrap().clone(),
    }
}
