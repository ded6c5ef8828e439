// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A `Span` represents an extent of time in which some operation of
//! interest occurs: an RPC request, a database query, a calculation.
//!
//! Spans are created by a [`crate::Tracer`] or by another span's
//! `create_child`; they are never instantiated directly. A span finishes
//! when it is dropped, at which point its end time defaults to the current
//! time unless overridden with `set_end_time`.

use std::sync::Arc;

use datadog_tracing::{
    constants, dd_debug, SpanConfig, SpanData, TimePoint,
};
use datadog_tracing_propagation::carrier::Injector;

use crate::trace_segment::{SpanSlot, TraceSegment};

/// A live span handle. Non-copyable; moving it transfers ownership of the
/// underlying slot, so a span closes exactly once.
pub struct Span {
    data: SpanSlot,
    segment: Arc<TraceSegment>,
    span_id: u64,
    trace_id: u64,
    parent_id: u64,
    end_time: Option<TimePoint>,
}

impl std::fmt::Debug for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Span")
            .field("trace_id", &self.trace_id)
            .field("span_id", &self.span_id)
            .field("parent_id", &self.parent_id)
            .finish()
    }
}

impl Span {
    pub(crate) fn new(data: SpanSlot, segment: Arc<TraceSegment>) -> Span {
        let (span_id, trace_id, parent_id) = {
            let data = data.lock().unwrap();
            (data.span_id, data.trace_id, data.parent_id)
        };
        Span {
            data,
            segment,
            span_id,
            trace_id,
            parent_id,
            end_time: None,
        }
    }

    /// Starts a child of this span, inheriting the trace id and defaults.
    /// The child's start time is now unless `config` overrides it.
    pub fn create_child_with(&self, config: SpanConfig) -> Span {
        let shared = self.segment.shared();
        let mut data = SpanData::with_ids(
            self.trace_id,
            shared.id_generator.new_id(),
            self.span_id,
        );
        data.apply_config(shared.config.defaults(), &config, &shared.clock);
        let slot = self.segment.register_span(data);
        Span::new(slot, self.segment.clone())
    }

    pub fn create_child(&self) -> Span {
        self.create_child_with(SpanConfig::default())
    }

    pub fn id(&self) -> u64 {
        self.span_id
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    /// The parent span's id, or `None` for a trace's first span.
    pub fn parent_id(&self) -> Option<u64> {
        (self.parent_id != 0).then_some(self.parent_id)
    }

    pub fn start_time(&self) -> TimePoint {
        self.data.lock().unwrap().start
    }

    pub fn error(&self) -> bool {
        self.data.lock().unwrap().error
    }

    /// The value of the tag named `name`, if set.
    pub fn lookup_tag(&self, name: &str) -> Option<String> {
        self.data.lock().unwrap().tags.get(name).cloned()
    }

    /// Overwrites or inserts a tag. Names beginning with `_dd.` are
    /// reserved for the library and are ignored here.
    pub fn set_tag(&mut self, name: &str, value: &str) {
        if constants::is_internal(name) {
            dd_debug!("ignoring reserved tag name {name:?}");
            return;
        }
        self.data
            .lock()
            .unwrap()
            .tags
            .insert(name.to_string(), value.to_string());
    }

    /// Removes the tag named `name` if it exists.
    pub fn remove_tag(&mut self, name: &str) {
        self.data.lock().unwrap().tags.remove(name);
    }

    pub fn set_service_name(&mut self, service: &str) {
        self.data.lock().unwrap().service = service.to_string();
    }

    pub fn set_service_type(&mut self, service_type: &str) {
        self.data.lock().unwrap().service_type = service_type.to_string();
    }

    pub fn set_name(&mut self, name: &str) {
        self.data.lock().unwrap().name = name.to_string();
    }

    pub fn set_resource_name(&mut self, resource: &str) {
        self.data.lock().unwrap().resource = resource.to_string();
    }

    /// Marks whether an error occurred during this span. Clearing the flag
    /// also removes the error message, type, and stack tags.
    pub fn set_error(&mut self, error: bool) {
        let mut data = self.data.lock().unwrap();
        data.error = error;
        if !error {
            data.tags.remove(constants::ERROR_MESSAGE_TAG);
            data.tags.remove(constants::ERROR_TYPE_TAG);
            data.tags.remove(constants::ERROR_STACK_TAG);
        }
    }

    pub fn set_error_message(&mut self, message: &str) {
        let mut data = self.data.lock().unwrap();
        data.error = true;
        data.tags
            .insert(constants::ERROR_MESSAGE_TAG.to_string(), message.to_string());
    }

    pub fn set_error_type(&mut self, error_type: &str) {
        let mut data = self.data.lock().unwrap();
        data.error = true;
        data.tags
            .insert(constants::ERROR_TYPE_TAG.to_string(), error_type.to_string());
    }

    pub fn set_error_stack(&mut self, stack: &str) {
        let mut data = self.data.lock().unwrap();
        data.error = true;
        data.tags
            .insert(constants::ERROR_STACK_TAG.to_string(), stack.to_string());
    }

    /// Overrides the end time recorded when this span is dropped.
    pub fn set_end_time(&mut self, end_time: TimePoint) {
        self.end_time = Some(end_time);
    }

    /// Writes this span's trace context into `writer` for propagation to a
    /// downstream service.
    pub fn inject(&self, writer: &mut dyn Injector) {
        self.segment.inject(self.span_id, writer);
    }

    /// The segment this span belongs to, for trace-wide operations such as
    /// [`TraceSegment::override_sampling_priority`].
    pub fn trace_segment(&self) -> &TraceSegment {
        &self.segment
    }
}

impl Drop for Span {
    fn drop(&mut self) {
        let end = self
            .end_time
            .unwrap_or_else(|| (*self.segment.shared().clock)());
        {
            let mut data = self.data.lock().unwrap();
            data.duration = end.tick.saturating_duration_since(data.start.tick);
        }
        self.segment.close_span();
    }
}
