// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{collections::HashMap, sync::Arc};

use datadog_tracing::{
    constants, dd_info,
    time::{default_clock, Clock},
    Config, Error, ErrorCode, Result, SpanConfig, SpanData,
};
use datadog_tracing_propagation::{carrier::Extractor, DatadogCompositePropagator};
use datadog_tracing_sampling::{SpanSampler, TraceSampler};

use crate::{
    collector::Collector,
    datadog_agent::DatadogAgent,
    http_client::ReqwestClient,
    id_generator::{IdGenerator, RandomIdGenerator},
    scheduler::ThreadedEventScheduler,
    span::Span,
    trace_segment::TraceSegment,
};

/// The process-wide collaborators shared by every trace segment.
pub(crate) struct TracerShared {
    pub(crate) config: Arc<Config>,
    pub(crate) trace_sampler: Arc<TraceSampler>,
    pub(crate) span_sampler: Arc<SpanSampler>,
    pub(crate) collector: Arc<dyn Collector>,
    pub(crate) propagator: DatadogCompositePropagator,
    pub(crate) clock: Clock,
    pub(crate) id_generator: Arc<dyn IdGenerator>,
    pub(crate) hostname: Option<String>,
}

/// The entry point of the tracing client: creates root spans, extracts
/// inbound trace context, and owns the process-wide sampler and collector.
pub struct Tracer {
    shared: Arc<TracerShared>,
}

impl Tracer {
    /// Builds a tracer that reports to the Datadog agent configured in
    /// `config`.
    pub fn new(config: Config) -> Result<Tracer> {
        let config = Arc::new(config);
        let trace_sampler = Arc::new(TraceSampler::new(
            config.trace_sampling_rules(),
            config.trace_rate_limit(),
        ));
        let collector = Arc::new(DatadogAgent::new(
            config.clone(),
            trace_sampler.clone(),
            Box::new(ReqwestClient::new()),
            Box::new(ThreadedEventScheduler::new()),
        ));
        Self::assemble(
            config,
            trace_sampler,
            collector,
            Arc::new(RandomIdGenerator),
            default_clock(),
        )
    }

    /// Builds a tracer that hands finished traces to `collector` instead of
    /// the agent uploader.
    pub fn with_collector(config: Config, collector: Arc<dyn Collector>) -> Result<Tracer> {
        let config = Arc::new(config);
        let trace_sampler = Arc::new(TraceSampler::new(
            config.trace_sampling_rules(),
            config.trace_rate_limit(),
        ));
        Self::assemble(
            config,
            trace_sampler,
            collector,
            Arc::new(RandomIdGenerator),
            default_clock(),
        )
    }

    /// Fully parameterized constructor; the other constructors delegate
    /// here. Intended for tests and embedders with custom time or id
    /// sources.
    pub fn with_parts(
        config: Config,
        collector: Arc<dyn Collector>,
        id_generator: Arc<dyn IdGenerator>,
        clock: Clock,
    ) -> Result<Tracer> {
        let config = Arc::new(config);
        let trace_sampler = Arc::new(TraceSampler::new(
            config.trace_sampling_rules(),
            config.trace_rate_limit(),
        ));
        Self::assemble(config, trace_sampler, collector, id_generator, clock)
    }

    fn assemble(
        config: Arc<Config>,
        trace_sampler: Arc<TraceSampler>,
        collector: Arc<dyn Collector>,
        id_generator: Arc<dyn IdGenerator>,
        clock: Clock,
    ) -> Result<Tracer> {
        datadog_tracing::log::set_max_level(config.log_level());

        let span_sampler = Arc::new(SpanSampler::new(config.span_sampling_rules()));
        let propagator = DatadogCompositePropagator::new(&config);
        let hostname = if config.report_hostname() {
            nix::unistd::gethostname()
                .ok()
                .map(|hostname| hostname.to_string_lossy().into_owned())
        } else {
            None
        };

        if config.startup_logs() {
            dd_info!("DATADOG TRACER CONFIGURATION - {}", config.to_json());
        }

        Ok(Tracer {
            shared: Arc::new(TracerShared {
                config,
                trace_sampler,
                span_sampler,
                collector,
                propagator,
                clock,
                id_generator,
                hostname,
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    /// Starts a new trace rooted at a new span.
    pub fn create_span(&self) -> Span {
        self.create_span_with(SpanConfig::default())
    }

    pub fn create_span_with(&self, span_config: SpanConfig) -> Span {
        // The root span's id doubles as the trace id.
        let id = self.shared.id_generator.new_id();
        let mut root = SpanData::with_ids(id, id, 0);
        root.apply_config(
            self.shared.config.defaults(),
            &span_config,
            &self.shared.clock,
        );

        let mut trace_tags = HashMap::new();
        if self.shared.config.trace_id_128_bit() {
            // The high 64 bits of the trace id travel as a propagated tag;
            // the wire-format id stays 64-bit.
            trace_tags.insert(
                constants::HIGHER_ORDER_TRACE_ID_BITS_TAG.to_string(),
                format!("{:016x}", self.shared.id_generator.new_id()),
            );
        }

        let segment = TraceSegment::new(self.shared.clone(), root, None, trace_tags);
        Span::new(segment.root_slot(), segment)
    }

    /// Continues the trace described by the carrier's propagation headers.
    /// Fails with [`ErrorCode::NoSpanToExtract`] when no configured style
    /// finds a context.
    pub fn extract_span(&self, carrier: &dyn Extractor) -> Result<Span> {
        self.extract_span_with(carrier, SpanConfig::default())
    }

    pub fn extract_span_with(
        &self,
        carrier: &dyn Extractor,
        span_config: SpanConfig,
    ) -> Result<Span> {
        let context = self.shared.propagator.extract(carrier).ok_or_else(|| {
            Error::new(
                ErrorCode::NoSpanToExtract,
                "the carrier contains no trace context in any configured extraction style",
            )
        })?;

        let mut root = SpanData::with_ids(
            context.trace_id,
            self.shared.id_generator.new_id(),
            context.span_id,
        );
        root.apply_config(
            self.shared.config.defaults(),
            &span_config,
            &self.shared.clock,
        );

        let segment =
            TraceSegment::new(self.shared.clone(), root, Some(&context), HashMap::new());
        Ok(Span::new(segment.root_slot(), segment))
    }

    /// Extracts a span from the carrier, or starts a fresh trace when the
    /// carrier has no context.
    pub fn extract_or_create_span(&self, carrier: &dyn Extractor) -> Result<Span> {
        self.extract_or_create_span_with(carrier, SpanConfig::default())
    }

    pub fn extract_or_create_span_with(
        &self,
        carrier: &dyn Extractor,
        span_config: SpanConfig,
    ) -> Result<Span> {
        match self.extract_span_with(carrier, span_config.clone()) {
            Err(e) if e.code == ErrorCode::NoSpanToExtract => {
                Ok(self.create_span_with(span_config))
            }
            other => other,
        }
    }
}
