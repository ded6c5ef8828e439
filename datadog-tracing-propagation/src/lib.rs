// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Extraction and injection of Datadog trace context in the configured wire
//! styles.

use datadog_tracing::{
    configuration::PropagationStyle, constants::PROPAGATION_ERROR_TAG, Config, Error,
};

use crate::carrier::{Extractor, Injector};
use crate::context::SpanContext;

mod b3;
pub mod carrier;
pub mod context;
mod datadog;
pub mod tag_propagation;

/// Applies the configured propagation styles in order.
///
/// Extraction returns the first style that yields a complete context; when
/// another configured style disagrees on the trace id, the context is
/// annotated with a `_dd.propagation_error` of `extract_mismatch`.
/// Injection writes every configured style; the first non-fatal error
/// (an oversized tags header) is reported after all styles have run.
#[derive(Debug)]
pub struct DatadogCompositePropagator {
    injectors: Vec<PropagationStyle>,
    extractors: Vec<PropagationStyle>,
    tags_max_length: usize,
    keys: Vec<&'static str>,
}

impl DatadogCompositePropagator {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let extractors = config.extract_styles().to_vec();
        let keys = extractors
            .iter()
            .flat_map(|style| style_keys(*style))
            .copied()
            .collect();
        Self {
            injectors: config.inject_styles().to_vec(),
            extractors,
            tags_max_length: config.tags_propagation_max_length(),
            keys,
        }
    }

    pub fn extract(&self, carrier: &dyn Extractor) -> Option<SpanContext> {
        let mut contexts = self
            .extractors
            .iter()
            .filter_map(|style| style_extract(*style, carrier));
        let mut primary = contexts.next()?;

        if contexts.any(|other| other.trace_id != primary.trace_id) {
            primary.tags.insert(
                PROPAGATION_ERROR_TAG.to_string(),
                "extract_mismatch".to_string(),
            );
        }
        Some(primary)
    }

    pub fn inject(&self, context: &SpanContext, carrier: &mut dyn Injector) -> Result<(), Error> {
        let mut first_error = None;
        for style in &self.injectors {
            match style {
                PropagationStyle::Datadog => {
                    if let Err(e) = datadog::inject(context, carrier, self.tags_max_length) {
                        first_error.get_or_insert(e);
                    }
                }
                PropagationStyle::B3 => b3::inject(context, carrier),
            }
        }
        match first_error {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    /// The header names the configured extraction styles may read.
    pub fn keys(&self) -> &[&'static str] {
        &self.keys
    }
}

fn style_extract(style: PropagationStyle, carrier: &dyn Extractor) -> Option<SpanContext> {
    match style {
        PropagationStyle::Datadog => datadog::extract(carrier),
        PropagationStyle::B3 => b3::extract(carrier),
    }
}

fn style_keys(style: PropagationStyle) -> &'static [&'static str] {
    match style {
        PropagationStyle::Datadog => datadog::keys(),
        PropagationStyle::B3 => b3::keys(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_unordered::assert_eq_unordered;
    use datadog_tracing::configuration::sources::{CompositeSource, ConfigSourceOrigin, HashMapSource};
    use datadog_tracing::sampling::priority;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    fn config(extract: &str, inject: &str) -> Config {
        let mut sources = CompositeSource::new();
        sources.add_source(HashMapSource::from_iter(
            [
                ("DD_SERVICE", "testsvc"),
                ("DD_PROPAGATION_STYLE_EXTRACT", extract),
                ("DD_PROPAGATION_STYLE_INJECT", inject),
            ],
            ConfigSourceOrigin::EnvVar,
        ));
        Config::builder_with_sources(sources).build().unwrap()
    }

    fn datadog_headers() -> HashMap<String, String> {
        HashMap::from([
            ("x-datadog-trace-id".to_string(), "1234".to_string()),
            ("x-datadog-parent-id".to_string(), "5678".to_string()),
            ("x-datadog-sampling-priority".to_string(), "1".to_string()),
        ])
    }

    fn b3_headers(trace_id: u64) -> HashMap<String, String> {
        HashMap::from([(
            "b3".to_string(),
            format!("{trace_id:016x}-00000000000019d2-0"),
        )])
    }

    #[test]
    fn test_extract_first_style_wins() {
        let propagator =
            DatadogCompositePropagator::new(&config("datadog,b3", "datadog"));
        let mut carrier = datadog_headers();
        carrier.extend(b3_headers(1234));

        let context = propagator.extract(&carrier).unwrap();
        assert_eq!(context.span_id, 5678);
        assert_eq!(context.sampling.priority, Some(priority::AUTO_KEEP));
        assert!(!context.tags.contains_key("_dd.propagation_error"));
    }

    #[test]
    fn test_extract_falls_through_to_later_style() {
        let propagator =
            DatadogCompositePropagator::new(&config("datadog,b3", "datadog"));
        let carrier = b3_headers(1234);

        let context = propagator.extract(&carrier).unwrap();
        assert_eq!(context.trace_id, 1234);
        assert_eq!(context.span_id, 0x19d2);
        assert_eq!(context.sampling.priority, Some(priority::AUTO_REJECT));
    }

    #[test]
    fn test_extract_records_style_disagreement() {
        let propagator =
            DatadogCompositePropagator::new(&config("datadog,b3", "datadog"));
        let mut carrier = datadog_headers();
        carrier.extend(b3_headers(999));

        let context = propagator.extract(&carrier).unwrap();
        assert_eq!(context.trace_id, 1234);
        assert_eq!(
            context.tags.get("_dd.propagation_error").unwrap(),
            "extract_mismatch"
        );
    }

    #[test]
    fn test_extract_nothing() {
        let propagator = DatadogCompositePropagator::new(&config("datadog,b3", "datadog"));
        assert_eq!(propagator.extract(&HashMap::new()), None);
    }

    #[test]
    fn test_inject_all_styles() {
        let propagator = DatadogCompositePropagator::new(&config("datadog", "datadog,b3"));
        let context = SpanContext {
            trace_id: 1234,
            span_id: 5678,
            sampling: context::Sampling {
                priority: Some(priority::AUTO_KEEP),
                mechanism: None,
            },
            origin: None,
            tags: HashMap::from([("_dd.p.dm".to_string(), "-3".to_string())]),
        };
        let mut carrier: HashMap<String, String> = HashMap::new();
        propagator.inject(&context, &mut carrier).unwrap();

        assert_eq_unordered!(
            carrier,
            HashMap::from([
                ("x-datadog-trace-id".to_string(), "1234".to_string()),
                ("x-datadog-parent-id".to_string(), "5678".to_string()),
                ("x-datadog-sampling-priority".to_string(), "1".to_string()),
                ("x-datadog-tags".to_string(), "_dd.p.dm=-3".to_string()),
                (
                    "b3".to_string(),
                    "00000000000004d2-000000000000162e-1".to_string()
                ),
            ])
        );
    }

    #[test]
    fn test_inject_reports_oversized_tags_but_writes_other_styles() {
        let propagator = DatadogCompositePropagator::new(&config("datadog", "datadog,b3"));
        let context = SpanContext {
            trace_id: 1234,
            span_id: 5678,
            tags: HashMap::from([("_dd.p.big".to_string(), "x".repeat(600))]),
            ..Default::default()
        };
        let mut carrier: HashMap<String, String> = HashMap::new();
        let err = propagator.inject(&context, &mut carrier).unwrap_err();
        assert_eq!(
            err.code,
            datadog_tracing::ErrorCode::TagsInjectMaxSize
        );
        assert!(!carrier.contains_key("x-datadog-tags"));
        assert!(carrier.contains_key("b3"));
    }

    #[test]
    fn test_round_trip_preserves_context() {
        let propagator = DatadogCompositePropagator::new(&config("datadog", "datadog"));
        let context = SpanContext {
            trace_id: 1234,
            span_id: 5678,
            sampling: context::Sampling {
                priority: Some(priority::USER_KEEP),
                mechanism: None,
            },
            origin: Some("rum".to_string()),
            tags: HashMap::from([
                ("_dd.p.dm".to_string(), "-4".to_string()),
                ("_dd.p.custom".to_string(), "yes".to_string()),
            ]),
        };
        let mut carrier: HashMap<String, String> = HashMap::new();
        propagator.inject(&context, &mut carrier).unwrap();
        let extracted = propagator.extract(&carrier).unwrap();
        assert_eq!(extracted, context);
    }

    #[test]
    fn test_keys() {
        let propagator = DatadogCompositePropagator::new(&config("datadog,b3", "datadog"));
        assert_eq!(
            propagator.keys(),
            &[
                "x-datadog-trace-id",
                "x-datadog-parent-id",
                "x-datadog-sampling-priority",
                "x-datadog-origin",
                "x-datadog-tags",
                "b3",
            ]
        );
    }
}
