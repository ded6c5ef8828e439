// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! `SpanData` is the persistable payload of one span, the unit consumed by
//! the collector.

use std::{collections::HashMap, time::Duration};

use crate::{
    configuration::SpanDefaults,
    constants,
    time::{Clock, TimePoint},
};

/// Span properties that callers may override when starting a span. Unset
/// properties fall back to the tracer's `SpanDefaults`.
#[derive(Debug, Default, Clone)]
pub struct SpanConfig {
    pub service: Option<String>,
    pub service_type: Option<String>,
    pub name: Option<String>,
    pub resource: Option<String>,
    pub environment: Option<String>,
    pub version: Option<String>,
    pub start: Option<TimePoint>,
    pub tags: HashMap<String, String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SpanData {
    pub service: String,
    pub service_type: String,
    pub name: String,
    pub resource: String,
    pub trace_id: u64,
    pub span_id: u64,
    /// Zero means "no parent".
    pub parent_id: u64,
    pub start: TimePoint,
    pub duration: Duration,
    pub error: bool,
    pub tags: HashMap<String, String>,
    pub numeric_tags: HashMap<String, f64>,
}

impl SpanData {
    pub fn with_ids(trace_id: u64, span_id: u64, parent_id: u64) -> Self {
        SpanData {
            service: String::new(),
            service_type: String::new(),
            name: String::new(),
            resource: String::new(),
            trace_id,
            span_id,
            parent_id,
            start: TimePoint::now(),
            duration: Duration::ZERO,
            error: false,
            tags: HashMap::new(),
            numeric_tags: HashMap::new(),
        }
    }

    pub fn environment(&self) -> Option<&str> {
        self.tags.get(constants::ENVIRONMENT_TAG).map(String::as_str)
    }

    pub fn version(&self) -> Option<&str> {
        self.tags.get(constants::VERSION_TAG).map(String::as_str)
    }

    /// Fills this span's properties from `config`, falling back to
    /// `defaults` for anything unset. The start time comes from `config` or
    /// else from `clock`.
    pub fn apply_config(&mut self, defaults: &SpanDefaults, config: &SpanConfig, clock: &Clock) {
        self.service = config
            .service
            .clone()
            .unwrap_or_else(|| defaults.service.clone());
        self.service_type = config
            .service_type
            .clone()
            .unwrap_or_else(|| defaults.service_type.clone());
        self.name = config
            .name
            .clone()
            .unwrap_or_else(|| defaults.name.clone());
        // An unnamed resource falls back to the operation name.
        self.resource = config
            .resource
            .clone()
            .unwrap_or_else(|| self.name.clone());

        self.tags = defaults.tags.clone();
        for (key, value) in &config.tags {
            self.tags.insert(key.clone(), value.clone());
        }
        let environment = config
            .environment
            .clone()
            .or_else(|| defaults.environment.clone());
        if let Some(environment) = environment {
            self.tags
                .insert(constants::ENVIRONMENT_TAG.to_string(), environment);
        }
        let version = config.version.clone().or_else(|| defaults.version.clone());
        if let Some(version) = version {
            self.tags.insert(constants::VERSION_TAG.to_string(), version);
        }

        self.start = config.start.unwrap_or_else(|| (**clock)());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::default_clock;

    fn defaults() -> SpanDefaults {
        SpanDefaults {
            service: "testsvc".to_string(),
            service_type: "web".to_string(),
            name: "do.thing".to_string(),
            environment: Some("staging".to_string()),
            version: Some("v1.2.3".to_string()),
            tags: HashMap::from([("team".to_string(), "apm".to_string())]),
        }
    }

    #[test]
    fn test_apply_config_defaults_win_when_unset() {
        let mut span = SpanData::with_ids(1, 2, 0);
        span.apply_config(&defaults(), &SpanConfig::default(), &default_clock());

        assert_eq!(span.service, "testsvc");
        assert_eq!(span.service_type, "web");
        assert_eq!(span.name, "do.thing");
        assert_eq!(span.resource, "do.thing");
        assert_eq!(span.environment(), Some("staging"));
        assert_eq!(span.version(), Some("v1.2.3"));
        assert_eq!(span.tags.get("team").unwrap(), "apm");
    }

    #[test]
    fn test_apply_config_overrides_take_precedence() {
        let mut span = SpanData::with_ids(1, 2, 0);
        let config = SpanConfig {
            service: Some("othersvc".to_string()),
            name: Some("handle.request".to_string()),
            resource: Some("/api/v1/info".to_string()),
            environment: Some("prod".to_string()),
            tags: HashMap::from([("team".to_string(), "ingest".to_string())]),
            ..Default::default()
        };
        span.apply_config(&defaults(), &config, &default_clock());

        assert_eq!(span.service, "othersvc");
        assert_eq!(span.name, "handle.request");
        assert_eq!(span.resource, "/api/v1/info");
        assert_eq!(span.environment(), Some("prod"));
        assert_eq!(span.tags.get("team").unwrap(), "ingest");
    }

    #[test]
    fn test_apply_config_explicit_start() {
        let start = TimePoint::now();
        let mut span = SpanData::with_ids(1, 2, 0);
        let config = SpanConfig {
            start: Some(start),
            ..Default::default()
        };
        span.apply_config(&defaults(), &config, &default_clock());
        assert_eq!(span.start.wall, start.wall);
    }
}
