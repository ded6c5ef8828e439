// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

use datadog_tracing::{
    configuration::{SpanSamplingRuleConfig, TraceSamplingRuleConfig},
    SpanData,
};

use crate::glob_matcher::GlobMatcher;

/// Matches a span against `service`/`name`/`resource`/`tags` glob patterns.
/// A field left unspecified defaults to `*`, represented here as "no
/// matcher".
#[derive(Debug, Clone, Default)]
pub struct SpanMatcher {
    service: Option<GlobMatcher>,
    name: Option<GlobMatcher>,
    resource: Option<GlobMatcher>,
    tags: Vec<(String, GlobMatcher)>,
}

fn compile(pattern: Option<&str>) -> Option<GlobMatcher> {
    match pattern {
        None | Some("*") => None,
        Some(pattern) => Some(GlobMatcher::new(pattern)),
    }
}

impl SpanMatcher {
    pub fn new(
        service: Option<&str>,
        name: Option<&str>,
        resource: Option<&str>,
        tags: &HashMap<String, String>,
    ) -> Self {
        SpanMatcher {
            service: compile(service),
            name: compile(name),
            resource: compile(resource),
            tags: tags
                .iter()
                .map(|(key, pattern)| (key.clone(), GlobMatcher::new(pattern)))
                .collect(),
        }
    }

    pub fn from_trace_rule(rule: &TraceSamplingRuleConfig) -> Self {
        SpanMatcher::new(
            rule.service.as_deref(),
            rule.name.as_deref(),
            rule.resource.as_deref(),
            &rule.tags,
        )
    }

    pub fn from_span_rule(rule: &SpanSamplingRuleConfig) -> Self {
        SpanMatcher::new(
            rule.service.as_deref(),
            rule.name.as_deref(),
            rule.resource.as_deref(),
            &rule.tags,
        )
    }

    /// A span matches when the service, name, and resource patterns all
    /// match, and every required tag is present with a matching value.
    pub fn matches(&self, span: &SpanData) -> bool {
        if let Some(ref matcher) = self.service {
            if !matcher.matches(&span.service) {
                return false;
            }
        }
        if let Some(ref matcher) = self.name {
            if !matcher.matches(&span.name) {
                return false;
            }
        }
        if let Some(ref matcher) = self.resource {
            if !matcher.matches(&span.resource) {
                return false;
            }
        }
        for (key, matcher) in &self.tags {
            match span.tags.get(key) {
                Some(value) if matcher.matches(value) => {}
                _ => return false,
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn span(service: &str, name: &str, resource: &str) -> SpanData {
        let mut span = SpanData::with_ids(1, 2, 0);
        span.service = service.to_string();
        span.name = name.to_string();
        span.resource = resource.to_string();
        span
    }

    #[test]
    fn test_empty_matcher_matches_everything() {
        let matcher = SpanMatcher::default();
        assert!(matcher.matches(&span("anything", "at", "all")));
    }

    #[test]
    fn test_field_patterns() {
        let matcher = SpanMatcher::new(Some("web-*"), Some("http.request"), None, &HashMap::new());
        assert!(matcher.matches(&span("web-api", "http.request", "/users")));
        assert!(!matcher.matches(&span("db", "http.request", "/users")));
        assert!(!matcher.matches(&span("web-api", "db.query", "/users")));
    }

    #[test]
    fn test_required_tags() {
        let tags = HashMap::from([("peer.hostname".to_string(), "db-?".to_string())]);
        let matcher = SpanMatcher::new(None, None, None, &tags);

        let mut matching = span("svc", "op", "res");
        matching
            .tags
            .insert("peer.hostname".to_string(), "db-1".to_string());
        assert!(matcher.matches(&matching));

        let mut wrong_value = span("svc", "op", "res");
        wrong_value
            .tags
            .insert("peer.hostname".to_string(), "db-10".to_string());
        assert!(!wrong_value.tags.is_empty());
        assert!(!matcher.matches(&wrong_value));

        let absent = span("svc", "op", "res");
        assert!(!matcher.matches(&absent));
    }

    #[test]
    fn test_explicit_star_is_always_match() {
        let matcher = SpanMatcher::new(Some("*"), None, None, &HashMap::new());
        assert!(matcher.matches(&span("", "op", "res")));
    }
}
