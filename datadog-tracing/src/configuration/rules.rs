// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Sampling-rule configuration as parsed from the `DD_TRACE_SAMPLING_RULES`
//! and `DD_SPAN_SAMPLING_RULES` JSON arrays. Rules are validated here during
//! configuration finalization; the sampling crate compiles them into
//! matchers.

use std::collections::HashMap;

use serde::Deserialize;

use crate::{Error, ErrorCode};

/// One entry of the `DD_TRACE_SAMPLING_RULES` array. Absent match fields
/// default to the `*` wildcard.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TraceSamplingRuleConfig {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
}

impl Default for TraceSamplingRuleConfig {
    fn default() -> Self {
        TraceSamplingRuleConfig {
            service: None,
            name: None,
            resource: None,
            tags: HashMap::new(),
            sample_rate: default_sample_rate(),
        }
    }
}

/// One entry of the `DD_SPAN_SAMPLING_RULES` array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SpanSamplingRuleConfig {
    #[serde(default)]
    pub service: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub tags: HashMap<String, String>,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: f64,
    #[serde(default)]
    pub max_per_second: Option<f64>,
}

fn default_sample_rate() -> f64 {
    1.0
}

struct RuleErrorCodes {
    invalid_json: ErrorCode,
    wrong_type: ErrorCode,
    unknown_property: ErrorCode,
}

const TRACE_RULE_CODES: RuleErrorCodes = RuleErrorCodes {
    invalid_json: ErrorCode::TraceSamplingRulesInvalidJson,
    wrong_type: ErrorCode::TraceSamplingRulesWrongType,
    unknown_property: ErrorCode::TraceSamplingRulesUnknownProperty,
};

const SPAN_RULE_CODES: RuleErrorCodes = RuleErrorCodes {
    invalid_json: ErrorCode::SpanSamplingRulesInvalidJson,
    wrong_type: ErrorCode::SpanSamplingRulesWrongType,
    unknown_property: ErrorCode::SpanSamplingRulesUnknownProperty,
};

fn parse_rule_array<T: for<'de> Deserialize<'de>>(
    raw: &str,
    source_name: &str,
    codes: &RuleErrorCodes,
) -> Result<Vec<T>, Error> {
    let json: serde_json::Value = serde_json::from_str(raw).map_err(|e| {
        Error::new(
            codes.invalid_json,
            format!("unable to parse JSON from {source_name} value {raw:?}: {e}"),
        )
    })?;

    let serde_json::Value::Array(entries) = json else {
        return Err(Error::new(
            codes.wrong_type,
            format!("{source_name} must be an array of rule objects, got: {raw:?}"),
        ));
    };

    let mut rules = Vec::with_capacity(entries.len());
    for entry in entries {
        let rendered = entry.to_string();
        let rule: T = serde_json::from_value(entry).map_err(|e| {
            let message =
                format!("unable to create a rule from {source_name} entry {rendered}: {e}");
            if e.to_string().starts_with("unknown field") {
                Error::new(codes.unknown_property, message)
            } else {
                Error::new(codes.wrong_type, message)
            }
        })?;
        rules.push(rule);
    }
    Ok(rules)
}

fn validate_sample_rate(sample_rate: f64, context: &str) -> Result<(), Error> {
    if !(0.0..=1.0).contains(&sample_rate) || sample_rate.is_nan() {
        return Err(Error::new(
            ErrorCode::RateOutOfRange,
            format!("sample_rate {sample_rate} in {context} is not within [0, 1]"),
        ));
    }
    Ok(())
}

pub(crate) fn parse_trace_rules(
    raw: &str,
    source_name: &str,
) -> Result<Vec<TraceSamplingRuleConfig>, Error> {
    let rules: Vec<TraceSamplingRuleConfig> = parse_rule_array(raw, source_name, &TRACE_RULE_CODES)?;
    for rule in &rules {
        validate_sample_rate(rule.sample_rate, source_name)?;
    }
    Ok(rules)
}

pub(crate) fn parse_span_rules(
    raw: &str,
    source_name: &str,
) -> Result<Vec<SpanSamplingRuleConfig>, Error> {
    let rules: Vec<SpanSamplingRuleConfig> = parse_rule_array(raw, source_name, &SPAN_RULE_CODES)?;
    for rule in &rules {
        validate_sample_rate(rule.sample_rate, source_name)?;
        if let Some(max_per_second) = rule.max_per_second {
            if !(max_per_second > 0.0) || !max_per_second.is_finite() {
                return Err(Error::new(
                    ErrorCode::MaxPerSecondOutOfRange,
                    format!(
                        "max_per_second {max_per_second} in {source_name} must be a finite number greater than zero"
                    ),
                ));
            }
        }
    }
    Ok(rules)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_trace_rules() {
        let rules = parse_trace_rules(
            r#"[{"service":"poohbear","name":"get.honey","sample_rate":0}]"#,
            "DD_TRACE_SAMPLING_RULES",
        )
        .unwrap();
        assert_eq!(rules.len(), 1);
        assert_eq!(rules[0].service.as_deref(), Some("poohbear"));
        assert_eq!(rules[0].name.as_deref(), Some("get.honey"));
        assert_eq!(rules[0].sample_rate, 0.0);
    }

    #[test]
    fn test_parse_trace_rules_default_rate() {
        let rules =
            parse_trace_rules(r#"[{"service":"web"}]"#, "DD_TRACE_SAMPLING_RULES").unwrap();
        assert_eq!(rules[0].sample_rate, 1.0);
    }

    #[test]
    fn test_parse_trace_rules_invalid_json() {
        let err = parse_trace_rules("{not json", "DD_TRACE_SAMPLING_RULES").unwrap_err();
        assert_eq!(err.code, ErrorCode::TraceSamplingRulesInvalidJson);
    }

    #[test]
    fn test_parse_trace_rules_not_an_array() {
        let err = parse_trace_rules(r#"{"service":"web"}"#, "DD_TRACE_SAMPLING_RULES").unwrap_err();
        assert_eq!(err.code, ErrorCode::TraceSamplingRulesWrongType);
    }

    #[test]
    fn test_parse_trace_rules_unknown_property() {
        let err = parse_trace_rules(
            r#"[{"service":"web","nonsense":1}]"#,
            "DD_TRACE_SAMPLING_RULES",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::TraceSamplingRulesUnknownProperty);
    }

    #[test]
    fn test_parse_trace_rules_rate_out_of_range() {
        let err = parse_trace_rules(
            r#"[{"service":"web","sample_rate":1.5}]"#,
            "DD_TRACE_SAMPLING_RULES",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::RateOutOfRange);
    }

    #[test]
    fn test_parse_span_rules() {
        let rules = parse_span_rules(
            r#"[{"name":"mysql2.query","max_per_second":100}]"#,
            "DD_SPAN_SAMPLING_RULES",
        )
        .unwrap();
        assert_eq!(rules[0].name.as_deref(), Some("mysql2.query"));
        assert_eq!(rules[0].sample_rate, 1.0);
        assert_eq!(rules[0].max_per_second, Some(100.0));
    }

    #[test]
    fn test_parse_span_rules_bad_max_per_second() {
        let err = parse_span_rules(
            r#"[{"name":"mysql2.query","max_per_second":0}]"#,
            "DD_SPAN_SAMPLING_RULES",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::MaxPerSecondOutOfRange);
    }

    #[test]
    fn test_parse_span_rules_wrong_value_type() {
        let err = parse_span_rules(
            r#"[{"sample_rate":"lots"}]"#,
            "DD_SPAN_SAMPLING_RULES",
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::SpanSamplingRulesWrongType);
    }
}
