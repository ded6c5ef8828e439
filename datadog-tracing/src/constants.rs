// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Span tag names that have special meaning.

/// Prefix of tag names reserved for use internal to this library.
pub const INTERNAL_TAG_PREFIX: &str = "_dd.";

/// Prefix of trace tags that are propagated across services.
pub const PROPAGATION_TAG_PREFIX: &str = "_dd.p.";

pub const ENVIRONMENT_TAG: &str = "env";
pub const VERSION_TAG: &str = "version";

pub const ERROR_MESSAGE_TAG: &str = "error.message";
pub const ERROR_TYPE_TAG: &str = "error.type";
pub const ERROR_STACK_TAG: &str = "error.stack";

pub const ORIGIN_TAG: &str = "_dd.origin";
pub const HOSTNAME_TAG: &str = "_dd.hostname";
pub const PROPAGATION_ERROR_TAG: &str = "_dd.propagation_error";

pub const SAMPLING_PRIORITY_TAG: &str = "_sampling_priority_v1";
pub const SAMPLING_DECISION_MAKER_TAG: &str = "_dd.p.dm";
pub const HIGHER_ORDER_TRACE_ID_BITS_TAG: &str = "_dd.p.tid";

pub const SAMPLING_RULE_RATE_TAG: &str = "_dd.rule.psr";
pub const SAMPLING_LIMITER_RATE_TAG: &str = "_dd.limit_psr";
pub const SAMPLING_AGENT_RATE_TAG: &str = "_dd.agent_psr";

pub const SPAN_SAMPLING_MECHANISM_TAG: &str = "_dd.span_sampling.mechanism";
pub const SPAN_SAMPLING_RULE_RATE_TAG: &str = "_dd.span_sampling.rule_rate";
pub const SPAN_SAMPLING_LIMIT_TAG: &str = "_dd.span_sampling.max_per_second";

/// Returns whether `tag_name` is reserved for use internal to this library.
pub fn is_internal(tag_name: &str) -> bool {
    tag_name.starts_with(INTERNAL_TAG_PREFIX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_internal() {
        assert!(is_internal("_dd.origin"));
        assert!(is_internal("_dd.p.dm"));
        assert!(!is_internal("env"));
        assert!(!is_internal("dd.trace_id"));
    }
}
