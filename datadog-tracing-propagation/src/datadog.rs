// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The Datadog propagation style: one header per context part.

use lazy_static::lazy_static;
use regex::Regex;

use datadog_tracing::{
    constants::PROPAGATION_ERROR_TAG, dd_debug, dd_warn, sampling::SamplingPriority, Error,
    ErrorCode,
};

use crate::{
    carrier::{Extractor, Injector},
    context::{Sampling, SpanContext},
    tag_propagation,
};

const TRACE_ID_KEY: &str = "x-datadog-trace-id";
const PARENT_ID_KEY: &str = "x-datadog-parent-id";
const SAMPLING_PRIORITY_KEY: &str = "x-datadog-sampling-priority";
const ORIGIN_KEY: &str = "x-datadog-origin";
const TAGS_KEY: &str = "x-datadog-tags";

lazy_static! {
    static ref ALL_ZEROES_REGEX: Regex = Regex::new(r"^0+$").expect("failed creating regex");
}

pub(crate) fn keys() -> &'static [&'static str] {
    &[
        TRACE_ID_KEY,
        PARENT_ID_KEY,
        SAMPLING_PRIORITY_KEY,
        ORIGIN_KEY,
        TAGS_KEY,
    ]
}

pub(crate) fn extract(carrier: &dyn Extractor) -> Option<SpanContext> {
    let trace_id = match extract_trace_id(carrier) {
        Ok(trace_id) => trace_id,
        Err(message) => {
            dd_debug!("datadog extract: {message}");
            return None;
        }
    };

    // An absent parent id is an origin-style trace (e.g. synthetics); a
    // malformed one is tolerated the same way.
    let parent_id = carrier
        .get(PARENT_ID_KEY)
        .and_then(|raw| raw.parse::<u64>().ok())
        .unwrap_or(0);

    // Missing or malformed priorities are tolerated as "no decision".
    let priority = carrier
        .get(SAMPLING_PRIORITY_KEY)
        .and_then(|raw| raw.parse::<SamplingPriority>().ok());

    let origin = carrier.get(ORIGIN_KEY).map(str::to_string);

    let tags = match carrier.get(TAGS_KEY) {
        None | Some("") => Default::default(),
        Some(raw) => match tag_propagation::decode_tags(raw) {
            Ok(tags) => tags,
            Err(e) => {
                dd_warn!("failed to decode {TAGS_KEY}: {e}");
                [(PROPAGATION_ERROR_TAG.to_string(), "decoding_error".to_string())]
                    .into_iter()
                    .collect()
            }
        },
    };

    Some(SpanContext {
        trace_id,
        span_id: parent_id,
        sampling: Sampling {
            priority,
            mechanism: None,
        },
        origin,
        tags,
    })
}

fn extract_trace_id(carrier: &dyn Extractor) -> Result<u64, &'static str> {
    let raw = carrier.get(TRACE_ID_KEY).ok_or("trace id not found")?;
    if ALL_ZEROES_REGEX.is_match(raw) {
        return Err("trace id is zero");
    }
    raw.parse::<u64>().map_err(|_| "failed to decode trace id")
}

/// Writes the context into the carrier. When the encoded propagated tags
/// exceed `tags_max_length`, the tags header is omitted and an error with
/// code [`ErrorCode::TagsInjectMaxSize`] is returned; the other headers are
/// still written.
pub(crate) fn inject(
    context: &SpanContext,
    carrier: &mut dyn Injector,
    tags_max_length: usize,
) -> Result<(), Error> {
    carrier.set(TRACE_ID_KEY, context.trace_id.to_string());
    carrier.set(PARENT_ID_KEY, context.span_id.to_string());
    if let Some(priority) = context.sampling.priority {
        carrier.set(SAMPLING_PRIORITY_KEY, priority.to_string());
    }
    if let Some(ref origin) = context.origin {
        carrier.set(ORIGIN_KEY, origin.clone());
    }

    if !context.tags.is_empty() {
        let encoded = tag_propagation::encode_tags(&context.tags);
        if encoded.len() > tags_max_length {
            return Err(Error::new(
                ErrorCode::TagsInjectMaxSize,
                format!(
                    "serialized {TAGS_KEY} length {} exceeds the configured maximum {tags_max_length}",
                    encoded.len()
                ),
            ));
        }
        carrier.set(TAGS_KEY, encoded);
    }
    Ok(())
}
