// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The B3 single-header propagation style: `b3` carries
//! `TRACEID-SPANID-SAMPLED[-PARENTID]` in lowercase hex, with `SAMPLED`
//! omitted when no decision has been made.

use datadog_tracing::{dd_debug, sampling::priority};

use crate::{
    carrier::{Extractor, Injector},
    context::{Sampling, SpanContext},
};

const B3_KEY: &str = "b3";

pub(crate) fn keys() -> &'static [&'static str] {
    &[B3_KEY]
}

pub(crate) fn extract(carrier: &dyn Extractor) -> Option<SpanContext> {
    let header = carrier.get(B3_KEY)?;
    let mut fields = header.split('-');

    let trace_id = match fields.next().and_then(parse_trace_id) {
        Some(trace_id) if trace_id != 0 => trace_id,
        _ => {
            dd_debug!("b3 extract: invalid trace id in {header:?}");
            return None;
        }
    };
    let span_id = match fields.next().and_then(parse_hex_u64) {
        Some(span_id) => span_id,
        None => {
            dd_debug!("b3 extract: invalid span id in {header:?}");
            return None;
        }
    };

    // Sampled flag: "1" (or the debug flag "d") keeps, "0" drops; anything
    // else, or its absence, is "no decision".
    let sampling_priority = match fields.next() {
        Some("1") | Some("d") => Some(priority::AUTO_KEEP),
        Some("0") => Some(priority::AUTO_REJECT),
        _ => None,
    };

    Some(SpanContext {
        trace_id,
        span_id,
        sampling: Sampling {
            priority: sampling_priority,
            mechanism: None,
        },
        origin: None,
        tags: Default::default(),
    })
}

fn parse_hex_u64(raw: &str) -> Option<u64> {
    if raw.is_empty() || raw.len() > 16 {
        return None;
    }
    u64::from_str_radix(raw, 16).ok()
}

// 128-bit trace ids are accepted on the wire; the low 64 bits identify the
// trace here.
fn parse_trace_id(raw: &str) -> Option<u64> {
    match raw.len() {
        1..=16 => parse_hex_u64(raw),
        32 => parse_hex_u64(&raw[16..]),
        _ => None,
    }
}

pub(crate) fn inject(context: &SpanContext, carrier: &mut dyn Injector) {
    let mut value = format!("{:016x}-{:016x}", context.trace_id, context.span_id);
    if let Some(priority) = context.sampling.priority {
        value.push('-');
        value.push(if priority.is_keep() { '1' } else { '0' });
    }
    carrier.set(B3_KEY, value);
}
