// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Encoding of finished traces in the agent's `v0.4` format: a msgpack
//! array of arrays of span maps, each map carrying exactly twelve entries
//! in a fixed key order.

use datadog_tracing::{Error, ErrorCode, Result, SpanData};

fn encode_error(e: impl std::fmt::Debug) -> Error {
    Error::new(
        ErrorCode::MessagePackEncodeFailure,
        format!("msgpack encoding failed: {e:?}"),
    )
}

/// Appends the encoding of `traces` to `destination`.
pub fn encode_traces(destination: &mut Vec<u8>, traces: &[Vec<SpanData>]) -> Result<()> {
    use rmp::encode;

    encode::write_array_len(destination, traces.len() as u32).map_err(encode_error)?;
    for trace in traces {
        encode::write_array_len(destination, trace.len() as u32).map_err(encode_error)?;
        for span in trace {
            encode_span(destination, span)?;
        }
    }
    Ok(())
}

fn encode_span(destination: &mut Vec<u8>, span: &SpanData) -> Result<()> {
    use rmp::encode;

    encode::write_map_len(destination, 12).map_err(encode_error)?;

    encode::write_str(destination, "service").map_err(encode_error)?;
    encode::write_str(destination, &span.service).map_err(encode_error)?;

    encode::write_str(destination, "name").map_err(encode_error)?;
    encode::write_str(destination, &span.name).map_err(encode_error)?;

    encode::write_str(destination, "resource").map_err(encode_error)?;
    encode::write_str(destination, &span.resource).map_err(encode_error)?;

    encode::write_str(destination, "trace_id").map_err(encode_error)?;
    encode::write_u64(destination, span.trace_id).map_err(encode_error)?;

    encode::write_str(destination, "span_id").map_err(encode_error)?;
    encode::write_u64(destination, span.span_id).map_err(encode_error)?;

    encode::write_str(destination, "parent_id").map_err(encode_error)?;
    encode::write_u64(destination, span.parent_id).map_err(encode_error)?;

    encode::write_str(destination, "start").map_err(encode_error)?;
    encode::write_i64(destination, span.start.wall_nanos() as i64).map_err(encode_error)?;

    encode::write_str(destination, "duration").map_err(encode_error)?;
    encode::write_i64(destination, span.duration.as_nanos() as i64).map_err(encode_error)?;

    encode::write_str(destination, "error").map_err(encode_error)?;
    encode::write_i32(destination, i32::from(span.error)).map_err(encode_error)?;

    encode::write_str(destination, "meta").map_err(encode_error)?;
    encode::write_map_len(destination, span.tags.len() as u32).map_err(encode_error)?;
    for (key, value) in &span.tags {
        encode::write_str(destination, key).map_err(encode_error)?;
        encode::write_str(destination, value).map_err(encode_error)?;
    }

    encode::write_str(destination, "metrics").map_err(encode_error)?;
    encode::write_map_len(destination, span.numeric_tags.len() as u32).map_err(encode_error)?;
    for (key, value) in &span.numeric_tags {
        encode::write_str(destination, key).map_err(encode_error)?;
        encode::write_f64(destination, *value).map_err(encode_error)?;
    }

    encode::write_str(destination, "type").map_err(encode_error)?;
    encode::write_str(destination, &span.service_type).map_err(encode_error)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_payload() {
        let mut encoded = Vec::new();
        encode_traces(&mut encoded, &[]).unwrap();
        // fixarray of length 0
        assert_eq!(encoded, vec![0x90]);
    }

    #[test]
    fn test_shape_of_one_trace() {
        let mut span = SpanData::with_ids(1, 2, 0);
        span.service = "svc".to_string();
        span.name = "op".to_string();
        span.resource = "res".to_string();
        span.service_type = "web".to_string();

        let mut encoded = Vec::new();
        encode_traces(&mut encoded, &[vec![span]]).unwrap();

        // [ [ {12 keys...} ] ]
        assert_eq!(encoded[0], 0x91, "outer fixarray of one trace");
        assert_eq!(encoded[1], 0x91, "inner fixarray of one span");
        assert_eq!(encoded[2], 0x8c, "fixmap with 12 entries");
        // First key is "service": fixstr of length 7 followed by the bytes.
        assert_eq!(encoded[3], 0xa7);
        assert_eq!(&encoded[4..11], b"service");
    }

    #[test]
    fn test_key_order() {
        let span = SpanData::with_ids(1, 2, 0);
        let mut encoded = Vec::new();
        encode_traces(&mut encoded, &[vec![span]]).unwrap();

        let expected_order: [&[u8]; 12] = [
            b"service", b"name", b"resource", b"trace_id", b"span_id", b"parent_id", b"start",
            b"duration", b"error", b"meta", b"metrics", b"type",
        ];
        let mut last = 0;
        for key in expected_order {
            let position = encoded
                .windows(key.len())
                .position(|window| window == key)
                .unwrap_or_else(|| panic!("key {:?} missing", String::from_utf8_lossy(key)));
            assert!(
                position >= last,
                "key {:?} out of order",
                String::from_utf8_lossy(key)
            );
            last = position;
        }
    }
}
