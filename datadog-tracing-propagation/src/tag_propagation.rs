// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Serialization of the propagated trace tags carried in the
//! `x-datadog-tags` header: comma-separated `key=value` pairs without
//! whitespace, e.g.
//!
//! ```text
//! _dd.p.dm=-3,_dd.p.usr.id=1234
//! ```
//!
//! Only `_dd.p.`-prefixed keys survive decoding; other pairs are ignored.

use std::collections::HashMap;

use lazy_static::lazy_static;
use regex::Regex;

use datadog_tracing::{constants::PROPAGATION_TAG_PREFIX, Error, ErrorCode};

lazy_static! {
    static ref PROPAGATED_KEY_REGEX: Regex =
        Regex::new(r"^_dd\.p\.[A-Za-z0-9_]+$").expect("failed creating regex");
}

fn valid_value(value: &str) -> bool {
    value
        .bytes()
        .all(|b| (0x20..=0x7e).contains(&b) && b != b',' && b != b'=')
}

/// Parses a header value into the propagated-tags mapping. Malformed pairs
/// fail the whole decode.
pub fn decode_tags(header_value: &str) -> Result<HashMap<String, String>, Error> {
    let mut tags = HashMap::new();
    for pair in header_value.split(',') {
        let Some((key, value)) = pair.split_once('=') else {
            return Err(Error::new(
                ErrorCode::Other,
                format!("propagated tag {pair:?} is missing the \"=\" separator"),
            ));
        };
        if !key.starts_with(PROPAGATION_TAG_PREFIX) {
            continue;
        }
        if !PROPAGATED_KEY_REGEX.is_match(key) || !valid_value(value) {
            return Err(Error::new(
                ErrorCode::Other,
                format!("propagated tag {pair:?} is malformed"),
            ));
        }
        tags.insert(key.to_string(), value.to_string());
    }
    Ok(tags)
}

/// Serializes `tags` into the propagation format. The caller is responsible
/// for enforcing the configured size cap.
pub fn encode_tags(tags: &HashMap<String, String>) -> String {
    let mut encoded = String::new();
    for (key, value) in tags {
        if !encoded.is_empty() {
            encoded.push(',');
        }
        encoded.push_str(key);
        encoded.push('=');
        encoded.push_str(value);
    }
    encoded
}
