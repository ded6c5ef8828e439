// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

/// Numeric error codes. The discriminants are part of the public contract and
/// are stable across versions; new codes are only ever appended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
#[non_exhaustive]
pub enum ErrorCode {
    Other = 1,
    ServiceNameRequired = 2,
    RateOutOfRange = 3,
    RateLimitOutOfRange = 4,
    MaxPerSecondOutOfRange = 5,
    FlushIntervalOutOfRange = 6,
    TagMissingSeparator = 7,
    TraceSamplingRulesInvalidJson = 8,
    TraceSamplingRulesWrongType = 9,
    TraceSamplingRulesUnknownProperty = 10,
    SpanSamplingRulesInvalidJson = 11,
    SpanSamplingRulesWrongType = 12,
    SpanSamplingRulesUnknownProperty = 13,
    SpanSamplingRulesFileUnreadable = 14,
    UnknownPropagationStyle = 15,
    MissingPropagationStyle = 16,
    UrlMissingSeparator = 17,
    UrlUnsupportedScheme = 18,
    UrlUnixDomainSocketPathNotAbsolute = 19,
    NoSpanToExtract = 20,
    TagsInjectMaxSize = 21,
    MessagePackEncodeFailure = 22,
    AgentRequestFailure = 23,
    AgentResponseInvalidJson = 24,
}

impl ErrorCode {
    pub fn value(self) -> u32 {
        self as u32
    }
}

/// The error type used throughout the tracing client. Carries a stable
/// numeric [`ErrorCode`] and a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("[error code {}] {}", code.value(), message)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Error {
            code,
            message: message.into(),
        }
    }

    /// Returns a copy of this error with `prefix` prepended to the message.
    /// The code is preserved.
    #[must_use]
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let mut message = String::with_capacity(prefix.len() + self.message.len());
        message.push_str(prefix);
        message.push_str(&self.message);
        Error {
            code: self.code,
            message,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
