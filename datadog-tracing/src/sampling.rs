// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{borrow::Cow, fmt, str::FromStr};

/// A sampling priority as transported across services: values below 1 mean
/// drop, values of 1 or more mean keep. 2 and -1 denote user-forced
/// decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SamplingPriority {
    value: i8,
}

impl SamplingPriority {
    pub const fn from_i8(value: i8) -> Self {
        Self { value }
    }

    pub fn into_i8(self) -> i8 {
        self.value
    }

    pub fn is_keep(&self) -> bool {
        self.value > 0
    }
}

pub mod priority {
    use super::SamplingPriority;

    pub const USER_REJECT: SamplingPriority = SamplingPriority::from_i8(-1);
    pub const AUTO_REJECT: SamplingPriority = SamplingPriority::from_i8(0);
    pub const AUTO_KEEP: SamplingPriority = SamplingPriority::from_i8(1);
    pub const USER_KEEP: SamplingPriority = SamplingPriority::from_i8(2);
}

impl fmt::Display for SamplingPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}

impl FromStr for SamplingPriority {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<i8>().map(SamplingPriority::from_i8).map_err(drop)
    }
}

/// Identifies which sampler produced a decision. Serialized as a
/// dash-prefixed decimal in the `_dd.p.dm` trace tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct SamplingMechanism {
    value: u8,
}

pub mod mechanism {
    use super::SamplingMechanism;

    pub const DEFAULT: SamplingMechanism = SamplingMechanism::from_u8(0);
    pub const AGENT_RATE_BY_SERVICE: SamplingMechanism = SamplingMechanism::from_u8(1);
    pub const LOCAL_USER_TRACE_SAMPLING_RULE: SamplingMechanism = SamplingMechanism::from_u8(3);
    pub const MANUAL: SamplingMechanism = SamplingMechanism::from_u8(4);
    pub const SPAN_SAMPLING_RULE: SamplingMechanism = SamplingMechanism::from_u8(8);
}

impl SamplingMechanism {
    pub const fn from_u8(value: u8) -> Self {
        Self { value }
    }

    pub fn into_u8(self) -> u8 {
        self.value
    }

    /// The priority pair implied by this mechanism: user-forced mechanisms
    /// report the USER priorities, everything else the AUTO ones.
    pub fn to_priority(&self, is_keep: bool) -> SamplingPriority {
        let user = matches!(
            *self,
            mechanism::MANUAL
                | mechanism::LOCAL_USER_TRACE_SAMPLING_RULE
                | mechanism::SPAN_SAMPLING_RULE
        );
        match (user, is_keep) {
            (true, true) => priority::USER_KEEP,
            (true, false) => priority::USER_REJECT,
            (false, true) => priority::AUTO_KEEP,
            (false, false) => priority::AUTO_REJECT,
        }
    }

    pub fn to_cow(&self) -> Cow<'static, str> {
        match *self {
            mechanism::DEFAULT => Cow::Borrowed("-0"),
            mechanism::AGENT_RATE_BY_SERVICE => Cow::Borrowed("-1"),
            mechanism::LOCAL_USER_TRACE_SAMPLING_RULE => Cow::Borrowed("-3"),
            mechanism::MANUAL => Cow::Borrowed("-4"),
            mechanism::SPAN_SAMPLING_RULE => Cow::Borrowed("-8"),
            _ => Cow::Owned(self.to_string()),
        }
    }
}

impl fmt::Display for SamplingMechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "-{}", self.value)
    }
}

impl FromStr for SamplingMechanism {
    type Err = ();

    /// Parses the `_dd.p.dm` representation, a dash-prefixed decimal.
    fn from_str(s: &str) -> Result<Self, ()> {
        let val: i16 = s.parse().map_err(drop)?;
        if val > 0 {
            return Err(());
        }
        let val = -val;
        if val > u8::MAX as i16 {
            return Err(());
        }
        Ok(SamplingMechanism::from_u8(val as u8))
    }
}

/// Where a sampling decision came from: made in this process, extracted from
/// an upstream service, or delegated to a downstream one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecisionOrigin {
    Local,
    Extracted,
    Delegated,
}

/// The sampling decision attached to a trace segment.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingDecision {
    pub priority: SamplingPriority,
    pub mechanism: Option<SamplingMechanism>,
    pub origin: DecisionOrigin,
}
