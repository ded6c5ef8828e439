// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

mod agent_url;
#[allow(clippy::module_inception)]
mod configuration;
mod rules;
pub mod sources;

pub use agent_url::{AgentTransport, AgentUrl};
pub use configuration::{
    Config, ConfigBuilder, PropagationStyle, SpanDefaults, LANGUAGE, TRACER_VERSION,
};
pub use rules::{SpanSamplingRuleConfig, TraceSamplingRuleConfig};
