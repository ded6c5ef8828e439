// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::{
    collections::HashMap,
    fmt,
    str::FromStr,
    sync::OnceLock,
    time::Duration,
};

use crate::{
    configuration::{
        agent_url::AgentUrl,
        rules::{self, SpanSamplingRuleConfig, TraceSamplingRuleConfig},
        sources::{CompositeSource, ConfigSourceOrigin},
    },
    dd_error,
    log::LogLevel,
    Error, ErrorCode,
};

pub const TRACER_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const LANGUAGE: &str = "rust";
pub const LANGUAGE_VERSION: &str = env!("CARGO_PKG_RUST_VERSION");

const DEFAULT_TRACE_RATE_LIMIT: f64 = 200.0;
const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(2);
const DEFAULT_TAGS_PROPAGATION_MAX_LENGTH: usize = 512;

/// Span properties used when a `SpanConfig` leaves them unset.
#[derive(Debug, Clone, PartialEq)]
pub struct SpanDefaults {
    pub service: String,
    pub service_type: String,
    pub name: String,
    pub environment: Option<String>,
    pub version: Option<String>,
    pub tags: HashMap<String, String>,
}

impl Default for SpanDefaults {
    fn default() -> Self {
        SpanDefaults {
            service: String::new(),
            service_type: "web".to_string(),
            name: String::new(),
            environment: None,
            version: None,
            tags: HashMap::new(),
        }
    }
}

/// A trace-context wire style.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropagationStyle {
    Datadog,
    B3,
}

impl FromStr for PropagationStyle {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.eq_ignore_ascii_case("datadog") {
            Ok(PropagationStyle::Datadog)
        } else if s.eq_ignore_ascii_case("b3") {
            Ok(PropagationStyle::B3)
        } else {
            Err(())
        }
    }
}

impl fmt::Display for PropagationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropagationStyle::Datadog => write!(f, "datadog"),
            PropagationStyle::B3 => write!(f, "b3"),
        }
    }
}

/// Finalized, immutable configuration for the tracer.
///
/// # Usage
/// ```
/// use datadog_tracing::Config;
///
/// let mut builder = Config::builder();
/// builder
///     .set_service("my-service".to_string())
///     .set_env("staging".to_string());
/// let config = builder.build().expect("valid configuration");
/// ```
///
/// Values pulled from the environment always win over programmatic
/// overrides.
#[derive(Debug)]
#[non_exhaustive]
pub struct Config {
    runtime_id: &'static str,
    defaults: SpanDefaults,
    agent_url: AgentUrl,
    flush_interval: Duration,
    enabled: bool,
    startup_logs: bool,
    report_hostname: bool,
    log_level: LogLevel,
    trace_sampling_rules: Vec<TraceSamplingRuleConfig>,
    trace_rate_limit: f64,
    span_sampling_rules: Vec<SpanSamplingRuleConfig>,
    inject_styles: Vec<PropagationStyle>,
    extract_styles: Vec<PropagationStyle>,
    tags_propagation_max_length: usize,
    trace_id_128_bit: bool,
    telemetry_enabled: bool,
    origins: HashMap<&'static str, ConfigSourceOrigin>,
}

impl Config {
    /// Creates a builder seeded from the process environment.
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::with_sources(CompositeSource::default_sources())
    }

    /// Creates a builder reading "environment" values from `sources`
    /// instead of the process environment. Intended for tests.
    pub fn builder_with_sources(sources: CompositeSource) -> ConfigBuilder {
        ConfigBuilder::with_sources(sources)
    }

    pub fn runtime_id(&self) -> &str {
        self.runtime_id
    }

    pub fn tracer_version(&self) -> &'static str {
        TRACER_VERSION
    }

    pub fn language(&self) -> &'static str {
        LANGUAGE
    }

    pub fn language_version(&self) -> &'static str {
        LANGUAGE_VERSION
    }

    pub fn service(&self) -> &str {
        &self.defaults.service
    }

    pub fn env(&self) -> Option<&str> {
        self.defaults.environment.as_deref()
    }

    pub fn version(&self) -> Option<&str> {
        self.defaults.version.as_deref()
    }

    pub fn defaults(&self) -> &SpanDefaults {
        &self.defaults
    }

    pub fn agent_url(&self) -> &AgentUrl {
        &self.agent_url
    }

    pub fn flush_interval(&self) -> Duration {
        self.flush_interval
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn startup_logs(&self) -> bool {
        self.startup_logs
    }

    pub fn report_hostname(&self) -> bool {
        self.report_hostname
    }

    pub fn log_level(&self) -> LogLevel {
        self.log_level
    }

    pub fn trace_sampling_rules(&self) -> &[TraceSamplingRuleConfig] {
        &self.trace_sampling_rules
    }

    pub fn trace_rate_limit(&self) -> f64 {
        self.trace_rate_limit
    }

    pub fn span_sampling_rules(&self) -> &[SpanSamplingRuleConfig] {
        &self.span_sampling_rules
    }

    pub fn inject_styles(&self) -> &[PropagationStyle] {
        &self.inject_styles
    }

    pub fn extract_styles(&self) -> &[PropagationStyle] {
        &self.extract_styles
    }

    pub fn tags_propagation_max_length(&self) -> usize {
        self.tags_propagation_max_length
    }

    pub fn trace_id_128_bit(&self) -> bool {
        self.trace_id_128_bit
    }

    pub fn telemetry_enabled(&self) -> bool {
        self.telemetry_enabled
    }

    /// Which source supplied the effective value of `key` (an environment
    /// variable name), if the key was resolved during finalization.
    pub fn origin_of(&self, key: &str) -> Option<ConfigSourceOrigin> {
        self.origins.get(key).copied()
    }

    /// A JSON rendering of the effective configuration, used by the startup
    /// banner.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "version": self.tracer_version(),
            "language": self.language(),
            "language_version": self.language_version(),
            "runtime_id": self.runtime_id(),
            "service": self.service(),
            "env": self.env(),
            "app_version": self.version(),
            "agent_url": self.agent_url.original(),
            "enabled": self.enabled,
            "report_hostname": self.report_hostname,
            "flush_interval_ms": self.flush_interval.as_millis() as u64,
            "trace_rate_limit": self.trace_rate_limit,
            "trace_sampling_rules_count": self.trace_sampling_rules.len(),
            "span_sampling_rules_count": self.span_sampling_rules.len(),
            "propagation_style_inject": self.inject_styles.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "propagation_style_extract": self.extract_styles.iter().map(ToString::to_string).collect::<Vec<_>>(),
            "128_bit_trace_ids": self.trace_id_128_bit,
            "telemetry_enabled": self.telemetry_enabled,
        })
    }

    fn process_runtime_id() -> &'static str {
        static RUNTIME_ID: OnceLock<String> = OnceLock::new();
        RUNTIME_ID.get_or_init(|| uuid::Uuid::new_v4().to_string())
    }
}

/// Case-insensitive truthy parse: `"0"`, `"false"` and `"no"` are false,
/// everything else (the empty string included) is true.
fn parse_truthy(value: &str) -> bool {
    !(value.eq_ignore_ascii_case("0")
        || value.eq_ignore_ascii_case("false")
        || value.eq_ignore_ascii_case("no"))
}

/// Splits a `DD_TAGS`-style list: `k:v` entries separated by commas and/or
/// spaces. A later entry overwrites an earlier one with the same key.
fn parse_tags(raw: &str) -> Result<Vec<(String, String)>, Error> {
    let mut entries = Vec::new();
    for token in raw.split([',', ' ']) {
        if token.is_empty() {
            continue;
        }
        let Some((key, value)) = token.split_once(':') else {
            return Err(Error::new(
                ErrorCode::TagMissingSeparator,
                format!("tag {token:?} in {raw:?} is missing the \":\" separator"),
            ));
        };
        if key.is_empty() {
            return Err(Error::new(
                ErrorCode::TagMissingSeparator,
                format!("tag {token:?} in {raw:?} has an empty name"),
            ));
        }
        entries.push((key.to_string(), value.to_string()));
    }
    Ok(entries)
}

/// Parses a comma- and/or space-separated, case-insensitive style list.
/// Empty tokens and unknown names are errors.
fn parse_styles(raw: &str, source_name: &str) -> Result<Vec<PropagationStyle>, Error> {
    let mut styles = Vec::new();
    for part in raw.split(',') {
        let trimmed = part.trim();
        if trimmed.is_empty() {
            return Err(Error::new(
                ErrorCode::UnknownPropagationStyle,
                format!("{source_name} contains an empty entry: {raw:?}"),
            ));
        }
        for token in trimmed.split_whitespace() {
            let style = token.parse::<PropagationStyle>().map_err(|()| {
                Error::new(
                    ErrorCode::UnknownPropagationStyle,
                    format!("unknown propagation style {token:?} in {source_name}; expected one of: datadog, b3"),
                )
            })?;
            if !styles.contains(&style) {
                styles.push(style);
            }
        }
    }
    Ok(styles)
}

/// Resolves each configuration key with the precedence environment >
/// programmatic override > default, recording the winning origin.
struct Resolver<'a> {
    sources: &'a CompositeSource,
    origins: HashMap<&'static str, ConfigSourceOrigin>,
}

impl Resolver<'_> {
    fn resolve(&mut self, key: &'static str, code_value: Option<String>) -> Option<String> {
        if let Some(found) = self.sources.get(key) {
            self.origins.insert(key, found.origin);
            return Some(found.value);
        }
        if let Some(value) = code_value {
            self.origins.insert(key, ConfigSourceOrigin::Code);
            return Some(value);
        }
        self.origins.insert(key, ConfigSourceOrigin::Default);
        None
    }
}

#[derive(Default)]
pub struct ConfigBuilder {
    sources: CompositeSource,
    service: Option<String>,
    env: Option<String>,
    version: Option<String>,
    tags: Vec<(String, String)>,
    service_type: Option<String>,
    operation_name: Option<String>,
    agent_url: Option<String>,
    flush_interval: Option<Duration>,
    enabled: Option<bool>,
    startup_logs: Option<bool>,
    report_hostname: Option<bool>,
    log_level: Option<LogLevel>,
    trace_sample_rate: Option<f64>,
    trace_rate_limit: Option<f64>,
    trace_sampling_rules: Option<String>,
    span_sampling_rules: Option<String>,
    inject_styles: Option<Vec<PropagationStyle>>,
    extract_styles: Option<Vec<PropagationStyle>>,
    tags_propagation_max_length: Option<usize>,
    trace_id_128_bit: Option<bool>,
    telemetry_enabled: Option<bool>,
}

impl ConfigBuilder {
    fn with_sources(sources: CompositeSource) -> Self {
        ConfigBuilder {
            sources,
            ..Default::default()
        }
    }

    pub fn set_service(&mut self, service: String) -> &mut Self {
        self.service = Some(service);
        self
    }

    pub fn set_env(&mut self, env: String) -> &mut Self {
        self.env = Some(env);
        self
    }

    pub fn set_version(&mut self, version: String) -> &mut Self {
        self.version = Some(version);
        self
    }

    pub fn set_service_type(&mut self, service_type: String) -> &mut Self {
        self.service_type = Some(service_type);
        self
    }

    pub fn set_operation_name(&mut self, name: String) -> &mut Self {
        self.operation_name = Some(name);
        self
    }

    pub fn add_tag(&mut self, key: String, value: String) -> &mut Self {
        self.tags.push((key, value));
        self
    }

    pub fn set_agent_url(&mut self, url: String) -> &mut Self {
        self.agent_url = Some(url);
        self
    }

    pub fn set_flush_interval(&mut self, interval: Duration) -> &mut Self {
        self.flush_interval = Some(interval);
        self
    }

    pub fn set_enabled(&mut self, enabled: bool) -> &mut Self {
        self.enabled = Some(enabled);
        self
    }

    pub fn set_startup_logs(&mut self, enabled: bool) -> &mut Self {
        self.startup_logs = Some(enabled);
        self
    }

    pub fn set_report_hostname(&mut self, enabled: bool) -> &mut Self {
        self.report_hostname = Some(enabled);
        self
    }

    pub fn set_log_level(&mut self, log_level: LogLevel) -> &mut Self {
        self.log_level = Some(log_level);
        self
    }

    pub fn set_trace_sample_rate(&mut self, sample_rate: f64) -> &mut Self {
        self.trace_sample_rate = Some(sample_rate);
        self
    }

    pub fn set_trace_rate_limit(&mut self, rate_limit: f64) -> &mut Self {
        self.trace_rate_limit = Some(rate_limit);
        self
    }

    pub fn set_trace_sampling_rules(&mut self, rules_json: String) -> &mut Self {
        self.trace_sampling_rules = Some(rules_json);
        self
    }

    pub fn set_span_sampling_rules(&mut self, rules_json: String) -> &mut Self {
        self.span_sampling_rules = Some(rules_json);
        self
    }

    pub fn set_propagation_style_inject(&mut self, styles: Vec<PropagationStyle>) -> &mut Self {
        self.inject_styles = Some(styles);
        self
    }

    pub fn set_propagation_style_extract(&mut self, styles: Vec<PropagationStyle>) -> &mut Self {
        self.extract_styles = Some(styles);
        self
    }

    pub fn set_tags_propagation_max_length(&mut self, max_length: usize) -> &mut Self {
        self.tags_propagation_max_length = Some(max_length);
        self
    }

    pub fn set_trace_id_128_bit(&mut self, enabled: bool) -> &mut Self {
        self.trace_id_128_bit = Some(enabled);
        self
    }

    pub fn set_telemetry_enabled(&mut self, enabled: bool) -> &mut Self {
        self.telemetry_enabled = Some(enabled);
        self
    }

    /// Validates and finalizes the configuration. The first error
    /// encountered is returned.
    pub fn build(self) -> Result<Config, Error> {
        let mut resolver = Resolver {
            sources: &self.sources,
            origins: HashMap::new(),
        };

        let service = resolver
            .resolve("DD_SERVICE", self.service)
            .unwrap_or_default();
        if service.is_empty() {
            return Err(Error::new(
                ErrorCode::ServiceNameRequired,
                "a service name is required; set DD_SERVICE or ConfigBuilder::set_service",
            ));
        }

        let environment = resolver.resolve("DD_ENV", self.env);
        let version = resolver.resolve("DD_VERSION", self.version);

        let mut tags: HashMap<String, String> = self.tags.into_iter().collect();
        if let Some(raw) = resolver.resolve("DD_TAGS", None) {
            for (key, value) in parse_tags(&raw)? {
                tags.insert(key, value);
            }
        }

        let enabled = resolver
            .resolve("DD_TRACE_ENABLED", self.enabled.map(|b| b.to_string()))
            .map_or(true, |v| parse_truthy(&v));
        let startup_logs = resolver
            .resolve(
                "DD_TRACE_STARTUP_LOGS",
                self.startup_logs.map(|b| b.to_string()),
            )
            .map_or(true, |v| parse_truthy(&v));
        let trace_id_128_bit = resolver
            .resolve(
                "DD_TRACE_128_BIT_TRACEID_GENERATION_ENABLED",
                self.trace_id_128_bit.map(|b| b.to_string()),
            )
            .map_or(false, |v| parse_truthy(&v));
        let telemetry_enabled = resolver
            .resolve(
                "DD_INSTRUMENTATION_TELEMETRY_ENABLED",
                self.telemetry_enabled.map(|b| b.to_string()),
            )
            .map_or(true, |v| parse_truthy(&v));

        let log_level = match resolver.resolve(
            "DD_LOG_LEVEL",
            self.log_level.map(|level| level.to_string()),
        ) {
            Some(raw) => raw
                .parse::<LogLevel>()
                .map_err(|e| Error::new(ErrorCode::Other, format!("DD_LOG_LEVEL: {e}")))?,
            None => LogLevel::default(),
        };

        let trace_sample_rate = match resolver.resolve(
            "DD_TRACE_SAMPLE_RATE",
            self.trace_sample_rate.map(|rate| rate.to_string()),
        ) {
            Some(raw) => {
                let rate = raw.parse::<f64>().map_err(|_| {
                    Error::new(
                        ErrorCode::RateOutOfRange,
                        format!("DD_TRACE_SAMPLE_RATE is not a number: {raw:?}"),
                    )
                })?;
                if !(0.0..=1.0).contains(&rate) || rate.is_nan() {
                    return Err(Error::new(
                        ErrorCode::RateOutOfRange,
                        format!("DD_TRACE_SAMPLE_RATE {rate} is not within [0, 1]"),
                    ));
                }
                Some(rate)
            }
            None => None,
        };

        let trace_rate_limit = match resolver.resolve(
            "DD_TRACE_RATE_LIMIT",
            self.trace_rate_limit.map(|limit| limit.to_string()),
        ) {
            Some(raw) => {
                let limit = raw.parse::<f64>().map_err(|_| {
                    Error::new(
                        ErrorCode::RateLimitOutOfRange,
                        format!("DD_TRACE_RATE_LIMIT is not a number: {raw:?}"),
                    )
                })?;
                if !(limit > 0.0) || !limit.is_finite() {
                    return Err(Error::new(
                        ErrorCode::RateLimitOutOfRange,
                        format!("DD_TRACE_RATE_LIMIT {limit} must be greater than zero"),
                    ));
                }
                limit
            }
            None => DEFAULT_TRACE_RATE_LIMIT,
        };

        let mut trace_sampling_rules =
            match resolver.resolve("DD_TRACE_SAMPLING_RULES", self.trace_sampling_rules) {
                Some(raw) => rules::parse_trace_rules(&raw, "DD_TRACE_SAMPLING_RULES")?,
                None => Vec::new(),
            };
        if let Some(sample_rate) = trace_sample_rate {
            // The configured overall sample rate becomes a catch-all rule
            // appended after any explicit rules.
            trace_sampling_rules.push(TraceSamplingRuleConfig {
                sample_rate,
                ..Default::default()
            });
        }

        let span_rules_inline =
            resolver.resolve("DD_SPAN_SAMPLING_RULES", self.span_sampling_rules);
        let span_rules_file = resolver.resolve("DD_SPAN_SAMPLING_RULES_FILE", None);
        let span_sampling_rules = match (span_rules_inline, span_rules_file) {
            (Some(raw), file) => {
                if file.is_some() {
                    dd_error!(
                        "DD_SPAN_SAMPLING_RULES_FILE is ignored because DD_SPAN_SAMPLING_RULES is set"
                    );
                }
                rules::parse_span_rules(&raw, "DD_SPAN_SAMPLING_RULES")?
            }
            (None, Some(path)) => {
                let raw = std::fs::read_to_string(&path).map_err(|e| {
                    Error::new(
                        ErrorCode::SpanSamplingRulesFileUnreadable,
                        format!("unable to read DD_SPAN_SAMPLING_RULES_FILE {path:?}: {e}"),
                    )
                })?;
                rules::parse_span_rules(&raw, "DD_SPAN_SAMPLING_RULES_FILE")?
            }
            (None, None) => Vec::new(),
        };

        let agent_url = match resolver.resolve("DD_TRACE_AGENT_URL", self.agent_url) {
            Some(raw) => AgentUrl::parse(&raw)?,
            None => {
                let host = resolver
                    .resolve("DD_AGENT_HOST", None)
                    .unwrap_or_else(|| "localhost".to_string());
                let port = match resolver.resolve("DD_TRACE_AGENT_PORT", None) {
                    Some(raw) => raw.parse::<u16>().map_err(|_| {
                        Error::new(
                            ErrorCode::Other,
                            format!("DD_TRACE_AGENT_PORT is not a valid port: {raw:?}"),
                        )
                    })?,
                    None => 8126,
                };
                AgentUrl::from_host_port(&host, port)
            }
        };

        let inject_styles = match resolver.resolve(
            "DD_PROPAGATION_STYLE_INJECT",
            self.inject_styles.map(render_styles),
        ) {
            Some(raw) => parse_styles(&raw, "DD_PROPAGATION_STYLE_INJECT")?,
            None => vec![PropagationStyle::Datadog],
        };
        let extract_styles = match resolver.resolve(
            "DD_PROPAGATION_STYLE_EXTRACT",
            self.extract_styles.map(render_styles),
        ) {
            Some(raw) => parse_styles(&raw, "DD_PROPAGATION_STYLE_EXTRACT")?,
            None => vec![PropagationStyle::Datadog],
        };

        let flush_interval = self.flush_interval.unwrap_or(DEFAULT_FLUSH_INTERVAL);
        if flush_interval.is_zero() {
            return Err(Error::new(
                ErrorCode::FlushIntervalOutOfRange,
                "the flush interval must be strictly positive",
            ));
        }

        Ok(Config {
            runtime_id: Config::process_runtime_id(),
            defaults: SpanDefaults {
                service,
                service_type: self.service_type.unwrap_or_else(|| "web".to_string()),
                name: self.operation_name.unwrap_or_default(),
                environment,
                version,
                tags,
            },
            agent_url,
            flush_interval,
            enabled,
            startup_logs,
            report_hostname: self.report_hostname.unwrap_or(false),
            log_level,
            trace_sampling_rules,
            trace_rate_limit,
            span_sampling_rules,
            inject_styles,
            extract_styles,
            tags_propagation_max_length: self
                .tags_propagation_max_length
                .unwrap_or(DEFAULT_TAGS_PROPAGATION_MAX_LENGTH),
            trace_id_128_bit,
            telemetry_enabled,
            origins: resolver.origins,
        })
    }
}

fn render_styles(styles: Vec<PropagationStyle>) -> String {
    styles
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
