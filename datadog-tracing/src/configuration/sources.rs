// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::collections::HashMap;

/// Source of a configuration value, recorded per key so the startup banner
/// can report where each effective value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSourceOrigin {
    Default,
    EnvVar,
    Code,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConfigValue {
    pub value: String,
    pub origin: ConfigSourceOrigin,
}

/// A source of raw (string) configuration values.
pub trait ConfigurationSource {
    fn origin(&self) -> ConfigSourceOrigin;

    fn get(&self, key: &'static str) -> Option<String>;
}

/// Composes multiple sources of configuration. Sources added first have the
/// higher precedence.
#[derive(Default)]
pub struct CompositeSource {
    sources: Vec<Box<dyn ConfigurationSource>>,
}

impl CompositeSource {
    pub fn new() -> Self {
        CompositeSource::default()
    }

    pub fn add_source<C: ConfigurationSource + 'static>(&mut self, source: C) {
        self.sources.push(Box::new(source));
    }

    pub fn default_sources() -> Self {
        let mut sources = Self::new();
        sources.add_source(EnvSource);
        sources
    }

    /// Returns the first value any source supplies for `key`, together with
    /// the origin of the source that supplied it.
    pub fn get(&self, key: &'static str) -> Option<ConfigValue> {
        self.sources.iter().find_map(|source| {
            source.get(key).map(|value| ConfigValue {
                value,
                origin: source.origin(),
            })
        })
    }
}

/// Reads from the process environment.
pub struct EnvSource;

impl ConfigurationSource for EnvSource {
    fn origin(&self) -> ConfigSourceOrigin {
        ConfigSourceOrigin::EnvVar
    }

    fn get(&self, key: &'static str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// A source backed by a map. Lets tests supply "environment" values without
/// mutating the process environment, which is not portable.
pub struct HashMapSource {
    map: HashMap<String, String>,
    origin: ConfigSourceOrigin,
}

impl HashMapSource {
    pub fn from_iter<U: ToString, V: ToString, T: IntoIterator<Item = (U, V)>>(
        entries: T,
        origin: ConfigSourceOrigin,
    ) -> Self {
        HashMapSource {
            map: entries
                .into_iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            origin,
        }
    }
}

impl ConfigurationSource for HashMapSource {
    fn origin(&self) -> ConfigSourceOrigin {
        self.origin
    }

    fn get(&self, key: &'static str) -> Option<String> {
        self.map.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_composite_returns_first_match() {
        let mut source = CompositeSource::new();
        source.add_source(HashMapSource::from_iter(
            [("DD_SERVICE", "from-env")],
            ConfigSourceOrigin::EnvVar,
        ));
        source.add_source(HashMapSource::from_iter(
            [("DD_SERVICE", "from-default"), ("DD_ENV", "prod")],
            ConfigSourceOrigin::Default,
        ));

        assert_eq!(
            source.get("DD_SERVICE"),
            Some(ConfigValue {
                value: "from-env".to_string(),
                origin: ConfigSourceOrigin::EnvVar,
            })
        );
        assert_eq!(
            source.get("DD_ENV"),
            Some(ConfigValue {
                value: "prod".to_string(),
                origin: ConfigSourceOrigin::Default,
            })
        );
        assert_eq!(source.get("DD_VERSION"), None);
    }
}
