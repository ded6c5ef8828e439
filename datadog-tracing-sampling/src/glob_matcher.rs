// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::num::NonZeroUsize;
use std::sync::Mutex;

use lru::LruCache;

/// A backtracking implementation of the glob matching algorithm.
///
/// The pattern language supports `*` as a wildcard for any run of
/// characters (including the empty run) and `?` as a wildcard for exactly
/// one character. Matching is case sensitive and operates on raw bytes.
///
/// Holds an LRU cache of recent subjects for faster repeated matching.
pub struct GlobMatcher {
    pattern: String,
    cache: Mutex<LruCache<String, bool>>,
}

const CACHE_SIZE: usize = 256;

impl GlobMatcher {
    pub fn new(pattern: &str) -> Self {
        GlobMatcher {
            pattern: pattern.to_string(),
            cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(CACHE_SIZE).expect("cache size is non-zero"),
            )),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Returns whether `subject` matches the glob pattern.
    pub fn matches(&self, subject: &str) -> bool {
        {
            let mut cache = self.cache.lock().unwrap();
            if let Some(&hit) = cache.get(subject) {
                return hit;
            }
        }

        let result = glob_match(self.pattern.as_bytes(), subject.as_bytes());

        let mut cache = self.cache.lock().unwrap();
        cache.put(subject.to_string(), result);
        result
    }
}

fn glob_match(pattern: &[u8], subject: &[u8]) -> bool {
    // Indices into pattern and subject, plus the positions to resume from
    // when backtracking to the most recent `*`.
    let mut px = 0;
    let mut sx = 0;
    let mut next_px = 0;
    let mut next_sx = 0;

    while px < pattern.len() || sx < subject.len() {
        if px < pattern.len() {
            match pattern[px] {
                b'?' => {
                    if sx < subject.len() {
                        px += 1;
                        sx += 1;
                        continue;
                    }
                }
                b'*' => {
                    next_px = px;
                    next_sx = sx + 1;
                    px += 1;
                    continue;
                }
                literal => {
                    if sx < subject.len() && subject[sx] == literal {
                        px += 1;
                        sx += 1;
                        continue;
                    }
                }
            }
        }
        if 0 < next_sx && next_sx <= subject.len() {
            px = next_px;
            sx = next_sx;
            continue;
        }
        return false;
    }
    true
}

impl fmt::Debug for GlobMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlobMatcher")
            .field("pattern", &self.pattern)
            .finish()
    }
}

impl Clone for GlobMatcher {
    fn clone(&self) -> Self {
        // Each instance maintains its own cache.
        GlobMatcher::new(&self.pattern)
    }
}
