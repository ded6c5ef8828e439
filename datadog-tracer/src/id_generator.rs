// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use rand::Rng;

/// Source of span and trace ids.
pub trait IdGenerator: Send + Sync {
    /// A uniformly distributed non-zero 64-bit id.
    fn new_id(&self) -> u64;
}

/// The default generator, backed by the thread-local RNG.
#[derive(Debug, Default)]
pub struct RandomIdGenerator;

impl IdGenerator for RandomIdGenerator {
    fn new_id(&self) -> u64 {
        let mut rng = rand::thread_rng();
        loop {
            let id = rng.gen::<u64>();
            if id != 0 {
                return id;
            }
        }
    }
}
