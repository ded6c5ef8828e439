// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

pub mod configuration;
pub mod constants;
pub use configuration::Config;

mod error;
pub use error::{Error, ErrorCode, Result};

pub mod log;
pub mod sampling;
pub mod span_data;
pub mod time;

pub use span_data::{SpanConfig, SpanData};
pub use time::{Clock, TimePoint};
