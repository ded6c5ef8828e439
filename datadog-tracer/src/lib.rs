// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A Datadog distributed-tracing client.
//!
//! A [`Tracer`] creates [`Span`]s, either fresh or continuing a trace
//! extracted from inbound request headers. Spans belonging to the same
//! trace within this process share a [`TraceSegment`]; when the last span
//! of a segment finishes, the segment decides sampling and hands the
//! finished spans to the collector, by default a batching uploader that
//! speaks the agent's `v0.4` msgpack protocol.
//!
//! ```no_run
//! use datadog_tracing::Config;
//! use datadog_tracer::Tracer;
//!
//! let mut builder = Config::builder();
//! builder.set_service("my-service".to_string());
//! let tracer = Tracer::new(builder.build()?)?;
//!
//! let mut span = tracer.create_span();
//! span.set_name("handle.request");
//! span.set_resource_name("/api/v1/info");
//! let mut child = span.create_child();
//! child.set_name("db.query");
//! # Ok::<(), datadog_tracing::Error>(())
//! ```

mod collector;
mod datadog_agent;
mod http_client;
mod id_generator;
mod msgpack;
mod scheduler;
mod span;
mod trace_segment;
mod tracer;

pub use collector::Collector;
pub use datadog_agent::DatadogAgent;
pub use http_client::{HttpClient, HttpResponse, ReqwestClient};
pub use id_generator::{IdGenerator, RandomIdGenerator};
pub use scheduler::{CancelToken, EventScheduler, ThreadedEventScheduler};
pub use span::Span;
pub use trace_segment::TraceSegment;
pub use tracer::Tracer;

pub use datadog_tracing::{Config, Error, ErrorCode, Result, SpanConfig, SpanData};
