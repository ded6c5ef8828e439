// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! The agent uploader: batches finished traces, encodes them in the `v0.4`
//! msgpack format, sends them to the agent on a fixed cadence, and feeds
//! the agent's per-service sample rates back into the trace sampler.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex, OnceLock},
};

use regex::Regex;
use serde::Deserialize;

use datadog_tracing::{dd_debug, dd_error, dd_warn, Config, Result, SpanData};
use datadog_tracing_sampling::TraceSampler;

use crate::{
    collector::Collector,
    http_client::HttpClient,
    msgpack,
    scheduler::{CancelToken, EventScheduler},
};

/// Bound on the number of finished-trace batches held between flushes.
/// When producers outrun the agent, the oldest batches are dropped;
/// producer threads are never blocked.
const MAX_QUEUED_BATCHES: usize = 1024;

const TRACES_PATH: &str = "/v0.4/traces";

pub struct DatadogAgent {
    inner: Arc<AgentInner>,
    cancel: CancelToken,
    _scheduler: Box<dyn EventScheduler>,
}

struct AgentInner {
    config: Arc<Config>,
    trace_sampler: Arc<TraceSampler>,
    http_client: Box<dyn HttpClient>,
    queue: Mutex<VecDeque<Vec<SpanData>>>,
    container_id: Option<String>,
}

/// The interesting part of the agent's response to a traces request.
#[derive(Debug, Deserialize)]
struct AgentResponse {
    #[serde(default)]
    rate_by_service: HashMap<String, f64>,
}

impl DatadogAgent {
    /// Starts the uploader: registers a recurring flush with `scheduler`
    /// at the configured interval.
    pub fn new(
        config: Arc<Config>,
        trace_sampler: Arc<TraceSampler>,
        http_client: Box<dyn HttpClient>,
        scheduler: Box<dyn EventScheduler>,
    ) -> DatadogAgent {
        let inner = Arc::new(AgentInner {
            trace_sampler,
            http_client,
            queue: Mutex::new(VecDeque::new()),
            container_id: container_id(),
            config: config.clone(),
        });
        let flusher = inner.clone();
        let cancel = scheduler.schedule_recurring(
            config.flush_interval(),
            Box::new(move || flusher.flush()),
        );
        DatadogAgent {
            inner,
            cancel,
            _scheduler: scheduler,
        }
    }

    /// Drains the queue and sends everything now, on the calling thread.
    pub fn flush(&self) {
        self.inner.flush();
    }
}

impl Collector for DatadogAgent {
    fn send(&self, batch: Vec<SpanData>) -> Result<()> {
        let mut queue = self.inner.queue.lock().unwrap();
        if queue.len() >= MAX_QUEUED_BATCHES {
            queue.pop_front();
            dd_warn!("trace queue is full; dropped the oldest batch");
        }
        queue.push_back(batch);
        Ok(())
    }
}

impl Drop for DatadogAgent {
    fn drop(&mut self) {
        // One final drain; anything that fails now is lost by design.
        self.inner.flush();
        self.cancel.cancel();
    }
}

impl AgentInner {
    fn flush(&self) {
        let batches: Vec<Vec<SpanData>> = {
            let mut queue = self.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        if batches.is_empty() {
            return;
        }
        let trace_count = batches.len();

        let mut body = Vec::new();
        if let Err(e) = msgpack::encode_traces(&mut body, &batches) {
            dd_error!("discarding {trace_count} trace(s): {e}");
            return;
        }

        let response = self.http_client.put(
            self.config.agent_url(),
            TRACES_PATH,
            &self.request_headers(trace_count),
            body,
            self.config.flush_interval(),
        );
        match response {
            Ok(response) if (200..300).contains(&response.status) => {
                self.handle_agent_response(&response.body);
            }
            Ok(response) => {
                dd_error!(
                    "agent returned status {} for {trace_count} trace(s): {}",
                    response.status,
                    response.body
                );
            }
            Err(e) => {
                dd_error!("failed to send {trace_count} trace(s): {e}");
            }
        }
    }

    fn request_headers(&self, trace_count: usize) -> Vec<(&'static str, String)> {
        let mut headers = vec![
            ("Content-Type", "application/msgpack".to_string()),
            ("Datadog-Meta-Lang", self.config.language().to_string()),
            (
                "Datadog-Meta-Lang-Version",
                self.config.language_version().to_string(),
            ),
            (
                "Datadog-Meta-Tracer-Version",
                self.config.tracer_version().to_string(),
            ),
            ("X-Datadog-Trace-Count", trace_count.to_string()),
        ];
        if let Some(ref container_id) = self.container_id {
            headers.push(("Datadog-Container-ID", container_id.clone()));
        }
        headers
    }

    fn handle_agent_response(&self, body: &str) {
        if body.is_empty() {
            return;
        }
        match serde_json::from_str::<AgentResponse>(body) {
            Ok(response) => {
                self.trace_sampler
                    .update_agent_rates(response.rate_by_service);
            }
            Err(e) => {
                dd_debug!("could not parse the agent response: {e}");
            }
        }
    }
}

fn container_id() -> Option<String> {
    let contents = std::fs::read_to_string("/proc/self/cgroup").ok()?;
    parse_container_id(&contents)
}

/// Scans cgroup lines for a container id: either a 64-hex-digit id or a
/// task UUID, as the final path segment.
fn parse_container_id(cgroup_contents: &str) -> Option<String> {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    let pattern = PATTERN.get_or_init(|| {
        Regex::new(r"[0-9a-f]{64}|[0-9a-f]{8}(?:-[0-9a-f]{4}){3}-[0-9a-f]{12}")
            .expect("failed creating regex")
    });
    cgroup_contents
        .lines()
        .filter_map(|line| line.rsplit('/').next())
        .find_map(|segment| pattern.find(segment).map(|found| found.as_str().to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http_client::HttpResponse;
    use crate::scheduler::EventScheduler;
    use datadog_tracing::configuration::sources::{
        CompositeSource, ConfigSourceOrigin, HashMapSource,
    };
    use datadog_tracing::sampling::priority;
    use pretty_assertions::assert_eq;
    use std::time::Duration;

    fn test_config() -> Arc<Config> {
        let mut sources = CompositeSource::new();
        sources.add_source(HashMapSource::from_iter(
            [("DD_SERVICE", "testsvc")],
            ConfigSourceOrigin::EnvVar,
        ));
        Arc::new(Config::builder_with_sources(sources).build().unwrap())
    }

    /// A scheduler that never fires; tests flush manually.
    struct ManualScheduler;

    impl EventScheduler for ManualScheduler {
        fn schedule_recurring(
            &self,
            _interval: Duration,
            _callback: Box<dyn FnMut() + Send>,
        ) -> CancelToken {
            CancelToken::new()
        }
    }

    #[derive(Clone)]
    struct RecordingHttpClient {
        requests: Arc<Mutex<Vec<(Vec<(&'static str, String)>, Vec<u8>)>>>,
        response: Arc<Mutex<Result<HttpResponse>>>,
    }

    impl RecordingHttpClient {
        fn returning(response: Result<HttpResponse>) -> Self {
            RecordingHttpClient {
                requests: Arc::new(Mutex::new(Vec::new())),
                response: Arc::new(Mutex::new(response)),
            }
        }
    }

    impl HttpClient for RecordingHttpClient {
        fn put(
            &self,
            _url: &datadog_tracing::configuration::AgentUrl,
            path: &str,
            headers: &[(&'static str, String)],
            body: Vec<u8>,
            _timeout: Duration,
        ) -> Result<HttpResponse> {
            assert_eq!(path, "/v0.4/traces");
            self.requests
                .lock()
                .unwrap()
                .push((headers.to_vec(), body));
            self.response.lock().unwrap().clone()
        }
    }

    fn span(trace_id: u64) -> SpanData {
        let mut span = SpanData::with_ids(trace_id, trace_id, 0);
        span.service = "testsvc".to_string();
        span.name = "op".to_string();
        span
    }

    fn agent_with(
        client: RecordingHttpClient,
    ) -> (DatadogAgent, Arc<TraceSampler>) {
        let config = test_config();
        let sampler = Arc::new(TraceSampler::new(&[], 100.0));
        let agent = DatadogAgent::new(
            config,
            sampler.clone(),
            Box::new(client),
            Box::new(ManualScheduler),
        );
        (agent, sampler)
    }

    #[test]
    fn test_flush_sends_batches_with_headers() {
        let client = RecordingHttpClient::returning(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }));
        let (agent, _sampler) = agent_with(client.clone());

        agent.send(vec![span(1)]).unwrap();
        agent.send(vec![span(2)]).unwrap();
        agent.flush();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        let (headers, body) = &requests[0];
        assert!(headers.contains(&("Content-Type", "application/msgpack".to_string())));
        assert!(headers.contains(&("Datadog-Meta-Lang", "rust".to_string())));
        assert!(headers.contains(&("X-Datadog-Trace-Count", "2".to_string())));
        // Two traces: msgpack fixarray of length 2.
        assert_eq!(body[0], 0x92);
    }

    #[test]
    fn test_flush_with_empty_queue_sends_nothing() {
        let client = RecordingHttpClient::returning(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }));
        let (agent, _sampler) = agent_with(client.clone());
        agent.flush();
        assert!(client.requests.lock().unwrap().is_empty());
    }

    #[test]
    fn test_response_updates_sampler_rates() {
        let client = RecordingHttpClient::returning(Ok(HttpResponse {
            status: 200,
            body: r#"{"rate_by_service":{"service:testsvc,env:":0.0,"service:,env:":1.0}}"#
                .to_string(),
        }));
        let (agent, sampler) = agent_with(client);

        agent.send(vec![span(1)]).unwrap();
        agent.flush();

        // The next decision for this service uses the agent's zero rate.
        let decision = sampler.decide(&span(7));
        assert_eq!(decision.priority, priority::AUTO_REJECT);
        assert_eq!(decision.agent_rate, Some(0.0));
    }

    #[test]
    fn test_request_failure_drops_batch() {
        let client = RecordingHttpClient::returning(Err(datadog_tracing::Error::new(
            datadog_tracing::ErrorCode::AgentRequestFailure,
            "connection refused",
        )));
        let (agent, _sampler) = agent_with(client.clone());

        agent.send(vec![span(1)]).unwrap();
        agent.flush();
        // The batch is gone; a later flush sends nothing.
        agent.flush();
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_queue_drops_oldest_when_full() {
        let client = RecordingHttpClient::returning(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }));
        let (agent, _sampler) = agent_with(client.clone());

        for trace_id in 0..(MAX_QUEUED_BATCHES as u64 + 10) {
            agent.send(vec![span(trace_id + 1)]).unwrap();
        }
        {
            let queue = agent.inner.queue.lock().unwrap();
            assert_eq!(queue.len(), MAX_QUEUED_BATCHES);
            // The oldest batches were dropped: the queue now starts at 11.
            assert_eq!(queue.front().unwrap()[0].trace_id, 11);
        }
        agent.flush();
        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
    }

    #[test]
    fn test_drop_performs_final_flush() {
        let client = RecordingHttpClient::returning(Ok(HttpResponse {
            status: 200,
            body: String::new(),
        }));
        {
            let (agent, _sampler) = agent_with(client.clone());
            agent.send(vec![span(1)]).unwrap();
        }
        assert_eq!(client.requests.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_parse_container_id() {
        let docker = "13:name=systemd:/docker/3726184226f5d3147c25fdeab5b60097e378e8a720503a5e19ecfdf29f869860";
        assert_eq!(
            parse_container_id(docker).as_deref(),
            Some("3726184226f5d3147c25fdeab5b60097e378e8a720503a5e19ecfdf29f869860")
        );

        let ecs = "9:perf_event:/ecs/task-arn/34dc0b5e626f2c5c4c5170e34b10e765-1234567890";
        assert_eq!(parse_container_id(ecs), None);

        let uuid_style = "1:name=systemd:/uuid/34dc0b5e-626f-2c5c-4c51-70e34b10e765";
        assert_eq!(
            parse_container_id(uuid_style).as_deref(),
            Some("34dc0b5e-626f-2c5c-4c51-70e34b10e765")
        );

        assert_eq!(parse_container_id("0::/\n"), None);
    }
}
