pub mod in_memory;
pub mod transport;

pub use in_memory::{InMemoryTransport, RecordedRequest, ScriptedReply};
pub use transport::{HostTransport, HttpTransport, HttpTransportConfig};

use crate::core::{ClusterOpsError, Result};
use crate::host_maps::validate_host_maps;
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::{self, JoinSet};
use tokio::time::{Instant, sleep_until};
use tracing::{Instrument, Level, event, info_span};

const FAILURE_BODY_PREVIEW: usize = 512;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let method = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(method)
    }
}

/// One request addressed to one host's agent.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostRequest {
    pub method: HttpMethod,
    /// Endpoint path relative to the agent's API root.
    pub path: String,
    /// Serialized JSON body, if any.
    pub body: Option<String>,
}

/// Raw response as returned by a transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostFailureKind {
    /// The request never produced a response.
    Transport,
    /// The agent answered with a non-2xx status.
    HttpStatus,
    /// The agent answered 2xx with a body that is not JSON.
    MalformedBody,
    /// The dispatch deadline fired or the run was cancelled first.
    Cancelled,
    /// The per-host task ended without reporting.
    Internal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostFailure {
    pub kind: HostFailureKind,
    pub status: Option<u16>,
    pub message: String,
}

impl HostFailure {
    pub fn new(kind: HostFailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for HostFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "{:?} (status {}): {}", self.kind, status, self.message),
            None => write!(f, "{:?}: {}", self.kind, self.message),
        }
    }
}

/// Outcome of the request sent to one host.
#[derive(Debug, Clone, PartialEq)]
pub enum HostResult {
    Passed { status: u16, body: JsonValue },
    Failed(HostFailure),
}

impl HostResult {
    /// Classifies a transport outcome. An empty 2xx body reads as JSON `null`.
    pub fn from_outcome(outcome: Result<HostResponse>) -> Self {
        let response = match outcome {
            Ok(response) => response,
            Err(err) => {
                return Self::Failed(HostFailure::new(HostFailureKind::Transport, err.to_string()));
            }
        };

        if !(200..300).contains(&response.status) {
            let mut preview = response.body;
            if preview.len() > FAILURE_BODY_PREVIEW {
                let mut cut = FAILURE_BODY_PREVIEW;
                while !preview.is_char_boundary(cut) {
                    cut -= 1;
                }
                preview.truncate(cut);
            }
            return Self::Failed(HostFailure {
                kind: HostFailureKind::HttpStatus,
                status: Some(response.status),
                message: preview,
            });
        }

        if response.body.trim().is_empty() {
            return Self::Passed {
                status: response.status,
                body: JsonValue::Null,
            };
        }
        match serde_json::from_str(&response.body) {
            Ok(body) => Self::Passed {
                status: response.status,
                body,
            },
            Err(err) => Self::Failed(HostFailure {
                kind: HostFailureKind::MalformedBody,
                status: Some(response.status),
                message: format!("response body is not valid JSON: {}", err),
            }),
        }
    }

    pub fn is_passing(&self) -> bool {
        matches!(self, HostResult::Passed { .. })
    }

    pub fn body(&self) -> Option<&JsonValue> {
        match self {
            HostResult::Passed { body, .. } => Some(body),
            HostResult::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&HostFailure> {
        match self {
            HostResult::Failed(failure) => Some(failure),
            HostResult::Passed { .. } => None,
        }
    }
}

/// Host address -> outcome. Completion order is not preserved.
pub type HostResultMap = HashMap<String, HostResult>;

/// Signals an in-flight dispatch to stop waiting for pending hosts.
#[derive(Clone)]
pub struct CancelHandle {
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.sender.borrow()
    }
}

/// Sends one request per registered host concurrently and collects every
/// host's outcome.
///
/// A failure on one host never affects the others. The dispatcher does not retry.
pub struct Dispatcher {
    transport: Arc<dyn HostTransport>,
    hosts: Vec<String>,
    deadline: Option<Duration>,
    cancel_tx: Arc<watch::Sender<bool>>,
    cancel_rx: watch::Receiver<bool>,
}

impl Dispatcher {
    pub fn new(transport: Arc<dyn HostTransport>) -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self {
            transport,
            hosts: Vec::new(),
            deadline: None,
            cancel_tx: Arc::new(cancel_tx),
            cancel_rx,
        }
    }

    /// Bounds how long one dispatch waits for all hosts.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn set_deadline(&mut self, deadline: Option<Duration>) {
        self.deadline = deadline;
    }

    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            sender: Arc::clone(&self.cancel_tx),
        }
    }

    /// Registers the hosts the next dispatch targets.
    pub fn setup(&mut self, hosts: &[String]) {
        self.hosts = hosts.to_vec();
    }

    pub fn hosts(&self) -> &[String] {
        &self.hosts
    }

    /// Sends `requests` (host -> request) to the registered hosts.
    ///
    /// The request map must be keyed by exactly the registered hosts. Hosts still
    /// pending when the deadline or a cancellation fires are reported as
    /// `Cancelled`.
    pub async fn dispatch(&self, requests: &HashMap<String, HostRequest>) -> Result<HostResultMap> {
        validate_host_maps(&self.hosts, &[requests])?;

        let span = info_span!("dispatch", hosts = self.hosts.len());
        let mut results: HostResultMap = HashMap::with_capacity(self.hosts.len());
        let mut tasks: JoinSet<(String, HostResult)> = JoinSet::new();
        let mut task_hosts: HashMap<task::Id, String> = HashMap::with_capacity(self.hosts.len());

        for host in &self.hosts {
            let request = requests.get(host).cloned().ok_or_else(|| {
                ClusterOpsError::ConfigMismatch(format!("no request prepared for host {}", host))
            })?;
            let transport = Arc::clone(&self.transport);
            let task_host = host.clone();
            let host = host.clone();
            let host_span = info_span!(parent: &span, "dispatch.host", host = %host, method = %request.method, path = %request.path);
            let handle = tasks.spawn(
                async move {
                    let outcome = transport.send(&host, &request).await;
                    let result = HostResult::from_outcome(outcome);
                    match &result {
                        HostResult::Passed { status, .. } => {
                            event!(Level::DEBUG, status = *status, "host request passed")
                        }
                        HostResult::Failed(failure) => {
                            event!(Level::DEBUG, failure = %failure, "host request failed")
                        }
                    }
                    (host, result)
                }
                .instrument(host_span),
            );
            task_hosts.insert(handle.id(), task_host);
        }

        let deadline = self.deadline.map(|after| Instant::now() + after);
        let mut cancel_rx = self.cancel_rx.clone();
        let deadline_fut = wait_for_deadline(deadline);
        let cancel_fut = wait_for_cancel(&mut cancel_rx);
        tokio::pin!(deadline_fut);
        tokio::pin!(cancel_fut);

        let interrupted: Option<&'static str> = loop {
            tokio::select! {
                joined = tasks.join_next() => match joined {
                    Some(Ok((host, result))) => {
                        results.insert(host, result);
                    }
                    Some(Err(err)) => {
                        event!(parent: &span, Level::WARN, error = %err, "dispatch task did not complete");
                        if let Some(host) = task_hosts.remove(&err.id()) {
                            let failure = HostFailure::new(
                                HostFailureKind::Internal,
                                format!("dispatch task failed: {}", err),
                            );
                            results.insert(host, HostResult::Failed(failure));
                        }
                    }
                    None => break None,
                },
                _ = &mut deadline_fut => break Some("dispatch deadline exceeded"),
                _ = &mut cancel_fut => break Some("dispatch cancelled"),
            }
        };
        tasks.abort_all();

        for host in &self.hosts {
            if results.contains_key(host) {
                continue;
            }
            let failure = match interrupted {
                Some(reason) => HostFailure::new(HostFailureKind::Cancelled, reason),
                None => HostFailure::new(
                    HostFailureKind::Internal,
                    "dispatch task ended without a result",
                ),
            };
            results.insert(host.clone(), HostResult::Failed(failure));
        }

        if let Some(reason) = interrupted {
            event!(parent: &span, Level::WARN, reason, "dispatch interrupted before all hosts answered");
        }
        Ok(results)
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(at) => sleep_until(at).await,
        None => std::future::pending::<()>().await,
    }
}

async fn wait_for_cancel(cancel_rx: &mut watch::Receiver<bool>) {
    let cancelled = cancel_rx.wait_for(|cancelled| *cancelled).await.is_ok();
    if !cancelled {
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> Result<HostResponse> {
        Ok(HostResponse {
            status,
            body: body.to_string(),
        })
    }

    #[test]
    fn test_classify_passing_json() {
        let result = HostResult::from_outcome(response(200, r#"{"state":"UP"}"#));
        assert!(result.is_passing());
        assert_eq!(result.body().unwrap()["state"], "UP");
    }

    #[test]
    fn test_classify_empty_body_as_null() {
        let result = HostResult::from_outcome(response(204, ""));
        assert_eq!(result.body(), Some(&JsonValue::Null));
    }

    #[test]
    fn test_classify_status_and_malformed_body() {
        let result = HostResult::from_outcome(response(500, "internal"));
        assert_eq!(result.failure().unwrap().kind, HostFailureKind::HttpStatus);
        assert_eq!(result.failure().unwrap().status, Some(500));

        let result = HostResult::from_outcome(response(200, "<html>"));
        assert_eq!(result.failure().unwrap().kind, HostFailureKind::MalformedBody);
    }

    #[test]
    fn test_classify_transport_error() {
        let result = HostResult::from_outcome(Err(ClusterOpsError::Transport(
            "connection refused".to_string(),
        )));
        assert_eq!(result.failure().unwrap().kind, HostFailureKind::Transport);
    }
}
