use super::{HostRequest, HostResponse, HostTransport};
use crate::core::{ClusterOpsError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Canned reply for a scripted host.
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// Answer with the given status and body.
    Respond { status: u16, body: String },
    /// Fail before any response, like a refused connection.
    Fail(String),
    /// Wait, then produce the inner reply.
    Delay(Duration, Box<ScriptedReply>),
}

impl ScriptedReply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::Respond {
            status: 200,
            body: body.into(),
        }
    }

    pub fn json(body: &serde_json::Value) -> Self {
        Self::ok(body.to_string())
    }

    pub fn status(status: u16, body: impl Into<String>) -> Self {
        Self::Respond {
            status,
            body: body.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }

    pub fn delayed(self, delay: Duration) -> Self {
        Self::Delay(delay, Box::new(self))
    }
}

/// A request observed by [`InMemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub host: String,
    pub request: HostRequest,
}

#[derive(Default)]
struct Script {
    by_host: HashMap<String, ScriptedReply>,
    by_host_and_suffix: HashMap<String, Vec<(String, ScriptedReply)>>,
}

/// A `HostTransport` that answers from a script instead of the network.
///
/// Hosts without a script fail as unreachable. Every request is recorded.
#[derive(Clone, Default)]
pub struct InMemoryTransport {
    script: Arc<Mutex<Script>>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl InMemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scripts the reply for every request to `host`.
    pub async fn reply(&self, host: impl Into<String>, reply: ScriptedReply) {
        let mut script = self.script.lock().await;
        script.by_host.insert(host.into(), reply);
    }

    /// Scripts the reply for requests to `host` whose path ends with `suffix`.
    ///
    /// Takes precedence over [`InMemoryTransport::reply`].
    pub async fn reply_to(&self, host: impl Into<String>, suffix: impl Into<String>, reply: ScriptedReply) {
        let mut script = self.script.lock().await;
        script
            .by_host_and_suffix
            .entry(host.into())
            .or_default()
            .push((suffix.into(), reply));
    }

    pub async fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().await.clone()
    }

    pub async fn requests_to(&self, host: &str) -> Vec<HostRequest> {
        self.requests
            .lock()
            .await
            .iter()
            .filter(|recorded| recorded.host == host)
            .map(|recorded| recorded.request.clone())
            .collect()
    }

    async fn lookup(&self, host: &str, path: &str) -> Option<ScriptedReply> {
        let script = self.script.lock().await;
        let by_suffix = script.by_host_and_suffix.get(host).and_then(|replies| {
            replies
                .iter()
                .find(|(suffix, _)| path.ends_with(suffix.as_str()))
                .map(|(_, reply)| reply.clone())
        });
        by_suffix.or_else(|| script.by_host.get(host).cloned())
    }
}

#[async_trait]
impl HostTransport for InMemoryTransport {
    async fn send(&self, host: &str, request: &HostRequest) -> Result<HostResponse> {
        self.requests.lock().await.push(RecordedRequest {
            host: host.to_string(),
            request: request.clone(),
        });

        let mut reply = self.lookup(host, &request.path).await.ok_or_else(|| {
            ClusterOpsError::Transport(format!("host {} is unreachable", host))
        })?;

        loop {
            match reply {
                ScriptedReply::Respond { status, body } => return Ok(HostResponse { status, body }),
                ScriptedReply::Fail(message) => return Err(ClusterOpsError::Transport(message)),
                ScriptedReply::Delay(delay, inner) => {
                    tokio::time::sleep(delay).await;
                    reply = *inner;
                }
            }
        }
    }
}
