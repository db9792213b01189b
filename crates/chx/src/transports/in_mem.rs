//! 🧪 `in_mem`: a transport that lives entirely in RAM, gone the moment you blink.
//!
//! Records every request behind an `Arc<Mutex<...>>` so tests can inspect
//! what "arrived", and can be told to fail every call, for when a test wants
//! to watch the error path sweat. ⚠️ Not for production.

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::transports::Transport;

/// 📦 One request as the transport saw it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RecordedRequest {
    pub query: String,
    pub body: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct InMemoryTransport {
    /// 🔒 The evidence locker. Shared, so a clone kept by the test sees it all.
    pub(crate) received: Arc<tokio::sync::Mutex<Vec<RecordedRequest>>>,
    response: String,
    failure: Option<String>,
}

impl InMemoryTransport {
    /// ✅ Answers every request with `body`.
    pub(crate) fn responding(body: &str) -> Self {
        Self {
            response: body.to_string(),
            ..Self::default()
        }
    }

    /// 💀 Fails every request with `detail`.
    pub(crate) fn failing(detail: &str) -> Self {
        Self {
            failure: Some(detail.to_string()),
            ..Self::default()
        }
    }

    pub(crate) async fn requests(&self) -> Vec<RecordedRequest> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl Transport for InMemoryTransport {
    async fn post(&self, query: &str, body: Option<String>) -> Result<String> {
        self.received.lock().await.push(RecordedRequest {
            query: query.to_string(),
            body,
        });
        match &self.failure {
            Some(detail) => anyhow::bail!("{detail}"),
            None => Ok(self.response.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn the_one_where_every_request_is_remembered() -> Result<()> {
        let transport = InMemoryTransport::responding("ok");
        let spy = transport.clone();

        assert_eq!(transport.post("SELECT 1", None).await?, "ok");
        transport.post("INSERT INTO t FORMAT CSV", Some("\"1\"\n".into())).await?;

        let requests = spy.requests().await;
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[1].body.as_deref(), Some("\"1\"\n"));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_failing_transport_fails_on_cue() {
        let transport = InMemoryTransport::failing("connection refused");
        let err = transport.post("SELECT 1", None).await.expect_err("it was told to fail");
        assert_eq!(err.to_string(), "connection refused");
        assert_eq!(transport.requests().await.len(), 1);
    }
}
