//! 🔌 Transports: where the real I/O happens.
//!
//! 🚰 A transport carries exactly one statement (and optionally one body) to
//! ClickHouse and reports what came back. It does not buffer. It does not
//! retry. It does not compose. The flush worker hands it a finished request
//! and waits on the answer, like a postal worker who delivers the mail
//! without reading it. 🦆

use anyhow::Result;
use async_trait::async_trait;

pub(crate) mod http;
#[cfg(test)]
pub(crate) mod in_mem;

pub(crate) use http::HttpTransport;
#[cfg(test)]
pub(crate) use in_mem::InMemoryTransport;

/// 📡 Issues one request per call.
///
/// # Contract 📜
/// - `Ok(body)` iff the server answered 200; `body` is the raw response.
/// - Anything else (refused connection, idle timeout, non-200) is an `Err`
///   whose message carries the detail, response body included.
/// - `body: None` is a read-only statement.
#[async_trait]
pub(crate) trait Transport: std::fmt::Debug + Send + Sync {
    async fn post(&self, query: &str, body: Option<String>) -> Result<String>;
}

/// 🎭 The many faces of a Transport, dispatched by match.
#[derive(Debug)]
pub(crate) enum TransportBackend {
    Http(HttpTransport),
    #[cfg(test)]
    InMemory(InMemoryTransport),
}

#[async_trait]
impl Transport for TransportBackend {
    async fn post(&self, query: &str, body: Option<String>) -> Result<String> {
        match self {
            TransportBackend::Http(transport) => transport.post(query, body).await,
            #[cfg(test)]
            TransportBackend::InMemory(transport) => transport.post(query, body).await,
        }
    }
}
