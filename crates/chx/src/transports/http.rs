use std::io::Write;

use anyhow::{Context, Result};
use async_trait::async_trait;
use flate2::{Compression, write::GzEncoder};
use reqwest::header::{CONTENT_ENCODING, CONTENT_TYPE};
use reqwest::{StatusCode, Url};
use tracing::{debug, trace};

use crate::app_config::ClientConfig;
use crate::transports::Transport;

/// 📡 ClickHouse asks for progress headers with this one.
const PROGRESS_HEADER: &str = "X-ClickHouse-Progress";

/// 📡 The HTTP side of chx: `POST /?query=...` with basic auth, and nothing else.
///
/// Internally holds:
/// - `client`: the HTTP muscle 💪, reused across requests, idle timeout baked in
/// - `endpoint`: `http://host:port/`, the query parameter is appended per call
/// - credentials, attached to every request including reads
#[derive(Debug)]
pub(crate) struct HttpTransport {
    client: reqwest::Client,
    endpoint: Url,
    user: String,
    password: String,
    compress: bool,
}

impl HttpTransport {
    /// 🚀 Build the client. No request leaves here; `Client::init` is the probe.
    ///
    /// The idle timeout applies both to connecting and to every socket read,
    /// so a server that stops talking mid-response aborts the request.
    pub(crate) fn new(config: &ClientConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.idle_timeout())
            .read_timeout(config.idle_timeout())
            .build()
            .context("💀 The HTTP client refused to be born. We tried to build a reqwest::Client and the universe said 'no'.")?;

        let endpoint = Url::parse(&format!("http://{}:{}/", config.host, config.port))
            .with_context(|| {
                format!(
                    "💀 '{}:{}' does not make a URL. Check the host for stray slashes or schemes.",
                    config.host, config.port
                )
            })?;

        Ok(Self {
            client,
            endpoint,
            user: config.user.clone(),
            password: config.password.clone(),
            compress: config.compress,
        })
    }

    fn url_for(&self, query: &str) -> Url {
        let mut url = self.endpoint.clone();
        url.query_pairs_mut().append_pair("query", query);
        url
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn post(&self, query: &str, body: Option<String>) -> Result<String> {
        let mut request = self
            .client
            .post(self.url_for(query))
            .basic_auth(&self.user, Some(&self.password))
            .header(CONTENT_TYPE, "text/plain")
            .header(PROGRESS_HEADER, "1");

        if let Some(body) = body {
            debug!("📡 Sending {} bytes for `{}`", body.len(), query);
            request = if self.compress {
                request
                    .header(CONTENT_ENCODING, "gzip")
                    .body(gzip(body.as_bytes())?)
            } else {
                request.body(body)
            };
        }

        let response = request
            .send()
            .await
            .context("💀 The request never made it to ClickHouse. Check connectivity, check the port, check your feelings.")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("💀 ClickHouse started answering and then went quiet. The idle timeout had opinions.")?;

        if status != StatusCode::OK {
            anyhow::bail!("💀 ClickHouse answered {}: {}", status, text.trim_end());
        }

        trace!("🚀 `{}` landed, {} bytes of response", query, text.len());
        Ok(text)
    }
}

fn gzip(bytes: &[u8]) -> Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(bytes.len() / 4), Compression::fast());
    encoder
        .write_all(bytes)
        .context("💀 gzip choked on the request body")?;
    encoder.finish().context("💀 gzip refused to finish")
}
