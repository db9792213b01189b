//! 🚀 The Client: the front door of chx.
//!
//! ```text
//!   insert() ──Command──▶ FlushWorker ──owns──▶ FlushEngine
//!                              │ tick
//!                              ▼
//!                        tokio::spawn(transport.post) ──outcome──▶ FlushWorker
//!                                                                     │
//!   EventReceiver ◀──────────── Inserted / Error / Log ────────────────┘
//! ```
//!
//! `insert` never blocks and never fails. `query` and `init` skip the buffer
//! entirely and talk to the transport directly.

use std::sync::Arc;

use anyhow::{Context, Result};
use async_channel::Sender;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{info, trace, warn};

use crate::app_config::ClientConfig;
use crate::common::Row;
use crate::engine::{FlushEngine, Stats};
use crate::errors::FlushFailure;
use crate::events::{EventEmitter, EventReceiver};
use crate::transports::{HttpTransport, Transport, TransportBackend};
use crate::workers::{Command, FlushWorker, Worker};

/// 🏷️ The error tag used by [`Client::insert_row`].
pub const DEFAULT_ERROR_TAG: &str = "all";

const PROBE_STATEMENT: &str = "SELECT 'test ok';";
const PROBE_EXPECTED: &str = "test ok";

#[derive(Debug)]
pub struct Client {
    commands: Sender<Command>,
    transport: Arc<TransportBackend>,
    worker: JoinHandle<Result<()>>,
}

impl Client {
    /// 🏗️ Build a client talking HTTP to `config.host:config.port`.
    ///
    /// Must be called inside a tokio runtime: the flush worker is spawned here.
    /// The returned receiver carries every [`crate::ClientEvent`]. Drain it or
    /// drop it: it is unbounded, so holding it unread grows memory with every
    /// event (and with every `Log` line when `enable_log` is set).
    pub fn new(config: ClientConfig) -> Result<(Self, EventReceiver)> {
        let transport = HttpTransport::new(&config)
            .context("💀 Could not build the ClickHouse HTTP transport")?;
        Ok(Self::with_transport(config, TransportBackend::Http(transport)))
    }

    pub(crate) fn with_transport(
        config: ClientConfig,
        transport: TransportBackend,
    ) -> (Self, EventReceiver) {
        let (events, receiver) = EventEmitter::channel(config.enable_log);
        let engine = FlushEngine::new(&config, events);
        let (commands, inbox) = async_channel::unbounded();
        let transport = Arc::new(transport);
        let worker = FlushWorker::new(engine, inbox, Arc::clone(&transport)).start();

        info!(
            "🚀 chx client ready for {}:{} ({:?}, {} rows per flush)",
            config.host,
            config.port,
            config.insert_mode,
            config.max_rows()
        );
        (
            Self {
                commands,
                transport,
                worker,
            },
            receiver,
        )
    }

    /// 📥 Buffer one row for `destination`, filing failures under `error_tag`.
    pub fn insert(&self, destination: &str, row: Row, error_tag: &str) {
        let command = Command::Insert {
            destination: destination.to_string(),
            row,
            error_tag: error_tag.to_string(),
        };
        if self.commands.try_send(command).is_err() {
            trace!("🗑️ row for '{}' dropped, the client is closed", destination);
        }
    }

    /// 📥 [`Client::insert`] under [`DEFAULT_ERROR_TAG`].
    pub fn insert_row(&self, destination: &str, row: Row) {
        self.insert(destination, row, DEFAULT_ERROR_TAG);
    }

    /// 🔎 Run a statement directly, no buffering. Returns the raw response body.
    pub async fn query(&self, statement: &str) -> Result<String> {
        self.transport.post(statement, None).await
    }

    /// 🩺 Connectivity probe: the server must answer `SELECT 'test ok';` with `test ok`.
    pub async fn init(&self) -> Result<()> {
        let response = self
            .query(PROBE_STATEMENT)
            .await
            .context("💀 ClickHouse probe failed before it got an answer")?;
        if !response.contains(PROBE_EXPECTED) {
            warn!("💀 probe answered '{}'", response.trim_end());
            anyhow::bail!(
                "💀 ClickHouse answered the probe with '{}', expected it to contain '{}'",
                response.trim_end(),
                PROBE_EXPECTED
            );
        }
        info!("✅ ClickHouse probe passed");
        Ok(())
    }

    /// 📊 Snapshot of the scheduler and buffer.
    pub async fn stats(&self) -> Result<Stats> {
        let (reply, answer) = oneshot::channel();
        self.ask(Command::Stats(reply)).await?;
        answer.await.context("💀 The flush worker hung up before answering")
    }

    /// 💀 Failures recorded under `tag`, oldest first. They stay recorded.
    pub async fn errors(&self, tag: &str) -> Result<Vec<FlushFailure>> {
        self.error_request(tag, false).await
    }

    /// 💀 Failures recorded under `tag`, removed from the sink.
    pub async fn drain_errors(&self, tag: &str) -> Result<Vec<FlushFailure>> {
        self.error_request(tag, true).await
    }

    async fn error_request(&self, tag: &str, drain: bool) -> Result<Vec<FlushFailure>> {
        let (reply, answer) = oneshot::channel();
        self.ask(Command::Errors {
            tag: tag.to_string(),
            drain,
            reply,
        })
        .await?;
        answer.await.context("💀 The flush worker hung up before answering")
    }

    async fn ask(&self, command: Command) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| anyhow::anyhow!("💀 The flush worker is gone, the client was closed"))
    }

    /// 🛑 Stop the timer and the worker. Rows still buffered are not flushed;
    /// requests already sent are waited for.
    pub async fn close(self) -> Result<()> {
        info!("🛑 closing chx client");
        let _ = self.commands.send(Command::Close).await;
        self.worker
            .await
            .context("💀 The flush worker panicked on its way out")?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::InsertMode;
    use crate::events::ClientEvent;
    use crate::transports::InMemoryTransport;
    use serde_json::json;
    use std::time::Duration;

    fn row(k: usize) -> Row {
        json!({ "k": k, "v": format!("string{k}") })
            .as_object()
            .cloned()
            .unwrap_or_default()
    }

    fn client_with(
        config: ClientConfig,
        transport: InMemoryTransport,
    ) -> (Client, EventReceiver) {
        Client::with_transport(config, TransportBackend::InMemory(transport))
    }

    async fn next_event(events: &EventReceiver) -> ClientEvent {
        tokio::time::timeout(Duration::from_secs(120), events.recv())
            .await
            .expect("💀 no event arrived in time")
            .expect("💀 event channel closed")
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_ten_thousand_rows_all_make_it() -> Result<()> {
        let transport = InMemoryTransport::responding("");
        let spy = transport.clone();
        let (client, events) = client_with(ClientConfig::default(), transport);

        for k in 0..10_000 {
            client.insert_row("logs", row(k));
        }

        let mut counts = Vec::new();
        while counts.iter().sum::<usize>() < 10_000 {
            if let ClientEvent::Inserted(rows) = next_event(&events).await {
                counts.push(rows);
            }
        }
        assert_eq!(counts.len(), 198);
        assert!(counts[..197].iter().all(|&rows| rows == 50));

        let requests = spy.requests().await;
        assert_eq!(requests.len(), 198);
        assert_eq!(requests[0].query, "INSERT INTO logs FORMAT JSONEachRow");
        let first_body = requests[0].body.clone().unwrap_or_default();
        assert_eq!(first_body.lines().count(), 50);
        assert!(first_body.starts_with("{\"k\":0,"), "oldest rows go first");

        client.close().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_transport_always_says_no() -> Result<()> {
        let (client, events) = client_with(
            ClientConfig::default(),
            InMemoryTransport::failing("connection refused"),
        );
        for k in 0..120 {
            client.insert("logs", row(k), "ops");
        }

        match next_event(&events).await {
            ClientEvent::Error(failure) => {
                assert_eq!(failure.rows.len(), 120);
                assert_eq!(failure.error_tag, "ops");
                assert!(failure.detail.contains("connection refused"));
            }
            other => panic!("💀 expected an error event, got {other:?}"),
        }

        let recorded = client.errors("ops").await?;
        assert_eq!(recorded.len(), 1);
        let stats = client.stats().await?;
        assert_eq!(stats.buffered_rows, 0, "nothing is re-buffered");
        assert_eq!(stats.failed_rounds, 1);

        assert_eq!(client.drain_errors("ops").await?.len(), 1);
        assert!(client.errors("ops").await?.is_empty());
        client.close().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_the_timer_naps_and_wakes_up_fresh() -> Result<()> {
        let (client, events) = client_with(ClientConfig::default(), InMemoryTransport::responding(""));
        client.insert_row("logs", row(0));
        assert_eq!(next_event(&events).await, ClientEvent::Inserted(1));

        tokio::time::sleep(Duration::from_secs(12)).await;
        let stats = client.stats().await?;
        assert!(!stats.running, "ten idle ticks should have stopped the timer");
        assert_eq!(stats.current_interval, Duration::from_millis(1000));

        client.insert_row("logs", row(1));
        let stats = client.stats().await?;
        assert!(stats.running);
        assert_eq!(stats.current_interval, stats.default_interval);
        assert_eq!(next_event(&events).await, ClientEvent::Inserted(1));
        client.close().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_a_backlog_speeds_up_the_clock() -> Result<()> {
        let (client, events) = client_with(ClientConfig::default(), InMemoryTransport::responding(""));
        for k in 0..1000 {
            client.insert_row("logs", row(k));
        }

        assert_eq!(next_event(&events).await, ClientEvent::Inserted(50));
        let stats = client.stats().await?;
        assert_eq!(stats.current_interval, Duration::from_millis(200));
        assert_eq!(stats.buffered_rows, 950);
        client.close().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_typed_rows_arrive_as_csv() -> Result<()> {
        let transport = InMemoryTransport::responding("");
        let spy = transport.clone();
        let config = ClientConfig {
            insert_mode: InsertMode::TypedRow,
            ..ClientConfig::default()
        };
        let (client, events) = client_with(config, transport);
        client.insert_row("t", json!({"a": 1, "b": "x\"y"}).as_object().cloned().unwrap_or_default());

        assert_eq!(next_event(&events).await, ClientEvent::Inserted(1));
        let requests = spy.requests().await;
        assert_eq!(requests[0].query, "INSERT INTO t (a, b) FORMAT CSV");
        assert_eq!(requests[0].body.as_deref(), Some("\"1\",\"x\"\"y\"\n"));
        client.close().await
    }

    #[tokio::test(start_paused = true)]
    async fn the_one_where_close_does_not_wait_for_the_buffer() -> Result<()> {
        let transport = InMemoryTransport::responding("");
        let spy = transport.clone();
        let (client, _events) = client_with(ClientConfig::default(), transport);
        client.insert_row("logs", row(0));
        client.close().await?;
        assert!(spy.requests().await.is_empty(), "best effort means no final flush");
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_the_probe_wants_to_hear_test_ok() -> Result<()> {
        let (good, _events) = client_with(ClientConfig::default(), InMemoryTransport::responding("test ok\n"));
        good.init().await?;
        good.close().await?;

        let (rude, _events) = client_with(ClientConfig::default(), InMemoryTransport::responding("hello?"));
        let err = rude.init().await.expect_err("wrong answer must fail the probe");
        assert!(err.to_string().contains("hello?"));
        rude.close().await?;

        let (down, _events) = client_with(ClientConfig::default(), InMemoryTransport::failing("connection refused"));
        let err = down.init().await.expect_err("no answer must fail the probe");
        assert!(format!("{err:#}").contains("connection refused"));
        down.close().await
    }

    #[tokio::test]
    async fn the_one_where_query_skips_the_line() -> Result<()> {
        let transport = InMemoryTransport::responding("1\n");
        let spy = transport.clone();
        let (client, _events) = client_with(ClientConfig::default(), transport);

        assert_eq!(client.query("SELECT 1").await?, "1\n");
        let requests = spy.requests().await;
        assert_eq!(requests.len(), 1);
        assert!(requests[0].body.is_none());
        assert_eq!(client.stats().await?.rows_received, 0);
        client.close().await
    }

    #[tokio::test]
    async fn the_one_where_rows_travel_over_real_http() -> Result<()> {
        use wiremock::matchers::{method, query_param};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(query_param("query", "INSERT INTO logs FORMAT JSONEachRow"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = ClientConfig {
            host: server.address().ip().to_string(),
            port: server.address().port(),
            flush_interval_ms: 50,
            accelerated_interval_ms: 10,
            ..ClientConfig::default()
        };
        let (client, events) = Client::new(config)?;
        for k in 0..3 {
            client.insert_row("logs", row(k));
        }
        assert_eq!(next_event(&events).await, ClientEvent::Inserted(3));
        client.close().await
    }
}
