//! 🚀 chx-cli: the front door. Loads config, pours rows into ClickHouse,
//! and watches the events roll in like a proud parent at a recital.
//!
//! Usage: `chx-cli [config.toml] [rows]`. 🦆

mod progress;

use anyhow::{Context, Result, bail};
use chx::{Client, ClientEvent, Row};
use futures::StreamExt;
use serde_json::Value;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::progress::IngestProgress;

const DEFAULT_CONFIG: &str = "chx.toml";
const DEFAULT_ROWS: u64 = 100_000;
const TABLE: &str = "logs";

/// 🧪 Two columns, one of them a number, both of them boring.
fn demo_row(n: u64) -> Row {
    let mut row = Row::new();
    row.insert("k".into(), Value::from(n));
    row.insert("v".into(), Value::from(format!("row number {n}")));
    row
}

async fn run(config_path: Option<&std::path::Path>, rows: u64) -> Result<()> {
    let config = chx::load_config(config_path)
        .context("💀 In chx-cli, we couldn't load the config. Check the file and the CHX_ env vars")?;
    // -- ⏳ no event for this long means something upstream is sulking
    let stall_after = config.idle_timeout() + config.flush_interval() * 2;

    let (client, events) = Client::new(config).context("💀 Couldn't build the client")?;
    let mut events = std::pin::pin!(events);
    client
        .init()
        .await
        .context("💀 ClickHouse didn't answer the probe. Is it up?")?;
    info!("🚀 probe ok, inserting {} rows into '{}'", rows, TABLE);

    let mut progress = IngestProgress::new(TABLE, rows);
    for n in 0..rows {
        client.insert_row(TABLE, demo_row(n));
    }

    while !progress.is_settled() {
        match tokio::time::timeout(stall_after, events.next()).await {
            Ok(Some(ClientEvent::Inserted(count))) => progress.record_landed(count),
            Ok(Some(ClientEvent::Error(failure))) => {
                warn!("💀 {}", failure);
                progress.record_failed(failure.rows.len());
            }
            Ok(Some(ClientEvent::Log(line))) => info!("🔊 {}", line),
            Ok(None) => bail!("💀 the event channel closed before every row was accounted for"),
            Err(_) => {
                let stats = client.stats().await?;
                bail!(
                    "💀 no flush outcome for {:?}. {} rows still buffered in {} batches",
                    stall_after,
                    stats.buffered_rows,
                    stats.buffered_batches
                );
            }
        }
    }

    println!("{}", progress.finish());
    client.close().await.context("💀 the flush worker didn't shut down cleanly")?;

    if progress.failed() > 0 {
        bail!(
            "💀 {} of {} rows never made it into '{}'",
            progress.failed(),
            rows,
            TABLE
        );
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = std::env::args().collect();
    let path_arg = args.get(1).map(String::as_str).unwrap_or(DEFAULT_CONFIG);
    let rows = match args.get(2) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("💀 '{}' is not a row count", raw))?,
        None => DEFAULT_ROWS,
    };

    // 🔒 a missing file is fine, defaults and env vars take over
    let config_file = std::path::Path::new(path_arg);
    let config_file = match config_file.try_exists().with_context(|| {
        format!(
            "💀 Couldn't check whether the config file exists. Was checking here: '{}'",
            config_file.display()
        )
    })? {
        true => Some(config_file),
        false => None,
    };

    if let Err(err) = run(config_file, rows).await {
        error!("💀 error: {}", err);
        // -- 🧅 peel the onion, one layer at a time
        let mut the_vibes_are_giving_connection_issues = false;
        for cause in err.chain().skip(1) {
            error!("⚠️  cause: {}", cause);
            let cause_str = cause.to_string();
            if cause_str.contains("error sending request")
                || cause_str.contains("connection refused")
                || cause_str.contains("Connection refused")
                || cause_str.contains("tcp connect error")
                || cause_str.contains("dns error")
            {
                the_vibes_are_giving_connection_issues = true;
            }
        }

        if the_vibes_are_giving_connection_issues {
            error!(
                "🔧 hint: ClickHouse doesn't look reachable. Check host and port \
                (default 127.0.0.1:8123). If you're using Docker, `docker ps` is your friend. ☕"
            );
        }
        std::process::exit(1);
    }

    Ok(())
}
