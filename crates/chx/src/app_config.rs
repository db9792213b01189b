//! 🔧 Client Configuration: the sacred TOML-to-struct pipeline.
//!
//! 📡 "Config not found: We looked everywhere. Under the couch. Behind the fridge.
//! In the junk drawer. Nothing." -- every developer at 3am 🦆
//!
//! 🏗️ Powered by Figment: `CHX_*` environment variables, optionally layered
//! under a TOML file. Every field has a default, so an empty environment still
//! yields a client pointed at `127.0.0.1:8123` as user `default`.

use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use figment::{
    Figment,
    providers::{Env, Format, Toml},
};
use serde::Deserialize;
use tracing::info;

/// 🎭 How rows are turned into request bodies.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum InsertMode {
    /// 📦 One JSON object per row, `FORMAT JSONEachRow`.
    #[default]
    RowObject,
    /// 🧾 Quoted CSV lines with an explicit column list, `FORMAT CSV`.
    TypedRow,
}

impl InsertMode {
    /// 🎯 Rows per request when `max_rows_per_flush` is not set.
    pub fn default_max_rows(self) -> usize {
        match self {
            InsertMode::RowObject => 50,
            InsertMode::TypedRow => 1000,
        }
    }
}

/// 📐 Framing of row objects inside one JSONEachRow body.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RowFraming {
    /// `{...}\n{...}\n`
    #[default]
    Ndjson,
    /// `[{...},{...}]`
    JsonArray,
}

/// 📦 Everything a [`crate::Client`] needs to know about itself.
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// 📡 ClickHouse HTTP host.
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 🔒 Basic auth user. Attached to every request, reads included.
    #[serde(default = "default_user")]
    pub user: String,
    /// 🔒 "password123" is not a password. It is a confession.
    #[serde(default)]
    pub password: String,
    /// 🔊 Mirror diagnostics onto the event channel as `ClientEvent::Log`.
    #[serde(default)]
    pub enable_log: bool,
    #[serde(default)]
    pub insert_mode: InsertMode,
    #[serde(default)]
    pub row_framing: RowFraming,
    /// 📦 Rows per flush request. `None` means the insert mode's default.
    #[serde(default)]
    pub max_rows_per_flush: Option<usize>,
    /// ⏱️ The scheduler's resting cadence.
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
    /// 🏎️ The cadence under overload. Must be faster than `flush_interval_ms`.
    #[serde(default = "default_accelerated_interval_ms")]
    pub accelerated_interval_ms: u64,
    /// 💤 Consecutive empty ticks before the scheduler goes to sleep.
    #[serde(default = "default_idle_miss_limit")]
    pub idle_miss_limit: u32,
    /// ⏳ Socket idle timeout for every request.
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    /// 🫁 Gzip request bodies and send `Content-Encoding: gzip`.
    #[serde(default)]
    pub compress: bool,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

// 📡 8123: ClickHouse's HTTP port since forever
fn default_port() -> u16 {
    8123
}

fn default_user() -> String {
    "default".to_string()
}

fn default_flush_interval_ms() -> u64 {
    1000
}

// 🏎️ a fifth of the resting cadence
fn default_accelerated_interval_ms() -> u64 {
    200
}

fn default_idle_miss_limit() -> u32 {
    10
}

fn default_idle_timeout_ms() -> u64 {
    10_000
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            user: default_user(),
            password: String::new(),
            enable_log: false,
            insert_mode: InsertMode::default(),
            row_framing: RowFraming::default(),
            max_rows_per_flush: None,
            flush_interval_ms: default_flush_interval_ms(),
            accelerated_interval_ms: default_accelerated_interval_ms(),
            idle_miss_limit: default_idle_miss_limit(),
            idle_timeout_ms: default_idle_timeout_ms(),
            compress: false,
        }
    }
}

impl ClientConfig {
    /// 📦 Effective rows per flush. Never zero: a zero-row slice would never drain.
    pub fn max_rows(&self) -> usize {
        self.max_rows_per_flush
            .unwrap_or_else(|| self.insert_mode.default_max_rows())
            .max(1)
    }

    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms.max(1))
    }

    pub fn accelerated_interval(&self) -> Duration {
        Duration::from_millis(self.accelerated_interval_ms.max(1))
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }
}

/// 🚀 Load the config from `CHX_*` env vars and, if given, a TOML file.
///
/// 📐 If `config_file_name` is `Some`, the file is merged on top of the
/// environment, so the file wins on conflicts.
pub fn load_config(config_file_name: Option<&Path>) -> anyhow::Result<ClientConfig> {
    info!(
        "🔧 Loading configuration: {:#?}",
        config_file_name.unwrap_or(Path::new(""))
    );

    let config = Figment::new().merge(Env::prefixed("CHX_"));
    let config = match config_file_name {
        Some(file_name) => config.merge(Toml::file(file_name)),
        None => config,
    };

    let context_msg = match config_file_name {
        Some(path) => format!(
            "💀 Failed to parse configuration from file '{}' and environment variables (CHX_*). \
             The file exists in our hearts, but apparently not in valid TOML.",
            path.display()
        ),
        None => "💀 Failed to parse configuration from environment variables (CHX_*). \
                 No file was provided, this one's all on the environment."
            .to_string(),
    };

    config.extract().context(context_msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_test_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new()
            .expect("💀 Failed to create a temp file. The filesystem said 'new phone who dis'.");
        file.write_all(contents.as_bytes())
            .expect("💀 Failed to write test config.");
        file
    }

    #[test]
    fn the_one_where_the_toml_file_sets_every_knob() -> anyhow::Result<()> {
        let file = write_test_config(
            r#"
            host = "ch.internal"
            port = 9000
            user = "ingest"
            password = "hunter2"
            enable_log = true
            insert_mode = "typed_row"
            row_framing = "json_array"
            max_rows_per_flush = 250
            flush_interval_ms = 2000
            accelerated_interval_ms = 100
            idle_miss_limit = 3
            idle_timeout_ms = 5000
            compress = true
            "#,
        );

        let config = load_config(Some(file.path()))?;
        assert_eq!(config.host, "ch.internal");
        assert_eq!(config.port, 9000);
        assert_eq!(config.user, "ingest");
        assert_eq!(config.password, "hunter2");
        assert!(config.enable_log);
        assert_eq!(config.insert_mode, InsertMode::TypedRow);
        assert_eq!(config.row_framing, RowFraming::JsonArray);
        assert_eq!(config.max_rows(), 250);
        assert_eq!(config.flush_interval(), Duration::from_secs(2));
        assert_eq!(config.accelerated_interval(), Duration::from_millis(100));
        assert_eq!(config.idle_miss_limit, 3);
        assert_eq!(config.idle_timeout(), Duration::from_secs(5));
        assert!(config.compress);
        Ok(())
    }

    #[test]
    fn the_one_where_defaults_show_up_uninvited_but_helpful() -> anyhow::Result<()> {
        let file = write_test_config("");
        let config: ClientConfig = Figment::new().merge(Toml::file(file.path())).extract()?;

        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.port, 8123);
        assert_eq!(config.user, "default");
        assert!(config.password.is_empty());
        assert!(!config.enable_log);
        assert_eq!(config.insert_mode, InsertMode::RowObject);
        assert_eq!(config.row_framing, RowFraming::Ndjson);
        assert_eq!(config.flush_interval(), Duration::from_millis(1000));
        assert_eq!(config.idle_miss_limit, 10);
        assert_eq!(config.idle_timeout(), Duration::from_millis(10_000));
        Ok(())
    }

    #[test]
    fn the_one_where_max_rows_follows_the_insert_mode() {
        let row_object = ClientConfig::default();
        assert_eq!(row_object.max_rows(), 50);

        let typed = ClientConfig {
            insert_mode: InsertMode::TypedRow,
            ..ClientConfig::default()
        };
        assert_eq!(typed.max_rows(), 1000);

        let zero = ClientConfig {
            max_rows_per_flush: Some(0),
            ..ClientConfig::default()
        };
        assert_eq!(zero.max_rows(), 1, "a zero-row flush would never drain");
    }

    #[test]
    fn the_one_where_a_typo_in_the_mode_is_not_forgiven() {
        let file = write_test_config(r#"insert_mode = "rowobject""#);
        let err = load_config(Some(file.path())).expect_err("unknown mode must not parse");
        assert!(format!("{err:#}").contains("Failed to parse configuration"));
    }
}
