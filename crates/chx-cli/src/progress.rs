//! 📊 progress.rs: "Are the rows in yet?" Asked once per flush round, forever.
//!
//! 🚀 Counts what the events say landed and what they say died, drives an
//! indicatif bar with it, and prints a comfy little table at the end.

use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 "1000000 rows" → "1,000,000 rows". Eyes, you're welcome.
fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().enumerate() {
        if i > 0 && (s.len() - i) % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result
}

/// ⏱️ MM:SS, or HH:MM:SS if you went for lunch.
fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let hours = total_secs / 3600;
    let minutes = (total_secs % 3600) / 60;
    let seconds = total_secs % 60;
    if hours > 0 {
        format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{:02}:{:02}", minutes, seconds)
    }
}

pub(crate) struct IngestProgress {
    table_name: String,
    expected: u64,
    landed: u64,
    failed: u64,
    rounds: u64,
    progress_bar: ProgressBar,
    start_time: Instant,
}

impl std::fmt::Debug for IngestProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is still a diva about Debug
        f.debug_struct("IngestProgress")
            .field("table_name", &self.table_name)
            .field("expected", &self.expected)
            .field("landed", &self.landed)
            .field("failed", &self.failed)
            .finish()
    }
}

impl IngestProgress {
    pub(crate) fn new(table_name: impl Into<String>, expected: u64) -> Self {
        let progress_bar = ProgressBar::new(expected);
        let style = ProgressStyle::with_template("{spinner} [{bar:40}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        progress_bar.set_style(style);
        progress_bar.enable_steady_tick(Duration::from_millis(200));
        Self {
            table_name: table_name.into(),
            expected,
            landed: 0,
            failed: 0,
            rounds: 0,
            progress_bar,
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_landed(&mut self, rows: usize) {
        self.landed += rows as u64;
        self.rounds += 1;
        self.progress_bar.inc(rows as u64);
    }

    pub(crate) fn record_failed(&mut self, rows: usize) {
        self.failed += rows as u64;
        self.rounds += 1;
        self.progress_bar.inc(rows as u64);
        self.progress_bar
            .set_message(format!("💀 {} rows failed", format_number(self.failed)));
    }

    /// ✅ Every row is accounted for, one way or the other.
    pub(crate) fn is_settled(&self) -> bool {
        self.landed + self.failed >= self.expected
    }

    pub(crate) fn landed(&self) -> u64 {
        self.landed
    }

    pub(crate) fn failed(&self) -> u64 {
        self.failed
    }

    /// 🍽️ Finish the bar and hand back the summary table.
    pub(crate) fn finish(&self) -> Table {
        self.progress_bar.finish_and_clear();

        let elapsed = self.start_time.elapsed();
        let rows_per_sec = if elapsed.as_secs_f64() > 0.0 {
            (self.landed as f64 / elapsed.as_secs_f64()) as u64
        } else {
            self.landed
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        let rows = [
            ("table", self.table_name.clone()),
            ("rows inserted", format_number(self.landed)),
            ("rows failed", format_number(self.failed)),
            ("flush rounds", format_number(self.rounds)),
            ("rows/s", format_number(rows_per_sec)),
            ("elapsed", format_duration(elapsed)),
        ];
        for (label, value) in rows {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        }
        table
    }
}
