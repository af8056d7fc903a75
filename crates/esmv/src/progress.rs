//! 📊 progress.rs — "Are we there yet?" — every reindex, every poll, forever.
//!
//! 🚀 The cluster does the copying. We just ask it how it's going every thirty seconds
//! and draw the answer: a bar, a docs/s rate, and a table so comfy it has lumbar support.
//!
//! ⚠️  Warning: Watching this progress bar will not make the remote task go faster.
//! Neither will lowering the poll interval. We've tried. Science says no.
//!
//! 🦆 The duck has nothing to do with this module. It's just vibing.

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};
use indicatif::{ProgressBar, ProgressStyle};

/// 🔢 "1000000" → "1,000,000". You're welcome, eyes.
pub(crate) fn format_number(n: u64) -> String {
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

/// ⏱️ MM:SS, or HH:MM:SS for the long hauls. If it's HH:MM:SS, order pizza. Plural.
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

// -- 📈 polls are far apart, so the window is wide enough to always hold two of them
const RATE_WINDOW: Duration = Duration::from_secs(120);

/// 📊 Live display for one remote reindex task.
///
/// Fed from status polls, not from the data itself: `created` and `total` are whatever
/// the cluster last reported. The total can move while slices spin up, so it is updated
/// on every observation rather than fixed at construction.
pub(crate) struct ReindexProgress {
    label: String,
    total: u64,
    created: u64,
    progress_bar: ProgressBar,
    /// (when, created) pairs inside [`RATE_WINDOW`]
    rate_samples: VecDeque<(Instant, u64)>,
    start_time: Instant,
}

impl std::fmt::Debug for ReindexProgress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // -- 🎭 ProgressBar is a diva and doesn't derive Debug
        f.debug_struct("ReindexProgress")
            .field("label", &self.label)
            .field("total", &self.total)
            .field("created", &self.created)
            .finish()
    }
}

impl ReindexProgress {
    /// 🚀 `expected_total` is the source's document count at submission. A first guess.
    pub(crate) fn new(source_index: &str, dest_index: &str, expected_total: u64) -> Self {
        let progress_bar = ProgressBar::new(expected_total);
        let style = ProgressStyle::default_bar()
            .template("{msg}\n| [{bar:40.cyan/blue}]")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        progress_bar.set_style(style);

        let start_time = Instant::now();
        let mut rate_samples = VecDeque::new();
        rate_samples.push_back((start_time, 0u64));

        Self {
            label: format!("{source_index} → {dest_index}"),
            total: expected_total,
            created: 0,
            progress_bar,
            rate_samples,
            start_time,
        }
    }

    /// 🔄 Record one status poll and redraw.
    pub(crate) fn observe(&mut self, created: u64, total: u64) {
        self.created = created;
        if total > 0 {
            self.total = total;
            self.progress_bar.set_length(total);
        }
        let docs_per_sec = self.docs_per_sec();
        self.render(docs_per_sec);
        self.progress_bar.set_position(self.created);
    }

    /// ✅ Done, one way or another. The bar stays on screen with its last numbers.
    pub(crate) fn finish(&self) {
        self.progress_bar.finish();
    }

    pub(crate) fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.created as f64 / self.total as f64) * 100.0
    }

    fn docs_per_sec(&mut self) -> f64 {
        let now = Instant::now();
        while let Some(&(timestamp, _)) = self.rate_samples.front() {
            if now.duration_since(timestamp) > RATE_WINDOW && self.rate_samples.len() > 1 {
                self.rate_samples.pop_front();
            } else {
                break;
            }
        }
        self.rate_samples.push_back((now, self.created));

        match self.rate_samples.front() {
            Some(&(oldest_time, oldest_created)) => {
                let elapsed = now.duration_since(oldest_time).as_secs_f64();
                if elapsed > 0.0 {
                    self.created.saturating_sub(oldest_created) as f64 / elapsed
                } else {
                    0.0
                }
            }
            None => 0.0,
        }
    }

    fn render(&self, docs_per_sec: f64) {
        let percent = self.percent();
        let elapsed = self.start_time.elapsed();
        let remaining = if percent > 0.0 && percent < 100.0 {
            // 🔮 linear extrapolation — assumes the future looks like the past
            let total_estimated = elapsed.as_secs_f64() / (percent / 100.0);
            format_duration(Duration::from_secs_f64(
                (total_estimated - elapsed.as_secs_f64()).max(0.0),
            ))
        } else {
            "--:--".to_string()
        };

        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.add_row(vec![
            Cell::new(format!("{} Docs/s", format_number(docs_per_sec as u64)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!(
                "{} / {} Docs",
                format_number(self.created),
                format_number(self.total)
            ))
            .set_alignment(CellAlignment::Right),
        ]);
        table.add_row(vec![
            Cell::new(format!("{} elapsed", format_duration(elapsed)))
                .set_alignment(CellAlignment::Right),
            Cell::new(format!("{:.2}% · {} remaining", percent, remaining))
                .set_alignment(CellAlignment::Right),
        ]);

        self.progress_bar
            .set_message(format!("reindex: {}\n{}", self.label, table));
    }
}
