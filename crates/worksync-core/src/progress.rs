//! Progress reporting for TTY and non-TTY environments.
//!
//! TTY mode: one indicatif spinner per running query shard.
//! Non-TTY mode: hidden bars; logs on a sparse page schedule carry progress.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

/// Fixed early checkpoints, after which every `REPORT_EVERY`th page is logged
const REPORT_PAGES: [usize; 5] = [5, 10, 20, 50, 100];
const REPORT_EVERY: usize = 500;

/// Whether page number `page` (1-based) should emit a progress log line.
///
/// Logarithmic-ish schedule: 5, 10, 20, 50, 100, then every 500.
pub fn should_report(page: usize) -> bool {
    REPORT_PAGES.contains(&page) || (page > 0 && page % REPORT_EVERY == 0)
}

/// First 20 characters of a bar label
fn bar_prefix(name: &str) -> String {
    name.chars().take(20).collect()
}

fn spinner_style() -> ProgressStyle {
    ProgressStyle::with_template("{spinner:.green} {prefix:<20.dim} {wide_msg}")
        .expect("invalid template")
}

/// Central progress context managing multi-progress bars.
pub struct ProgressContext {
    multi: MultiProgress,
    is_tty: bool,
}

impl ProgressContext {
    /// Create new context, detecting TTY automatically.
    pub fn new() -> Self {
        Self::with_tty(std::io::stderr().is_terminal())
    }

    /// Context that never draws (tests, piped output)
    pub fn hidden() -> Self {
        Self::with_tty(false)
    }

    fn with_tty(is_tty: bool) -> Self {
        Self {
            multi: MultiProgress::new(),
            is_tty,
        }
    }

    /// Spinner for one cursor chain. Hidden (no-op) outside a TTY.
    pub fn chain_bar(&self, name: &str) -> ProgressBar {
        if !self.is_tty {
            return ProgressBar::hidden();
        }
        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(spinner_style());
        pb.set_prefix(bar_prefix(name));
        pb.set_message("connecting...");
        pb.enable_steady_tick(Duration::from_millis(80));
        pb
    }

    /// Print a line above managed progress bars.
    pub fn println(&self, msg: impl AsRef<str>) {
        if self.is_tty {
            let _ = self.multi.println(msg);
        } else {
            eprintln!("{}", msg.as_ref());
        }
    }

    pub fn is_tty(&self) -> bool {
        self.is_tty
    }

    /// `MultiProgress` for the log bridge
    pub fn multi(&self) -> &MultiProgress {
        &self.multi
    }
}

impl Default for ProgressContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for `ProgressContext`.
pub type SharedProgress = Arc<ProgressContext>;

/// Format number with thousand separators.
pub fn fmt_num(n: usize) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + s.len() / 3);
    for (i, c) in s.chars().rev().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(c);
    }
    result.chars().rev().collect()
}
