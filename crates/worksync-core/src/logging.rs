//! Logging setup with indicatif integration

use std::io::Write;

use indicatif::MultiProgress;

/// Padded label and optional ANSI color for a log level.
fn level_style(level: log::Level, color: bool) -> (&'static str, &'static str, &'static str) {
    let label = match level {
        log::Level::Error => "ERROR",
        log::Level::Warn => "WARN ",
        log::Level::Info => "INFO ",
        log::Level::Debug => "DEBUG",
        log::Level::Trace => "TRACE",
    };
    if !color {
        return ("", label, "");
    }
    let ansi = match level {
        log::Level::Error => "\x1b[31m",
        log::Level::Warn => "\x1b[33m",
        log::Level::Info => "\x1b[32m",
        log::Level::Debug => "\x1b[36m",
        log::Level::Trace => "\x1b[35m",
    };
    (ansi, label, "\x1b[0m")
}

/// Logger that prints through `MultiProgress` so lines don't tear the bars.
pub struct IndicatifLogger {
    inner: env_logger::Logger,
    multi: MultiProgress,
}

impl IndicatifLogger {
    pub fn new(inner: env_logger::Logger, multi: MultiProgress) -> Self {
        Self { inner, multi }
    }
}

impl log::Log for IndicatifLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.inner.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        if self.inner.enabled(record.metadata()) {
            let (pre, label, post) = level_style(record.level(), true);
            let line = format!("[{pre}{label}{post}] {}", record.args());
            self.multi.suspend(|| eprintln!("{line}"));
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

fn default_level(quiet: bool, debug: bool) -> &'static str {
    if debug {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    }
}

/// Initialize logging. `RUST_LOG` overrides the level picked from the flags.
///
/// With `multi`, output goes through [`IndicatifLogger`]; otherwise plain
/// uncolored lines for log collectors.
pub fn init_logging(quiet: bool, debug: bool, multi: Option<&MultiProgress>) {
    let env = env_logger::Env::default().default_filter_or(default_level(quiet, debug));

    match multi {
        Some(multi) => {
            let logger = env_logger::Builder::from_env(env)
                .format_timestamp_millis()
                .build();
            let max_level = logger.filter();
            if log::set_boxed_logger(Box::new(IndicatifLogger::new(logger, multi.clone()))).is_ok()
            {
                log::set_max_level(max_level);
            }
        }
        None => {
            let _ = env_logger::Builder::from_env(env)
                .format(|buf, record| {
                    let (_, label, _) = level_style(record.level(), false);
                    writeln!(buf, "[{label}] {}", record.args())
                })
                .try_init();
        }
    }
}

/// Replace the value of a `mailto=` query parameter before logging a URL
pub fn redact_mailto(url: &str) -> String {
    let Some(start) = url.find("mailto=") else {
        return url.to_string();
    };
    let value_start = start + "mailto=".len();
    let value_end = url[value_start..]
        .find('&')
        .map_or(url.len(), |i| value_start + i);
    format!("{}***{}", &url[..value_start], &url[value_end..])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_labels_are_padded() {
        for level in [
            log::Level::Error,
            log::Level::Warn,
            log::Level::Info,
            log::Level::Debug,
            log::Level::Trace,
        ] {
            let (_, label, _) = level_style(level, false);
            assert_eq!(label.len(), 5);
        }
    }

    #[test]
    fn no_color_has_no_escape() {
        let (pre, _, post) = level_style(log::Level::Error, false);
        assert!(pre.is_empty());
        assert!(post.is_empty());
    }

    #[test]
    fn default_level_precedence() {
        assert_eq!(default_level(true, true), "debug");
        assert_eq!(default_level(true, false), "warn");
        assert_eq!(default_level(false, false), "info");
    }

    #[test]
    fn redact_mailto_middle() {
        let url = "https://api.openalex.org/works?filter=x&mailto=me@example.org&cursor=*";
        assert_eq!(
            redact_mailto(url),
            "https://api.openalex.org/works?filter=x&mailto=***&cursor=*"
        );
    }

    #[test]
    fn redact_mailto_last() {
        let url = "https://api.openalex.org/works?mailto=me@example.org";
        assert_eq!(redact_mailto(url), "https://api.openalex.org/works?mailto=***");
    }

    #[test]
    fn redact_mailto_absent() {
        let url = "https://api.openalex.org/works?filter=x";
        assert_eq!(redact_mailto(url), url);
    }
}
