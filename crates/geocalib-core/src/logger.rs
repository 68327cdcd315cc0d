//! Minimal stderr logger.
//!
//! Lines look like `[  0.042s DEBUG geocalib_core::ransac] message`. Install
//! it once at startup with [`init_with_level`], or with [`init_from_env`] to
//! read the level from `GEOCALIB_LOG`.

use std::io::Write;
use std::str::FromStr;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

/// Environment variable read by [`init_from_env`] and, with the `tracing`
/// feature, by [`init_tracing`].
pub const LOG_ENV_VAR: &str = "GEOCALIB_LOG";

struct StderrLogger {
    max: LevelFilter,
    t0: Instant,
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.max
    }

    fn log(&self, record: &Record) {
        if self.enabled(record.metadata()) {
            let line = format!(
                "[{:7.3}s {:>5} {}] {}\n",
                self.t0.elapsed().as_secs_f64(),
                record.level(),
                record.target(),
                record.args()
            );
            let _ = std::io::stderr().lock().write_all(line.as_bytes());
        }
    }

    fn flush(&self) {
        let _ = std::io::stderr().flush();
    }
}

static INSTALLED: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger at `level`. Later calls are no-ops.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if INSTALLED.get().is_some() {
        return Ok(());
    }
    let logger = INSTALLED.get_or_init(|| StderrLogger {
        max: level,
        t0: Instant::now(),
    });
    log::set_logger(logger)?;
    log::set_max_level(level);
    Ok(())
}

/// Install the stderr logger at the level named by `GEOCALIB_LOG`
/// (`error`..`trace`, `off`), falling back to `default` when unset or invalid.
pub fn init_from_env(default: LevelFilter) -> Result<(), log::SetLoggerError> {
    init_with_level(level_from_str(std::env::var(LOG_ENV_VAR).ok().as_deref(), default))
}

fn level_from_str(raw: Option<&str>, default: LevelFilter) -> LevelFilter {
    raw.and_then(|s| LevelFilter::from_str(s.trim()).ok())
        .unwrap_or(default)
}

/// Route `tracing` spans and events to stderr, filtered by `GEOCALIB_LOG`
/// (`EnvFilter` syntax, default `info`). Span close events carry timings.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool) {
    use tracing_subscriber::fmt::format::FmtSpan;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    // already-installed subscribers win
    let _ = if json {
        builder.json().flatten_event(true).finish().try_init()
    } else {
        builder
            .with_timer(tracing_subscriber::fmt::time::Uptime::default())
            .finish()
            .try_init()
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_parsing_falls_back_on_garbage() {
        assert_eq!(level_from_str(Some("debug"), LevelFilter::Info), LevelFilter::Debug);
        assert_eq!(level_from_str(Some(" WARN "), LevelFilter::Info), LevelFilter::Warn);
        assert_eq!(level_from_str(Some("loud"), LevelFilter::Info), LevelFilter::Info);
        assert_eq!(level_from_str(None, LevelFilter::Error), LevelFilter::Error);
    }

    #[test]
    fn repeated_install_is_harmless() {
        assert!(init_with_level(LevelFilter::Warn).is_ok());
        assert!(init_with_level(LevelFilter::Trace).is_ok());
        log::warn!(target: "geocalib_core::logger", "logger smoke test");
    }
}
