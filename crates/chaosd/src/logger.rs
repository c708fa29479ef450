use std::fs::File;
use std::path::Path;

use chrono::Local;
use fern::colors::{Color, ColoredLevelConfig};
use fern::Dispatch;
use log::LevelFilter;

use crate::error::LoggerError;

pub const REPORT_FILE: &str = "chaos.report";

/// Level from `RUST_LOG`, falling back to `info`.
pub fn level_from_env(value: Option<&str>) -> LevelFilter {
    value
        .and_then(|raw| raw.trim().parse::<LevelFilter>().ok())
        .unwrap_or(LevelFilter::Info)
}

/// Install the global logger: colored lines on stderr and a plain copy in the
/// report file, which is truncated first.
pub fn init(report_path: &Path) -> Result<(), LoggerError> {
    let report = File::create(report_path).map_err(|source| LoggerError::Open {
        path: report_path.to_path_buf(),
        source,
    })?;
    let level = level_from_env(std::env::var("RUST_LOG").ok().as_deref());

    let colors = ColoredLevelConfig::new()
        .error(Color::Red)
        .warn(Color::Yellow)
        .info(Color::Green)
        .debug(Color::Blue)
        .trace(Color::BrightBlack);

    let console = Dispatch::new()
        .format(move |out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                colors.color(record.level()),
                message
            ))
        })
        .chain(std::io::stderr());

    let file = Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "[{} {}] {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                message
            ))
        })
        .chain(report);

    Dispatch::new()
        .level(level)
        .level_for("reqwest", LevelFilter::Warn)
        .level_for("hyper", LevelFilter::Warn)
        .chain(console)
        .chain(file)
        .apply()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn level_defaults_to_info() {
        assert_eq!(level_from_env(None), LevelFilter::Info);
        assert_eq!(level_from_env(Some("verbose")), LevelFilter::Info);
        assert_eq!(level_from_env(Some("debug")), LevelFilter::Debug);
        assert_eq!(level_from_env(Some(" WARN ")), LevelFilter::Warn);
    }

    #[test]
    fn unwritable_report_path_is_open_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("missing").join(REPORT_FILE);
        let err = init(&path).expect_err("parent directory does not exist");
        assert!(matches!(err, LoggerError::Open { .. }));
    }
}
