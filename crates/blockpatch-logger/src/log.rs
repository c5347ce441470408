use crate::severity::LogSeverity;
use crate::systime::now;
use ::log::{LevelFilter, Metadata, Record, SetLoggerError};
use once_cell::sync::Lazy;

static LOGGER: Lazy<SeverityLogger> = Lazy::new(SeverityLogger::new);

/// Prints a single line in the `[SEVERITY] time message` layout.
pub fn log(msg: String, log_severity: LogSeverity) {
    println!("{}", format_line(&now(), log_severity, &msg));
}

pub fn format_line(time: &str, log_severity: LogSeverity, msg: &str) -> String {
    format!("[{}] {} {}", log_severity, time, msg)
}

/// `log` facade backend writing through [`log`].
pub struct SeverityLogger {
    _private: (),
}

impl SeverityLogger {
    fn new() -> Self {
        Self { _private: () }
    }
}

impl ::log::Log for SeverityLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= ::log::max_level()
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        log(
            format!("{}: {}", record.target(), record.args()),
            LogSeverity::from(record.level()),
        );
    }

    fn flush(&self) {}
}

/// Installs the process-wide logger. Fails if another logger is already set.
pub fn init(level: LevelFilter) -> Result<(), SetLoggerError> {
    ::log::set_logger(&*LOGGER)?;
    ::log::set_max_level(level);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_line() {
        assert_eq!(
            format_line("2024-01-01 00:00:00 UTC", LogSeverity::Warning, "bad chunk"),
            "[WARNING] 2024-01-01 00:00:00 UTC bad chunk"
        );
    }

    #[test]
    fn test_init_once() {
        // The first call may race with other tests in this binary; only the
        // second call is guaranteed to observe an installed logger.
        let _ = init(LevelFilter::Debug);
        assert!(init(LevelFilter::Debug).is_err());
    }
}
