//! Compatibility bridge for the Rust `log` crate.
//!
//! [`ShipperLogger`] implements `log::Log` and forwards each record to a
//! [`LogTransport`]. Records emitted by this crate itself are skipped: the
//! transport's worker logs delivery problems through the same facade, and
//! shipping those would feed the broker's own failures back into it.

use std::time::Duration;

use log::{LevelFilter, Metadata, Record, SetLoggerError};

use crate::log_record::LogRecord;
use crate::transport::LogTransport;

const OWN_TARGET: &str = env!("CARGO_CRATE_NAME");
const FLUSH_TIMEOUT: Duration = Duration::from_secs(1);

/// Adapter implementing the Rust `log::Log` trait.
pub struct ShipperLogger<T> {
    transport: T,
    level: LevelFilter,
}

impl<T: LogTransport> ShipperLogger<T> {
    pub fn new(transport: T, level: LevelFilter) -> Self {
        Self { transport, level }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }
}

impl<T: LogTransport + 'static> ShipperLogger<T> {
    /// Install the adapter as the global `log` backend.
    pub fn install(self) -> Result<(), SetLoggerError> {
        let level = self.level;
        log::set_boxed_logger(Box::new(self))?;
        log::set_max_level(level);
        Ok(())
    }
}

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Convert a `log::Record` into a shippable record.
pub fn convert_record(record: &Record<'_>) -> LogRecord {
    let mut converted = LogRecord::new()
        .with("level", record.level().as_str().to_ascii_lowercase())
        .with("message", record.args().to_string())
        .with("target", record.target());
    if let Some(module_path) = record.module_path() {
        converted.insert("module_path", module_path);
    }
    if let Some(file) = record.file() {
        converted.insert("file", file);
    }
    if let Some(line) = record.line() {
        converted.insert("line", line);
    }
    converted
}

impl<T: LogTransport> log::Log for ShipperLogger<T> {
    fn enabled(&self, metadata: &Metadata<'_>) -> bool {
        metadata.level() <= self.level && !is_own_target(metadata.target())
    }

    fn log(&self, record: &Record<'_>) {
        if !self.enabled(record.metadata()) {
            return;
        }
        if let Err(err) = self.transport.try_log(convert_record(record)) {
            eprintln!("kafka_log_shipper: failed to serialise log record: {err}");
        }
    }

    fn flush(&self) {
        self.transport.flush(FLUSH_TIMEOUT);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SerialiseError;
    use crate::log_record::LogValue;
    use log::{Level, Log};
    use parking_lot::Mutex;
    use rstest::rstest;

    #[derive(Default)]
    struct Collecting {
        records: Mutex<Vec<LogRecord>>,
    }

    impl LogTransport for Collecting {
        fn try_log(&self, record: LogRecord) -> Result<bool, SerialiseError> {
            self.records.lock().push(record);
            Ok(true)
        }

        fn close(&mut self) {}
    }

    fn emit(logger: &ShipperLogger<Collecting>, level: Level, target: &str, message: &str) {
        logger.log(
            &Record::builder()
                .level(level)
                .target(target)
                .module_path(Some("app::db"))
                .file(Some("src/db.rs"))
                .line(Some(12))
                .args(format_args!("{message}"))
                .build(),
        );
    }

    #[rstest]
    fn forwards_enabled_records() {
        let logger = ShipperLogger::new(Collecting::default(), LevelFilter::Info);
        emit(&logger, Level::Warn, "app::db", "slow query");
        let records = logger.transport().records.lock();
        assert_eq!(records.len(), 1);
        let record = &records[0];
        assert_eq!(record.get("level").and_then(LogValue::as_str), Some("warn"));
        assert_eq!(record.get("message").and_then(LogValue::as_str), Some("slow query"));
        assert_eq!(record.get("file").and_then(LogValue::as_str), Some("src/db.rs"));
        assert!(matches!(record.get("line"), Some(LogValue::UInt(12))));
    }

    #[rstest]
    fn filters_below_level() {
        let logger = ShipperLogger::new(Collecting::default(), LevelFilter::Warn);
        emit(&logger, Level::Info, "app", "chatty");
        assert!(logger.transport().records.lock().is_empty());
    }

    #[rstest]
    #[case("kafka_log_shipper", true)]
    #[case("kafka_log_shipper::kafka_transport::reporter", true)]
    #[case("kafka_log_shipper_extra", false)]
    #[case("app", false)]
    fn recognises_own_targets(#[case] target: &str, #[case] own: bool) {
        assert_eq!(is_own_target(target), own);
    }

    #[rstest]
    fn skips_own_records() {
        let logger = ShipperLogger::new(Collecting::default(), LevelFilter::Trace);
        emit(
            &logger,
            Level::Warn,
            "kafka_log_shipper::kafka_transport::reporter",
            "dropped 3 messages",
        );
        assert!(logger.transport().records.lock().is_empty());
    }
}
