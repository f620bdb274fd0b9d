use std::time::Duration;

use crate::error::SerialiseError;
use crate::log_record::LogRecord;

/// Contract between a logging front end and a record transport.
///
/// `LogTransport` is `Send + Sync` so one instance can be shared by every
/// thread that logs. Implementations must return from [`try_log`] without
/// waiting on I/O.
///
/// [`try_log`]: LogTransport::try_log
pub trait LogTransport: Send + Sync {
    /// Submit a record. Fails only when the record cannot be serialised.
    fn try_log(&self, record: LogRecord) -> Result<bool, SerialiseError>;

    /// Callback form of [`try_log`](LogTransport::try_log).
    ///
    /// The callback runs before `log` returns: `(None, true)` once the record
    /// is accepted, or `(Some(err), false)` if serialisation failed.
    fn log<F>(&self, record: LogRecord, callback: F)
    where
        F: FnOnce(Option<SerialiseError>, bool),
        Self: Sized,
    {
        match self.try_log(record) {
            Ok(accepted) => callback(None, accepted),
            Err(err) => callback(Some(err), false),
        }
    }

    /// Wait for previously submitted records to be handed to the backend.
    fn flush(&self, _timeout: Duration) -> bool {
        true
    }

    /// Release the transport's resources. Further records are dropped.
    fn close(&mut self);
}
