use crate::level::Severity;
use crate::record::LogRecord;
use async_trait::async_trait;
use std::error::Error;

/// Asynchronous destination for [`LogRecord`]s produced by the logging layer.
///
/// This is the contract the [`ShippingLayer`](crate::layer::ShippingLayer)
/// relies on: receive an entry, report success or failure, and declare
/// which severities the sink wants to see.
#[async_trait]
pub trait LogSink: Send + Sync {
    /// Deliver a single record.
    ///
    /// **Returns**
    /// - `Ok(())` if the record was handled. Sinks that deliver on a
    ///   best-effort basis may return `Ok` even when delivery failed.
    /// - `Err(..)` if the record could not be handled at all. The layer
    ///   reports the error on stderr and moves on; nothing is retried.
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>>;

    /// Severities this sink accepts, most severe first. Records outside
    /// this set are never handed to [`LogSink::send`] by the layer.
    fn levels(&self) -> &[Severity] {
        &Severity::ALL
    }

    /// Release any resources held by the sink (pooled connections,
    /// buffers). Must be called before process exit.
    ///
    /// Default implementation is a no-op.
    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
}
