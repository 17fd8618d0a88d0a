use crate::config::{resolve, ConfigError, DeliveryTarget, Options};
use crate::format::{Formatter, JsonFormatter, SerializationError};
use crate::level::{LevelFilter, Severity};
use crate::pool::{ConnectionPool, DeliveryError};
use crate::record::LogRecord;
use crate::sink::LogSink;
use crate::transport::{Dialer, NetDialer};
use async_trait::async_trait;
use std::error::Error;

/// Ships records to InsightOps using token-based TCP/TLS or a datahub.
///
/// Each record is rendered as one JSON line, prefixed with the token and
/// written over a pooled connection. Delivery is best effort: a failed
/// write is reported on stderr and the record is dropped.
pub struct InsightOpsSink {
    token: String,
    levels: LevelFilter,
    formatter: Box<dyn Formatter>,
    pool: ConnectionPool,
    target: Option<DeliveryTarget>,
}

impl InsightOpsSink {
    /// Resolve the delivery target from `token`, `region` and `options`
    /// and probe it once.
    ///
    /// **Returns**
    /// - `Err(ConfigError)` for a missing token, an unknown region, a
    ///   datahub without host, unusable TLS roots, or when the probe
    ///   connection opened but failed to close.
    /// - `Ok(sink)` otherwise, including when the probe could not connect:
    ///   an unreachable collector only shows up later as write failures.
    pub async fn new(
        token: impl Into<String>,
        region: &str,
        options: Options,
    ) -> Result<Self, ConfigError> {
        let token = token.into();
        let (target, levels) = resolve(&token, region, &options)?;
        let dialer = NetDialer::new(target.clone())?;
        tracing::debug!(
            host = target.host(),
            port = target.port(),
            transport = %target.transport(),
            encrypted = target.is_encrypted(),
            "resolved insightops delivery target"
        );

        let mut sink = Self::with_dialer(token, levels, options.pool_capacity(), dialer).await?;
        sink.target = Some(target);
        Ok(sink)
    }

    /// Build a sink on top of a custom [`Dialer`], skipping target
    /// resolution. The dialer is probed exactly like in [`Self::new`].
    pub async fn with_dialer(
        token: impl Into<String>,
        levels: LevelFilter,
        pool_capacity: usize,
        dialer: impl Dialer + 'static,
    ) -> Result<Self, ConfigError> {
        let token = token.into();
        if token.is_empty() {
            return Err(ConfigError::MissingToken);
        }
        probe(&dialer).await?;

        Ok(Self {
            token,
            levels,
            formatter: Box::new(JsonFormatter::new()),
            pool: ConnectionPool::new(dialer, pool_capacity.max(1)),
            target: None,
        })
    }

    /// Replace the default [`JsonFormatter`].
    pub fn with_formatter(mut self, formatter: impl Formatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }

    /// Format and deliver one record.
    ///
    /// Only a formatting failure is returned; delivery failures are
    /// written to stderr and swallowed.
    pub async fn fire(&self, record: &LogRecord) -> Result<(), SerializationError> {
        let line = match self.formatter.format(record) {
            Ok(line) => line,
            Err(err) => {
                eprintln!("unable to read entry | err: {} | entry: {:?}", err, record);
                return Err(err);
            }
        };

        let mut payload = Vec::with_capacity(self.token.len() + line.len());
        payload.extend_from_slice(self.token.as_bytes());
        payload.extend_from_slice(&line);

        if let Err(err) = self.pool.write(&payload).await {
            eprintln!("{}", delivery_failure(&err, &line));
        }
        Ok(())
    }

    /// Severities this sink ships, most severe first.
    pub fn levels(&self) -> &'static [Severity] {
        self.levels.levels()
    }

    pub fn level_filter(&self) -> LevelFilter {
        self.levels
    }

    /// Resolved target, absent for sinks built with [`Self::with_dialer`].
    pub fn target(&self) -> Option<&DeliveryTarget> {
        self.target.as_ref()
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// Close every pooled connection. Call once no more records are being
    /// fired; connections held by in-flight writes are closed when those
    /// writes finish.
    pub async fn flush_and_close(&self) -> Result<(), DeliveryError> {
        self.pool.shutdown().await
    }
}

/// Stderr line for a failed write. A close failure happens after the line
/// was delivered, so it does not repeat the payload.
fn delivery_failure(err: &DeliveryError, line: &[u8]) -> String {
    match err {
        DeliveryError::Close(source) => format!("unable to close conn after write | err: {}", source),
        _ => format!(
            "unable to write to conn | err: {} | line: {}",
            err,
            String::from_utf8_lossy(line).trim_end()
        ),
    }
}

async fn probe(dialer: &dyn Dialer) -> Result<(), ConfigError> {
    match dialer.dial().await {
        Ok(mut conn) => conn.close().await.map_err(ConfigError::Probe),
        Err(err) => {
            tracing::warn!(error = %err, "probe connection to collector failed");
            Ok(())
        }
    }
}

#[async_trait]
impl LogSink for InsightOpsSink {
    async fn send(&self, record: &LogRecord) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.fire(record).await?;
        Ok(())
    }

    fn levels(&self) -> &[Severity] {
        self.levels.levels()
    }

    async fn flush(&self) -> Result<(), Box<dyn Error + Send + Sync>> {
        self.flush_and_close().await?;
        Ok(())
    }
}
