use crate::layer::ShippingLayer;
use crate::sink::LogSink;
use std::sync::Arc;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the global subscriber installed by [`init_tracing_with_config`].
///
/// **Fields**
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is
///   stacked on top of [`ShippingLayer`] so events are also printed to
///   the console.
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub enable_stdout: bool,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self { enable_stdout: true }
    }
}

/// Install a global `tracing` subscriber shipping events to `sink`.
///
/// **Parameters**
/// - `sink`: implementation of [`LogSink`]. Keep a clone of the `Arc`
///   to call [`LogSink::flush`] before the process exits.
/// - `config`: [`LayerConfig`] controlling console output.
///
/// Must be called from within a Tokio runtime.
pub fn init_tracing_with_config(
    sink: Arc<dyn LogSink>,
    config: LayerConfig,
) -> Result<(), SetGlobalDefaultError> {
    let layer = ShippingLayer::new(sink);

    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)
    }
}

/// Equivalent to [`init_tracing_with_config`] with [`LayerConfig::default`].
pub fn init_tracing(sink: Arc<dyn LogSink>) -> Result<(), SetGlobalDefaultError> {
    init_tracing_with_config(sink, LayerConfig::default())
}
