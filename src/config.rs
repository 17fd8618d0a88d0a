//! Delivery configuration: turns a `(token, region, options)` triple into
//! an immutable [`DeliveryTarget`] and the [`LevelFilter`] a sink declares.

use crate::insightops::InsightOpsSink;
use crate::level::{parse_priority, LevelFilter, Severity};
use crate::tls::TlsConfig;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::str::FromStr;

/// Appended to the region to form the direct collector host.
pub const HOST_SUFFIX: &str = ".data.logs.insight.rapid7.com";

/// Port of the encrypted token-TCP endpoint.
pub const TLS_PORT: u16 = 443;

/// Ports a datahub may listen on.
pub const HUB_PORTS: [u16; 3] = [80, 514, 10000];

pub const DEFAULT_HUB_PORT: u16 = 514;

/// Idle connections kept per sink unless configured otherwise.
pub const DEFAULT_POOL_CAPACITY: usize = 3;

/// Errors that abort sink construction.
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("unable to create sink: a token is required")]
    MissingToken,

    #[error("unable to create sink: region {0:?} is invalid, must be eu or us")]
    InvalidRegion(String),

    #[error("unable to create sink: a datahub config must contain a host target")]
    MissingHubHost,

    #[error("unable to create sink: {0}")]
    Tls(String),

    #[error("unable to close probe connection: {0}")]
    Probe(#[source] std::io::Error),
}

/// Collector region.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Region {
    Eu,
    Us,
}

impl Region {
    pub fn as_str(self) -> &'static str {
        match self {
            Region::Eu => "eu",
            Region::Us => "us",
        }
    }

    /// Host of the direct collector for this region.
    pub fn host(self) -> String {
        format!("{}{}", self.as_str(), HOST_SUFFIX)
    }
}

impl FromStr for Region {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "eu" => Ok(Region::Eu),
            "us" => Ok(Region::Us),
            other => Err(ConfigError::InvalidRegion(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    Tcp,
    Udp,
}

impl Transport {
    /// Lenient parse used for hub overrides: anything but `udp` is tcp.
    pub fn from_hub_type(kind: Option<&str>) -> Self {
        match kind {
            Some("udp") => Transport::Udp,
            _ => Transport::Tcp,
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Tcp => f.write_str("tcp"),
            Transport::Udp => f.write_str("udp"),
        }
    }
}

/// Unencrypted delivery through a hub that proxies to the collector.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct DatahubConfig {
    /// `tcp` or `udp`; anything else falls back to tcp.
    #[serde(rename = "type", alias = "transport")]
    pub transport: Option<String>,
    /// One of [`HUB_PORTS`]; anything else falls back to 514.
    pub port: Option<u16>,
    pub host: String,
}

impl DatahubConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_transport(mut self, transport: impl Into<String>) -> Self {
        self.transport = Some(transport.into());
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }
}

/// Optional sink settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Options {
    /// Least severe level shipped, inclusive. Accepts a number or a name
    /// when deserialized. Defaults to info.
    #[serde(deserialize_with = "deserialize_priority")]
    pub priority: Option<u32>,
    /// Roots for encrypted delivery; the platform store when absent.
    #[serde(skip)]
    pub tls_config: Option<TlsConfig>,
    pub datahub: Option<DatahubConfig>,
    pub pool_capacity: Option<usize>,
}

impl Options {
    pub fn with_priority(mut self, severity: Severity) -> Self {
        self.priority = Some(severity.priority());
        self
    }

    pub fn with_tls_config(mut self, tls_config: TlsConfig) -> Self {
        self.tls_config = Some(tls_config);
        self
    }

    pub fn with_datahub(mut self, datahub: DatahubConfig) -> Self {
        self.datahub = Some(datahub);
        self
    }

    pub fn with_pool_capacity(mut self, capacity: usize) -> Self {
        self.pool_capacity = Some(capacity);
        self
    }

    pub fn pool_capacity(&self) -> usize {
        match self.pool_capacity {
            Some(capacity) if capacity > 0 => capacity,
            _ => DEFAULT_POOL_CAPACITY,
        }
    }
}

fn deserialize_priority<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u32),
        Name(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        None => None,
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Name(name)) => parse_priority(&name),
    })
}

/// Where and how entries are delivered. Fixed once resolved.
#[derive(Debug, Clone)]
pub struct DeliveryTarget {
    host: String,
    port: u16,
    transport: Transport,
    encrypted: bool,
    tls_config: Option<TlsConfig>,
}

impl DeliveryTarget {
    fn encrypted(host: String, tls_config: Option<TlsConfig>) -> Self {
        Self {
            host,
            port: TLS_PORT,
            transport: Transport::Tcp,
            encrypted: true,
            tls_config,
        }
    }

    /// Encrypted target on an arbitrary port, for local TLS collectors.
    #[cfg(test)]
    pub(crate) fn encrypted_at(host: impl Into<String>, port: u16, tls_config: TlsConfig) -> Self {
        Self {
            port,
            ..Self::encrypted(host.into(), Some(tls_config))
        }
    }

    pub(crate) fn plain(host: impl Into<String>, port: u16, transport: Transport) -> Self {
        Self {
            host: host.into(),
            port,
            transport,
            encrypted: false,
            tls_config: None,
        }
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn transport(&self) -> Transport {
        self.transport
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn tls_config(&self) -> Option<&TlsConfig> {
        self.tls_config.as_ref()
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Resolve the delivery target and level filter for a sink.
///
/// Validation runs in a fixed order: token, region, then the datahub
/// host. Everything after that is defaulted rather than rejected.
pub fn resolve(
    token: &str,
    region: &str,
    options: &Options,
) -> Result<(DeliveryTarget, LevelFilter), ConfigError> {
    if token.is_empty() {
        return Err(ConfigError::MissingToken);
    }
    let region: Region = region.parse()?;

    let target = match &options.datahub {
        Some(hub) => {
            if hub.host.is_empty() {
                return Err(ConfigError::MissingHubHost);
            }
            let transport = Transport::from_hub_type(hub.transport.as_deref());
            let port = hub
                .port
                .filter(|port| HUB_PORTS.contains(port))
                .unwrap_or(DEFAULT_HUB_PORT);
            DeliveryTarget::plain(hub.host.clone(), port, transport)
        }
        None => DeliveryTarget::encrypted(region.host(), options.tls_config.clone()),
    };

    Ok((target, LevelFilter::from_priority(options.priority)))
}

/// Everything needed to build an [`InsightOpsSink`], as loaded from the
/// environment or a DSN.
#[derive(Debug, Clone, Default)]
pub struct ShipperConfig {
    pub token: String,
    pub region: String,
    pub options: Options,
}

impl ShipperConfig {
    pub fn new(token: impl Into<String>, region: impl Into<String>, options: Options) -> Self {
        Self {
            token: token.into(),
            region: region.into(),
            options,
        }
    }

    /// Build the sink, probing the target once.
    pub async fn connect(self) -> Result<InsightOpsSink, ConfigError> {
        InsightOpsSink::new(self.token, &self.region, self.options).await
    }
}
