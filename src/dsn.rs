use crate::config::{DatahubConfig, Options, ShipperConfig};
use crate::level::parse_priority;

/// Error type returned when parsing a DSN.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum DsnError {
    #[error("unknown or unsupported DSN scheme")]
    UnknownScheme,

    #[error("DSN must carry a token before '@'")]
    MissingToken,

    #[error("datahub DSN must end with /<region>")]
    MissingRegion,

    #[error("invalid datahub port: {0:?}")]
    InvalidPort(String),

    #[error("unknown DSN parameter: {0:?}")]
    UnknownParameter(String),
}

/// Parse a DSN into a [`ShipperConfig`].
///
/// Examples:
/// - "insightops://00000000-0000-0000-0000-000000000000@eu"
/// - "insightops://TOKEN@us?priority=warn&pool_capacity=5"
/// - "datahub://TOKEN@hub.internal:10000/eu"
/// - "datahub+udp://TOKEN@hub.internal/us?priority=3"
///
/// Only the shape is checked here. Token, region and datahub values are
/// validated when the sink is built.
pub fn parse_dsn(dsn: &str) -> Result<ShipperConfig, DsnError> {
    let (scheme, rest) = dsn.split_once("://").ok_or(DsnError::UnknownScheme)?;
    let hub_transport = match scheme.to_ascii_lowercase().as_str() {
        "insightops" => None,
        "datahub" | "datahub+tcp" => Some("tcp"),
        "datahub+udp" => Some("udp"),
        _ => return Err(DsnError::UnknownScheme),
    };

    let (body, query) = match rest.split_once('?') {
        Some((body, query)) => (body, Some(query)),
        None => (rest, None),
    };
    let (token, location) = body.split_once('@').ok_or(DsnError::MissingToken)?;

    let mut options = Options::default();
    let region = match hub_transport {
        None => location.trim_end_matches('/').to_string(),
        Some(transport) => {
            let (authority, region) = location.split_once('/').ok_or(DsnError::MissingRegion)?;
            let region = region.trim_end_matches('/');
            if region.is_empty() {
                return Err(DsnError::MissingRegion);
            }
            let mut hub = match split_host_port(authority) {
                (host, Some(port)) => DatahubConfig::new(host).with_port(
                    port.parse()
                        .map_err(|_| DsnError::InvalidPort(port.to_string()))?,
                ),
                (host, None) => DatahubConfig::new(host),
            };
            hub = hub.with_transport(transport);
            options.datahub = Some(hub);
            region.to_string()
        }
    };

    for pair in query.unwrap_or("").split('&').filter(|p| !p.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match key {
            "priority" => options.priority = parse_priority(value),
            "pool_capacity" => options.pool_capacity = value.parse().ok(),
            other => return Err(DsnError::UnknownParameter(other.to_string())),
        }
    }

    Ok(ShipperConfig::new(token, region, options))
}

/// Split `host[:port]`. A bracketed IPv6 host keeps its brackets and only a
/// `:` after the closing `]` starts the port.
fn split_host_port(authority: &str) -> (&str, Option<&str>) {
    let search_from = authority.rfind(']').unwrap_or(0);
    match authority[search_from..].rfind(':') {
        Some(i) => {
            let sep = search_from + i;
            (&authority[..sep], Some(&authority[sep + 1..]))
        }
        None => (authority, None),
    }
}
