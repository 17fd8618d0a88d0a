//! Environment variable names used by this crate for convenient
//! configuration of the sink from services.
//!
//! These are purely helpers; [`InsightOpsSink`](crate::insightops::InsightOpsSink)
//! itself never reads the environment.

use crate::config::{ConfigError, DatahubConfig, Options, ShipperConfig};
use crate::level::parse_priority;
use crate::tls::TlsConfig;

/// Log token of the application.
pub const INSIGHTOPS_TOKEN_ENV: &str = "INSIGHTOPS_TOKEN";

/// Collector region, `eu` or `us`.
pub const INSIGHTOPS_REGION_ENV: &str = "INSIGHTOPS_REGION";

/// Least severe level shipped, as a number or a name.
pub const INSIGHTOPS_PRIORITY_ENV: &str = "INSIGHTOPS_PRIORITY";

/// Datahub host; setting it switches to unencrypted hub delivery.
pub const INSIGHTOPS_DATAHUB_HOST_ENV: &str = "INSIGHTOPS_DATAHUB_HOST";

/// Datahub port (80, 514 or 10000).
pub const INSIGHTOPS_DATAHUB_PORT_ENV: &str = "INSIGHTOPS_DATAHUB_PORT";

/// Datahub transport, `tcp` or `udp`.
pub const INSIGHTOPS_DATAHUB_TYPE_ENV: &str = "INSIGHTOPS_DATAHUB_TYPE";

/// Path to a PEM bundle of roots used instead of the platform store.
pub const INSIGHTOPS_CA_BUNDLE_ENV: &str = "INSIGHTOPS_CA_BUNDLE";

/// Number of idle connections kept open.
pub const INSIGHTOPS_POOL_CAPACITY_ENV: &str = "INSIGHTOPS_POOL_CAPACITY";

pub const DEFAULT_REGION: &str = "us";

impl ShipperConfig {
    /// Load the configuration from `INSIGHTOPS_*` environment variables.
    ///
    /// Only the CA bundle is checked here; everything else is validated
    /// when the sink is built.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let token = lookup(INSIGHTOPS_TOKEN_ENV).unwrap_or_default();
        let region = lookup(INSIGHTOPS_REGION_ENV).unwrap_or_else(|| DEFAULT_REGION.to_string());

        let datahub = lookup(INSIGHTOPS_DATAHUB_HOST_ENV).map(|host| DatahubConfig {
            transport: lookup(INSIGHTOPS_DATAHUB_TYPE_ENV),
            port: lookup(INSIGHTOPS_DATAHUB_PORT_ENV).and_then(|p| p.trim().parse().ok()),
            host,
        });

        let tls_config = lookup(INSIGHTOPS_CA_BUNDLE_ENV)
            .map(TlsConfig::from_pem_file)
            .transpose()?;

        let options = Options {
            priority: lookup(INSIGHTOPS_PRIORITY_ENV).and_then(|p| parse_priority(&p)),
            tls_config,
            datahub,
            pool_capacity: lookup(INSIGHTOPS_POOL_CAPACITY_ENV).and_then(|c| c.trim().parse().ok()),
        };

        Ok(ShipperConfig::new(token, region, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{resolve, Transport};
    use crate::level::Severity;
    use serial_test::serial;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_variables() {
        let config = ShipperConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.token, "");
        assert_eq!(config.region, "us");
        assert!(config.options.datahub.is_none());
        assert!(config.options.priority.is_none());
    }

    #[test]
    fn datahub_variables_build_an_override() {
        let config = ShipperConfig::from_lookup(lookup(&[
            (INSIGHTOPS_TOKEN_ENV, "tok"),
            (INSIGHTOPS_REGION_ENV, "eu"),
            (INSIGHTOPS_PRIORITY_ENV, "error"),
            (INSIGHTOPS_DATAHUB_HOST_ENV, "hub.local"),
            (INSIGHTOPS_DATAHUB_PORT_ENV, "10000"),
            (INSIGHTOPS_DATAHUB_TYPE_ENV, "udp"),
            (INSIGHTOPS_POOL_CAPACITY_ENV, "5"),
        ]))
        .unwrap();

        let (target, levels) = resolve(&config.token, &config.region, &config.options).unwrap();
        assert_eq!(target.host(), "hub.local");
        assert_eq!(target.port(), 10000);
        assert_eq!(target.transport(), Transport::Udp);
        assert_eq!(levels.threshold(), Severity::Error);
        assert_eq!(config.options.pool_capacity(), 5);
    }

    #[test]
    fn unparsable_numbers_fall_back_to_defaults() {
        let config = ShipperConfig::from_lookup(lookup(&[
            (INSIGHTOPS_TOKEN_ENV, "tok"),
            (INSIGHTOPS_PRIORITY_ENV, "loudest"),
            (INSIGHTOPS_DATAHUB_HOST_ENV, "hub.local"),
            (INSIGHTOPS_DATAHUB_PORT_ENV, "http"),
            (INSIGHTOPS_POOL_CAPACITY_ENV, "many"),
        ]))
        .unwrap();

        let (target, levels) = resolve(&config.token, &config.region, &config.options).unwrap();
        assert_eq!(target.port(), 514);
        assert_eq!(levels.threshold(), Severity::Info);
        assert_eq!(config.options.pool_capacity(), 3);
    }

    #[test]
    fn unreadable_ca_bundle_is_an_error() {
        let result = ShipperConfig::from_lookup(lookup(&[(
            INSIGHTOPS_CA_BUNDLE_ENV,
            "/nonexistent/insightops-ca.pem",
        )]));
        assert!(matches!(result, Err(ConfigError::Tls(_))));
    }

    #[test]
    #[serial]
    fn reads_process_environment() {
        std::env::set_var(INSIGHTOPS_TOKEN_ENV, "env-token");
        std::env::set_var(INSIGHTOPS_REGION_ENV, "eu");
        let config = ShipperConfig::from_env();
        std::env::remove_var(INSIGHTOPS_TOKEN_ENV);
        std::env::remove_var(INSIGHTOPS_REGION_ENV);

        let config = config.unwrap();
        assert_eq!(config.token, "env-token");
        assert_eq!(config.region, "eu");
        assert_eq!(ShipperConfig::from_env().unwrap().region, DEFAULT_REGION);
    }
}
