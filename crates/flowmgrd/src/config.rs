//! Daemon configuration.
//!
//! Loaded from a TOML file; every field has a default so an empty file (or
//! no file at all) yields a working controller with the reference
//! two-backend service layout.

use crate::balancer::Backend;
use crate::error::{FlowmgrError, FlowmgrResult};
use ofctl_types::{MacAddress, PortNo};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::net::Ipv4Addr;
use std::path::Path;

/// Southbound listener configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// Address the OpenFlow listener binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        ListenerConfig {
            bind_addr: default_bind_addr(),
        }
    }
}

/// Virtual-service (load balancer) configuration.
///
/// Immutable for the process lifetime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// The externally visible service address clients connect to.
    #[serde(default = "default_virtual_ip")]
    pub virtual_ip: Ipv4Addr,

    /// The service TCP port.
    #[serde(default = "default_service_port")]
    pub service_port: u16,

    /// Ordered backend pool; round-robin selection follows this order.
    #[serde(default = "default_backends")]
    pub backends: Vec<Backend>,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            virtual_ip: default_virtual_ip(),
            service_port: default_service_port(),
            backends: default_backends(),
        }
    }
}

/// Complete flowmgrd configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ControllerConfig {
    /// Listener configuration.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Virtual-service configuration.
    #[serde(default)]
    pub service: ServiceConfig,
}

fn default_bind_addr() -> String {
    "0.0.0.0:6633".to_string()
}

fn default_virtual_ip() -> Ipv4Addr {
    Ipv4Addr::new(10, 0, 0, 100)
}

fn default_service_port() -> u16 {
    8080
}

fn default_backends() -> Vec<Backend> {
    vec![
        Backend {
            ip: Ipv4Addr::new(10, 0, 0, 101),
            mac: MacAddress::new([0, 0, 0, 0, 0, 0x01]),
            port: PortNo::new(1),
        },
        Backend {
            ip: Ipv4Addr::new(10, 0, 0, 102),
            mac: MacAddress::new([0, 0, 0, 0, 0, 0x02]),
            port: PortNo::new(2),
        },
    ]
}

impl ControllerConfig {
    /// Loads and validates configuration from a TOML file.
    pub fn load(path: &Path) -> FlowmgrResult<ControllerConfig> {
        let raw = std::fs::read_to_string(path)?;
        let config: ControllerConfig = toml::from_str(&raw)
            .map_err(|e| FlowmgrError::invalid_config("config file", e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    pub fn validate(&self) -> FlowmgrResult<()> {
        self.listener
            .bind_addr
            .parse::<std::net::SocketAddr>()
            .map_err(|e| FlowmgrError::invalid_config("listener.bind_addr", e.to_string()))?;

        if self.service.backends.is_empty() {
            return Err(FlowmgrError::invalid_config(
                "service.backends",
                "at least one backend is required",
            ));
        }
        if self.service.service_port == 0 {
            return Err(FlowmgrError::invalid_config(
                "service.service_port",
                "port 0 is not a valid service port",
            ));
        }

        let mut seen_ips = HashSet::new();
        for backend in &self.service.backends {
            if backend.port.is_reserved() {
                return Err(FlowmgrError::invalid_config(
                    "service.backends",
                    format!("backend {} uses reserved port {}", backend.ip, backend.port),
                ));
            }
            if backend.ip == self.service.virtual_ip {
                return Err(FlowmgrError::invalid_config(
                    "service.backends",
                    format!("backend {} shadows the virtual ip", backend.ip),
                ));
            }
            if !seen_ips.insert(backend.ip) {
                return Err(FlowmgrError::invalid_config(
                    "service.backends",
                    format!("duplicate backend ip {}", backend.ip),
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_defaults_match_reference_layout() {
        let config = ControllerConfig::default();
        config.validate().unwrap();

        assert_eq!(config.listener.bind_addr, "0.0.0.0:6633");
        assert_eq!(config.service.virtual_ip, Ipv4Addr::new(10, 0, 0, 100));
        assert_eq!(config.service.service_port, 8080);
        assert_eq!(config.service.backends.len(), 2);
        assert_eq!(config.service.backends[0].ip, Ipv4Addr::new(10, 0, 0, 101));
        assert_eq!(config.service.backends[0].port, PortNo::new(1));
        assert_eq!(config.service.backends[1].ip, Ipv4Addr::new(10, 0, 0, 102));
        assert_eq!(config.service.backends[1].port, PortNo::new(2));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
[listener]
bind_addr = "127.0.0.1:6653"

[service]
virtual_ip = "192.168.1.50"
service_port = 80

[[service.backends]]
ip = "192.168.1.51"
mac = "00:00:00:00:01:01"
port = 4

[[service.backends]]
ip = "192.168.1.52"
mac = "00:00:00:00:01:02"
port = 5
"#
        )
        .unwrap();

        let config = ControllerConfig::load(file.path()).unwrap();
        assert_eq!(config.listener.bind_addr, "127.0.0.1:6653");
        assert_eq!(config.service.virtual_ip, Ipv4Addr::new(192, 168, 1, 50));
        assert_eq!(config.service.service_port, 80);
        assert_eq!(config.service.backends[1].port, PortNo::new(5));
        assert_eq!(
            config.service.backends[0].mac,
            MacAddress::new([0, 0, 0, 0, 1, 1])
        );
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "[listener]\nbind_addr = \"127.0.0.1:7000\"\n").unwrap();

        let config = ControllerConfig::load(file.path()).unwrap();
        assert_eq!(config.listener.bind_addr, "127.0.0.1:7000");
        assert_eq!(config.service.service_port, 8080);
        assert_eq!(config.service.backends.len(), 2);
    }

    #[test]
    fn test_validate_rejects_empty_backends() {
        let mut config = ControllerConfig::default();
        config.service.backends.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_backend() {
        let mut config = ControllerConfig::default();
        config.service.backends[1].ip = config.service.backends[0].ip;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_reserved_backend_port() {
        let mut config = ControllerConfig::default();
        config.service.backends[0].port = PortNo::FLOOD;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_bad_bind_addr() {
        let mut config = ControllerConfig::default();
        config.listener.bind_addr = "not-an-address".to_string();
        assert!(config.validate().is_err());
    }
}
