// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration utilities
//!
//! This module provides validation helpers for configuration rules that
//! cannot be expressed through deserialization alone.

use std::collections::HashSet;

use anyhow::{bail, Result};
use log::debug;

use super::Config;

/// Check if a string is a valid IP address
///
/// Validates that a string represents a valid IPv4 or IPv6 address,
/// or is one of the special values like "localhost" or "0.0.0.0".
pub fn is_valid_ip_address(addr: &str) -> bool {
    if addr.parse::<std::net::IpAddr>().is_ok() {
        return true;
    }

    // Special cases
    matches!(addr, "localhost" | "::" | "::0" | "0.0.0.0")
}

/// Validates the configuration against rules that aren't covered by
/// deserialization.
///
/// This checks:
///
/// - **Port range**: listener and module ports must be in 1-65534
/// - **Address format**: a non-IP listener host only triggers a debug note,
///   since it may still resolve
/// - **Port uniqueness**: two fieldbus modules may not share a port
/// - **Simulation pauses**: must be finite and non-negative
pub fn validate_specific_rules(config: &Config) -> Result<()> {
    debug!("Performing additional validation checks");

    if config.listener.port < 1 || config.listener.port > 65534 {
        bail!("Invalid listener port number: {}", config.listener.port);
    }

    // Check if the address is in a valid format
    if !is_valid_ip_address(&config.listener.host) {
        debug!(
            "Potentially invalid listener host format: {}",
            config.listener.host
        );
        // Just issue a note but don't block; host names are resolved at bind
    }

    let mut seen_ports = HashSet::new();
    for module in &config.fieldbus_manager.modules {
        let port = module.port.unwrap_or(config.listener.port);
        if port < 1 || port > 65534 {
            bail!("Invalid port number for module {}: {}", module.id, port);
        }
        if !seen_ports.insert(port) {
            bail!("Two fieldbus modules configured on port {}", port);
        }
    }

    for simulation in &config.io_manager.simulations {
        if !simulation.pause.is_finite() || simulation.pause < 0.0 {
            bail!(
                "Invalid pause for simulation of {}: {}",
                simulation.memspace.section,
                simulation.pause
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ListenerConfig, ModuleConfig};

    fn module_on_port(id: &str, port: Option<u16>) -> ModuleConfig {
        ModuleConfig {
            module: None,
            class: "modbus".to_string(),
            id: id.to_string(),
            port,
            conf: serde_json::Value::Null,
        }
    }

    #[test]
    fn default_config_is_valid() {
        assert!(validate_specific_rules(&Config::default()).is_ok());
    }

    #[test]
    fn duplicate_module_ports_are_rejected() {
        let mut config = Config::default();
        config.fieldbus_manager.modules = vec![
            module_on_port("modbus0", Some(5020)),
            module_on_port("modbus1", Some(5020)),
        ];

        let result = validate_specific_rules(&config);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("port 5020"));
    }

    #[test]
    fn module_without_port_collides_with_listener_port() {
        let mut config = Config {
            listener: ListenerConfig {
                port: 5555,
                ..ListenerConfig::default()
            },
            ..Config::default()
        };
        config.fieldbus_manager.modules = vec![
            module_on_port("modbus0", None),
            module_on_port("modbus1", Some(5555)),
        ];

        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn zero_listener_port_is_rejected() {
        let config = Config {
            listener: ListenerConfig {
                port: 0,
                ..ListenerConfig::default()
            },
            ..Config::default()
        };
        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn negative_pause_is_rejected() {
        let config: Config = serde_json::from_value(serde_json::json!({
            "io_manager": {
                "simulations": [{
                    "memspace": {"section": "words16", "addr": 0, "nwords": 1},
                    "function": {"type": "binary"},
                    "pause": -1.0
                }]
            }
        }))
        .unwrap();

        assert!(validate_specific_rules(&config).is_err());
    }

    #[test]
    fn ip_address_validation() {
        assert!(is_valid_ip_address("127.0.0.1"));
        assert!(is_valid_ip_address("::1"));
        assert!(is_valid_ip_address("localhost"));
        assert!(is_valid_ip_address("0.0.0.0"));
        assert!(!is_valid_ip_address("not-an-address!"));
    }
}
