// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Network listener configuration
//!
//! This module defines the structure for configuring the TCP listener of the
//! fieldbus dispatcher.

use serde::{Deserialize, Serialize};

/// Configuration for the TCP listener.
///
/// The host and backlog apply to every bound port; the port is the default
/// binding and can be overridden per fieldbus module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    /// The host name or address to bind the listening sockets to.
    #[serde(default = "default_host")]
    pub host: String,

    /// The default TCP port to bind to when a fieldbus module does not
    /// declare its own port.
    #[serde(default = "default_port")]
    pub port: u16,

    /// The number of pending connection requests to queue per listener.
    #[serde(default = "default_backlog")]
    pub backlog: u32,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    5555
}

fn default_backlog() -> u32 {
    10
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            backlog: default_backlog(),
        }
    }
}
