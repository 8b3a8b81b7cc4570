// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fieldbus manager configuration
//!
//! This module defines the structures for configuring the fieldbus modules
//! that expose the memory space to clients.

use serde::{Deserialize, Serialize};

/// Configuration for the fieldbus manager component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FieldbusManagerConfig {
    /// The fieldbus modules to instantiate.
    #[serde(default)]
    pub modules: Vec<ModuleConfig>,
}

/// One fieldbus module instance and its port binding.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleConfig {
    /// Opaque module path, retained for compatibility with older
    /// configurations. The registry key is `class`.
    #[serde(default)]
    pub module: Option<String>,

    /// Registry key selecting the fieldbus implementation, e.g. "modbus".
    pub class: String,

    /// Human identifier for this module instance, used in logging.
    pub id: String,

    /// TCP port to bind for this module. Falls back to the listener port
    /// when absent. Two modules on the same port is a configuration error.
    #[serde(default)]
    pub port: Option<u16>,

    /// Module-specific settings, passed verbatim to the module factory.
    #[serde(default)]
    pub conf: serde_json::Value,
}
