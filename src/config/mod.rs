// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Configuration management for the PLC simulator
//!
//! This module provides functionality for loading and validating the
//! simulator configuration. The configuration is backed by a single JSON
//! document with four recognised top-level sections (unknown keys are
//! ignored):
//!
//! - `listener`: network binding defaults for the fieldbus dispatcher
//! - `fieldbus_manager`: the fieldbus modules to instantiate, keyed by
//!   registry class and bound per port
//! - `memory_manager`: the section lengths of the memory space
//! - `io_manager`: the IO simulations that drive the memory space
//! - `logging`: log subsystem settings, opaque to the core
//!
//! ## Usage
//!
//! ```no_run
//! use plc_simulator::config::Config;
//!
//! let config = Config::from_file("config.json").unwrap();
//! println!("Listener port: {}", config.listener.port);
//! ```

pub mod fieldbus;
pub mod io;
pub mod listener;
pub mod memory;
pub mod utils;

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};

// Re-export all types for public API
pub use fieldbus::{FieldbusManagerConfig, ModuleConfig};
pub use io::{
    FunctionConfig, IoManagerConfig, MemspaceRef, OperandConfig, Operator, SimulationConfig,
    SourceConfig, TransformInput, TransformRule,
};
pub use listener::ListenerConfig;
pub use memory::{MemoryManagerConfig, MemspaceConfig};
pub use utils::{is_valid_ip_address, validate_specific_rules};

/// Root configuration structure for the PLC simulator.
///
/// Every section falls back to its defaults when not present in the
/// configuration file, so a minimal configuration only needs the sections it
/// actually customises.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Network binding defaults for the fieldbus dispatcher.
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Fieldbus modules to instantiate and their port bindings.
    #[serde(default)]
    pub fieldbus_manager: FieldbusManagerConfig,

    /// Section lengths of the memory space.
    #[serde(default)]
    pub memory_manager: MemoryManagerConfig,

    /// IO simulations that drive the memory space.
    #[serde(default)]
    pub io_manager: IoManagerConfig,

    /// Log subsystem settings. Only `level` is interpreted here; the rest of
    /// the section is opaque to the core.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Settings handed to the log subsystem.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level name understood by the logger ("error" through "trace").
    /// Command-line verbosity flags take precedence.
    #[serde(default)]
    pub level: Option<String>,
}

impl Config {
    /// Load and validate the configuration from a JSON file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading configuration from {:?}", path);

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file at {:?}", path))?;

        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse JSON configuration from {:?}", path))?;

        // Perform additional specific validations
        utils::validate_specific_rules(&config)
            .with_context(|| format!("Configuration validation failed for {:?}", path))?;

        Ok(config)
    }
}
