// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fieldbus manager for the PLC simulator
//!
//! This module provides the fieldbus side of the simulator:
//!
//! - [`FieldbusModule`]: the capability a fieldbus implementation exposes,
//!   servicing one client connection against the shared memory space
//! - [`FieldbusRegistry`]: an explicit registry mapping configuration class
//!   names to module factories, populated at program start
//! - [`FieldbusManager`]: instantiates the configured modules and tables
//!   them by TCP port for the dispatcher
//!
//! ## Key Components
//!
//! The only built-in registry class is `"modbus"`, the Modbus/TCP reference
//! implementation in [`modbus`]. Additional fieldbuses plug in by registering
//! another factory; nothing else in the simulator changes.

pub mod dispatcher;
pub mod modbus;

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use log::info;
use tokio::net::TcpStream;

use crate::config::{FieldbusManagerConfig, ListenerConfig, ModuleConfig};
use crate::memory::MemorySpace;

pub use dispatcher::Dispatcher;
pub use modbus::ModbusModule;

/// A fieldbus protocol implementation bound to one TCP port.
#[async_trait]
pub trait FieldbusModule: Send + Sync {
    /// The configured module instance identifier, used in logging.
    fn id(&self) -> &str;

    /// Service one client connection until EOF, I/O error or a fatal
    /// protocol violation.
    async fn serve(&self, stream: TcpStream, peer: SocketAddr) -> Result<()>;
}

/// Factory signature for fieldbus modules: configuration entry plus the
/// shared memory space.
pub type ModuleFactory = fn(&ModuleConfig, Arc<MemorySpace>) -> Result<Arc<dyn FieldbusModule>>;

/// Explicit registry of fieldbus implementations, keyed by the class name
/// referenced from the configuration.
pub struct FieldbusRegistry {
    factories: HashMap<&'static str, ModuleFactory>,
}

impl FieldbusRegistry {
    /// Create the registry with the built-in fieldbus classes.
    pub fn new() -> Self {
        let mut factories: HashMap<&'static str, ModuleFactory> = HashMap::new();
        factories.insert("modbus", ModbusModule::create);
        FieldbusRegistry { factories }
    }

    /// Instantiate the module class named by the configuration entry.
    pub fn create(
        &self,
        conf: &ModuleConfig,
        memory: Arc<MemorySpace>,
    ) -> Result<Arc<dyn FieldbusModule>> {
        let factory = self
            .factories
            .get(conf.class.as_str())
            .with_context(|| format!("Unknown fieldbus class: {}", conf.class))?;
        factory(conf, memory)
    }
}

impl Default for FieldbusRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Fieldbus manager holding the instantiated modules, tabled by TCP port.
pub struct FieldbusManager {
    modules: HashMap<u16, Arc<dyn FieldbusModule>>,
}

impl FieldbusManager {
    /// Initialise the fieldbus modules from the configuration.
    ///
    /// A module without its own `port` binds the listener's default port.
    /// Two modules on the same port is a configuration error.
    pub fn new(
        conf: &FieldbusManagerConfig,
        listener: &ListenerConfig,
        registry: &FieldbusRegistry,
        memory: Arc<MemorySpace>,
    ) -> Result<Self> {
        let mut modules: HashMap<u16, Arc<dyn FieldbusModule>> = HashMap::new();
        for item in &conf.modules {
            info!("Initialising module {}", item.id);
            let port = item.port.unwrap_or(listener.port);
            let module = registry.create(item, memory.clone())?;
            if modules.insert(port, module).is_some() {
                bail!("Two fieldbus modules configured on port {}", port);
            }
        }
        Ok(FieldbusManager { modules })
    }

    /// Iterate the instantiated modules with their effective ports.
    pub fn modules(&self) -> impl Iterator<Item = (u16, &Arc<dyn FieldbusModule>)> {
        self.modules.iter().map(|(port, module)| (*port, module))
    }

    /// Number of instantiated modules.
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}
