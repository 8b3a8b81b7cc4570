// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! IO manager for the PLC simulator
//!
//! This module runs the IO simulations: one independent task per configured
//! simulation, each periodically computing values through its simulation
//! function and writing them into its target view of the memory space.
//!
//! Tasks observe the shutdown flag at pause boundaries, so the maximum
//! shutdown latency is the longest configured pause. A simulation that fails
//! at runtime (out-of-bounds access, undefined arithmetic) is logged and
//! terminates alone; the other simulations continue.

pub mod function;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use log::{debug, error, info};
use tokio::task::JoinHandle;
use tokio::time;

use crate::config::{IoManagerConfig, MemspaceRef, SimulationConfig};
use crate::memory::{MemoryError, MemorySpace, Section};
use function::FunctionState;

/// A fully resolved view into the memory space: section, start address and
/// element count, bounds-checked against the section length at resolution.
#[derive(Debug, Clone, Copy)]
pub struct ResolvedRef {
    pub section: Section,
    pub addr: usize,
    pub nrefs: usize,
}

impl ResolvedRef {
    /// Resolve a configured reference against the memory space, failing when
    /// the count key is missing or the view exceeds the section bounds.
    pub fn resolve(conf: &MemspaceRef, memory: &MemorySpace) -> Result<Self> {
        let nrefs = conf.nrefs()?;
        let len = memory.section_len(conf.section);
        if conf.addr.checked_add(nrefs).map_or(true, |end| end > len) {
            anyhow::bail!(
                "memspace ref {}:{}+{} exceeds section length {}",
                conf.section,
                conf.addr,
                nrefs,
                len
            );
        }
        Ok(ResolvedRef {
            section: conf.section,
            addr: conf.addr,
            nrefs,
        })
    }

    /// Read the view, element values widened to u64.
    pub fn read(&self, memory: &MemorySpace) -> Result<Vec<u64>, MemoryError> {
        match self.section {
            Section::Bits => Ok(memory
                .get_bits(self.addr, self.nrefs)?
                .into_iter()
                .map(u64::from)
                .collect()),
            section => memory.get_words(section, self.addr, self.nrefs),
        }
    }

    /// Write element values into the view, truncating to the section width.
    pub fn write(&self, memory: &MemorySpace, values: &[u64]) -> Result<(), MemoryError> {
        match self.section {
            Section::Bits => {
                let bits: Vec<u8> = values.iter().map(|v| (v & 1) as u8).collect();
                memory.set_bits(self.addr, &bits)
            }
            section => memory.set_words(section, self.addr, values),
        }
    }
}

/// IO manager owning the simulation tasks.
pub struct IoManager {
    tasks: Vec<JoinHandle<()>>,
    running: Arc<AtomicBool>,
}

impl IoManager {
    /// Parse the simulation list and launch one independent task per entry.
    ///
    /// Every simulation is resolved and validated before any task starts, so
    /// configuration errors are reported without leaving stray tasks behind.
    pub fn start(conf: &IoManagerConfig, memory: Arc<MemorySpace>) -> Result<Self> {
        let running = Arc::new(AtomicBool::new(true));

        let mut prepared = Vec::with_capacity(conf.simulations.len());
        for simulation in &conf.simulations {
            let id = define_id(simulation);
            let target = ResolvedRef::resolve(&simulation.memspace, &memory)
                .with_context(|| format!("Simulation {}", id))?;
            let state = FunctionState::from_config(simulation, target, &memory)
                .with_context(|| format!("Simulation {}", id))?;
            prepared.push((id, target, state, Duration::from_secs_f64(simulation.pause)));
        }

        let mut tasks = Vec::with_capacity(prepared.len());
        for (id, target, state, pause) in prepared {
            info!("Starting simulation {}", id);
            let memory = memory.clone();
            let running = running.clone();
            tasks.push(tokio::spawn(run_simulation(
                id, state, target, pause, memory, running,
            )));
        }

        Ok(IoManager { tasks, running })
    }

    /// Signal all simulation tasks to stop. Tasks observe the signal at
    /// their next pause boundary.
    pub fn stop(&self) {
        info!("Stopping IO simulations");
        self.running.store(false, Ordering::SeqCst);
    }

    /// Wait for all simulation tasks to exit.
    pub async fn join(self) {
        for task in self.tasks {
            if let Err(e) = task.await {
                error!("Simulation task panicked: {}", e);
            }
        }
    }
}

async fn run_simulation(
    id: String,
    mut state: FunctionState,
    target: ResolvedRef,
    pause: Duration,
    memory: Arc<MemorySpace>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        match state.tick(&memory, target) {
            Ok(Some(values)) => {
                if let Err(e) = target.write(&memory, &values) {
                    error!("Simulation {}: {}", id, e);
                    return;
                }
            }
            Ok(None) => {}
            Err(e) => {
                error!("Simulation {}: {}", id, e);
                return;
            }
        }
        time::sleep(pause).await;
    }
    debug!("Simulation {} stopped", id);
}

/// Get the ID for the simulation or construct one if not present.
///
/// When the configuration doesn't include an `id`, a unique one is built
/// from the simulation's memory space and function descriptors.
fn define_id(conf: &SimulationConfig) -> String {
    if let Some(id) = &conf.id {
        if !id.is_empty() {
            return id.clone();
        }
    }

    let mem = &conf.memspace;
    let nrefs = mem.nwords.or(mem.nbits).or(mem.nrefs).unwrap_or(0);
    format!(
        "{}:{}:{}:{}",
        mem.section,
        mem.addr,
        nrefs,
        conf.function.type_name()
    )
}
