// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

// Main entry point for the PLC simulation environment

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use log::info;
use tokio::signal;

use plc_simulator::config::Config;
use plc_simulator::fieldbus::{Dispatcher, FieldbusManager, FieldbusRegistry};
use plc_simulator::io::IoManager;
use plc_simulator::memory::MemorySpace;

/// PLC simulation environment
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The full path to a JSON configuration file
    conf_file: PathBuf,

    /// Enable verbose logging (debug level)
    #[arg(short = 'v', long = "verbose")]
    verbose: bool,

    /// Disable all logging output
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config = Config::from_file(&args.conf_file)?;

    // Initialize logger with appropriate level based on verbose and quiet
    // flags; the configuration's logging section is the fallback
    let log_level = if args.quiet {
        log::LevelFilter::Off
    } else if args.verbose {
        log::LevelFilter::Debug
    } else {
        config
            .logging
            .level
            .as_deref()
            .and_then(|level| level.parse::<log::LevelFilter>().ok())
            .unwrap_or(log::LevelFilter::Info)
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    let memspace = &config.memory_manager.memspace;
    let memory = Arc::new(MemorySpace::new(
        memspace.blen as usize,
        memspace.w16len as usize,
        memspace.w32len as usize,
        memspace.w64len as usize,
    ));

    let io_manager = IoManager::start(&config.io_manager, memory.clone())?;

    let registry = FieldbusRegistry::new();
    let fieldbus_manager =
        FieldbusManager::new(&config.fieldbus_manager, &config.listener, &registry, memory)?;
    let dispatcher = Dispatcher::start(&config.listener, fieldbus_manager).await?;

    info!("PLC simulator running");

    // Wait for termination signal
    match signal::ctrl_c().await {
        Ok(()) => info!("Received shutdown signal, terminating"),
        Err(err) => eprintln!("Error waiting for shutdown signal: {}", err),
    }

    dispatcher.shutdown();
    io_manager.stop();
    dispatcher.join().await;
    io_manager.join().await;

    Ok(())
}
