// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for the Modbus/TCP server against a real Modbus client
//!
//! These tests validate the protocol engine by starting a server instance
//! and connecting to it via a Modbus client. Various Modbus operations are
//! tested including reading and writing coils and registers, error
//! conditions, and the visibility of IO simulation output.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time;
use tokio_modbus::prelude::*;

use plc_simulator::config::ModuleConfig;
use plc_simulator::fieldbus::FieldbusRegistry;
use plc_simulator::memory::MemorySpace;

fn test_module_config() -> ModuleConfig {
    ModuleConfig {
        module: None,
        class: "modbus".to_string(),
        id: "modbus0".to_string(),
        port: None,
        conf: serde_json::Value::Null,
    }
}

/// Test utility function to start a Modbus server on an OS-assigned port.
async fn start_test_server(
    memory: Arc<MemorySpace>,
) -> Result<(SocketAddr, tokio::task::JoinHandle<()>), Box<dyn std::error::Error>> {
    // Use port 0 to let the OS assign an available port
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let socket_addr = listener.local_addr()?;

    let registry = FieldbusRegistry::new();
    let module = registry.create(&test_module_config(), memory)?;

    let handle = tokio::spawn(async move {
        loop {
            let Ok((stream, peer)) = listener.accept().await else {
                break;
            };
            let module = module.clone();
            tokio::spawn(async move {
                let _ = module.serve(stream, peer).await;
            });
        }
    });

    Ok((socket_addr, handle))
}

fn default_memory() -> Arc<MemorySpace> {
    Arc::new(MemorySpace::new(64, 32, 0, 0))
}

#[tokio::test]
async fn test_write_and_read_holding_registers() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    let values = vec![101, 202, 303];
    ctx.write_multiple_registers(1, &values).await??;

    let data = ctx.read_holding_registers(1, 3).await??;
    assert_eq!(data, values);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_single_register() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    ctx.write_single_register(2, 999).await??;

    let data = ctx.read_holding_registers(2, 1).await??;
    assert_eq!(data.len(), 1);
    assert_eq!(data[0], 999);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_input_registers_share_the_register_file() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    // The simulator does not distinguish holding from input registers
    ctx.write_single_register(5, 4321).await??;
    let data = ctx.read_input_registers(5, 1).await??;
    assert_eq!(data[0], 4321);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_and_read_coils() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    ctx.write_single_coil(3, true).await??;

    let coils = ctx.read_coils(0, 8).await??;
    assert_eq!(
        coils,
        [false, false, false, true, false, false, false, false]
    );

    // Discrete inputs map to the same bits
    let inputs = ctx.read_discrete_inputs(3, 1).await??;
    assert_eq!(inputs, [true]);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_write_multiple_coils() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    let pattern = [true, false, true, true, false, false, true, false, true];
    ctx.write_multiple_coils(4, &pattern).await??;

    let coils = ctx.read_coils(4, pattern.len() as u16).await??;
    assert_eq!(coils, pattern);

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_register_address() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    // The words16 section holds 32 registers; read past the end
    let result = ctx.read_holding_registers(30, 5).await?;

    // We expect an IllegalDataAddress exception
    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.to_string(), "Illegal data address");
    }

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_invalid_coil_address() -> Result<(), Box<dyn std::error::Error>> {
    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    let mut ctx = tcp::connect(socket_addr).await?;

    let result = ctx.read_coils(60, 10).await?;
    assert!(result.is_err());
    if let Err(error) = result {
        assert_eq!(error.to_string(), "Illegal data address");
    }

    ctx.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_multiple_clients() -> Result<(), Box<dyn std::error::Error>> {
    let test_register = 7;
    let test_value = 888;

    let (socket_addr, _server_handle) = start_test_server(default_memory()).await?;

    // Connect two independent clients
    let mut client1 = tcp::connect(socket_addr).await?;
    let mut client2 = tcp::connect(socket_addr).await?;

    client1
        .write_single_register(test_register, test_value)
        .await??;

    // Client 2 reads the register to verify the value is there
    let data = client2.read_holding_registers(test_register, 1).await??;
    assert_eq!(data.len(), 1);
    assert_eq!(data[0], test_value);

    client1.disconnect().await?;
    client2.disconnect().await?;
    Ok(())
}

#[tokio::test]
async fn test_simulation_output_is_visible_over_modbus() -> Result<(), Box<dyn std::error::Error>>
{
    use plc_simulator::config::IoManagerConfig;
    use plc_simulator::io::IoManager;

    let memory = default_memory();
    let (socket_addr, _server_handle) = start_test_server(memory.clone()).await?;

    // A static simulation writing 321 to words16[2] with a long pause: the
    // first tick fires immediately, after which the value must be readable
    let io_conf: IoManagerConfig = serde_json::from_value(serde_json::json!({
        "simulations": [{
            "memspace": {"section": "words16", "addr": 2, "nwords": 1},
            "function": {"type": "static", "value": 321},
            "pause": 60.0
        }]
    }))?;
    let io_manager = IoManager::start(&io_conf, memory)?;

    // Give the first tick a moment to land
    time::sleep(Duration::from_millis(200)).await;

    let mut ctx = tcp::connect(socket_addr).await?;
    let data = ctx.read_holding_registers(2, 1).await??;
    assert_eq!(data, [321]);

    ctx.disconnect().await?;
    io_manager.stop();
    Ok(())
}
