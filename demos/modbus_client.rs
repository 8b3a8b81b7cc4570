// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Example Modbus client to connect to the PLC simulator
//!
//! This example demonstrates how to connect to the simulator and read/write
//! coils and registers. Start the simulator with the example configuration
//! first:
//!
//!   cargo run -- config.example.json
//!
//! Then run this client in another terminal:
//!
//!   cargo run --example modbus_client

use std::error::Error;

use tokio_modbus::prelude::*;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Connect to the Modbus port of the simulator
    let socket_addr = "127.0.0.1:5020".parse().unwrap();
    println!("Connecting to PLC simulator at {}", socket_addr);

    let mut ctx = tcp::connect(socket_addr).await?;

    // Read the first holding registers; with the example configuration these
    // are driven by the counter, waveform and derived simulations
    println!("\n--- Reading Holding Registers (simulated values) ---");
    let holding_regs = ctx.read_holding_registers(0, 5).await??;
    println!("Register 0 (counter):   {}", holding_regs[0]);
    println!("Register 1 (sine):      {}", holding_regs[1]);
    println!("Register 2 (copy):      {}", holding_regs[2]);
    println!("Register 3 (transform): {}", holding_regs[3]);
    println!("Register 4 (operation): {}", holding_regs[4]);

    // Read the first coils; coil 0 toggles under the binary simulation
    println!("\n--- Reading Coils ---");
    let coils = ctx.read_coils(0, 8).await??;
    println!("Coils 0-7: {:?}", coils);

    // Write to a free holding register
    println!("\n--- Writing to Holding Register ---");
    let new_value = 42;
    println!("Writing value {} to holding register 100", new_value);
    ctx.write_single_register(100, new_value).await??;

    // Read back the value to verify
    let updated_regs = ctx.read_holding_registers(100, 1).await??;
    println!("Updated holding register 100: {}", updated_regs[0]);
    assert_eq!(updated_regs[0], new_value);

    // Write to multiple holding registers
    println!("\n--- Writing to Multiple Holding Registers ---");
    let new_values = vec![100, 200, 300];
    println!("Writing values {:?} to holding registers 101-103", new_values);
    ctx.write_multiple_registers(101, &new_values).await??;

    let updated_regs = ctx.read_holding_registers(101, 3).await??;
    println!("Updated holding registers 101-103: {:?}", &updated_regs);
    assert_eq!(updated_regs, new_values);

    // Force a coil on and back off
    println!("\n--- Forcing a Coil ---");
    ctx.write_single_coil(9, true).await??;
    let coil = ctx.read_coils(9, 1).await??;
    println!("Coil 9 after forcing on: {:?}", coil);
    ctx.write_single_coil(9, false).await??;

    // Clean up
    println!("\nDisconnecting from simulator");
    ctx.disconnect().await?;

    println!("Done!");
    Ok(())
}
