// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Fieldbus module: Modbus/TCP
//!
//! The Modbus engine of the simulator: a protocol session repeatedly reads
//! one ADU from the socket, dispatches the contained function code against
//! the memory space and writes one ADU in response. The session terminates
//! on EOF, I/O error or a malformed frame.
//!
//! ## Address mapping
//!
//! Coils and discrete inputs both map to the `bits` section; holding and
//! input registers both map to the `words16` section. The simulator does not
//! distinguish read-only from read-write address spaces, so clients may
//! write to input registers.
//!
//! ## Validation order
//!
//! For every request: quantity limits (exception 0x03), byte-count
//! consistency for the write-multiple functions (0x03), address range
//! against the memory space (0x02), function code recognised (0x01). A
//! request rejected for bounds performs no memory mutation.

pub mod frame;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use log::{debug, error};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;

use crate::config::ModuleConfig;
use crate::memory::{self, MemoryError, MemorySpace, Section};

use super::FieldbusModule;
use frame::{encode_frame, read_frame, Frame};

/// Read Coils (FC01)
pub const FC_READ_COILS: u8 = 0x01;
/// Read Discrete Inputs (FC02)
pub const FC_READ_DISCRETE_INPUTS: u8 = 0x02;
/// Read Holding Registers (FC03)
pub const FC_READ_HOLDING_REGISTERS: u8 = 0x03;
/// Read Input Registers (FC04)
pub const FC_READ_INPUT_REGISTERS: u8 = 0x04;
/// Write Single Coil (FC05)
pub const FC_WRITE_SINGLE_COIL: u8 = 0x05;
/// Write Single Register (FC06)
pub const FC_WRITE_SINGLE_REGISTER: u8 = 0x06;
/// Write Multiple Coils (FC15)
pub const FC_WRITE_MULTIPLE_COILS: u8 = 0x0f;
/// Write Multiple Registers (FC16)
pub const FC_WRITE_MULTIPLE_REGISTERS: u8 = 0x10;

/// Maximum quantity for FC01/FC02 per the Modbus specification.
pub const MAX_READ_BITS: u16 = 2000;
/// Maximum quantity for FC03/FC04.
pub const MAX_READ_REGISTERS: u16 = 125;
/// Maximum quantity for FC15.
pub const MAX_WRITE_BITS: u16 = 1968;
/// Maximum quantity for FC16.
pub const MAX_WRITE_REGISTERS: u16 = 123;

const EXCEPTION_FLAG: u8 = 0x80;

/// Modbus exception codes returned by the simulator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ExceptionCode {
    IllegalFunction = 0x01,
    IllegalDataAddress = 0x02,
    IllegalDataValue = 0x03,
}

/// Modbus/TCP module serving the shared memory space.
pub struct ModbusModule {
    id: String,
    memory: Arc<MemorySpace>,
}

type PduResult = Result<Vec<u8>, ExceptionCode>;

impl ModbusModule {
    /// Registry factory for the `"modbus"` class. The module-specific
    /// configuration object carries no settings for this fieldbus.
    pub fn create(
        conf: &ModuleConfig,
        memory: Arc<MemorySpace>,
    ) -> Result<Arc<dyn FieldbusModule>> {
        Ok(Arc::new(ModbusModule {
            id: conf.id.clone(),
            memory,
        }))
    }

    /// Dispatch one request PDU and build the response PDU, normal or
    /// exception.
    fn handle_pdu(&self, pdu: &[u8]) -> Vec<u8> {
        let function = pdu[0];
        let result = match function {
            FC_READ_COILS | FC_READ_DISCRETE_INPUTS => self.read_bits(pdu),
            FC_READ_HOLDING_REGISTERS | FC_READ_INPUT_REGISTERS => self.read_registers(pdu),
            FC_WRITE_SINGLE_COIL => self.write_single_coil(pdu),
            FC_WRITE_SINGLE_REGISTER => self.write_single_register(pdu),
            FC_WRITE_MULTIPLE_COILS => self.write_multiple_coils(pdu),
            FC_WRITE_MULTIPLE_REGISTERS => self.write_multiple_registers(pdu),
            _ => {
                error!(
                    "{}: unknown or unsupported function: {:#04x}",
                    self.id, function
                );
                Err(ExceptionCode::IllegalFunction)
            }
        };

        match result {
            Ok(response) => response,
            Err(code) => vec![function | EXCEPTION_FLAG, code as u8],
        }
    }

    /// Handle a read-coils or read-discrete-inputs request. The response
    /// carries the requested bits packed LSB-first.
    fn read_bits(&self, pdu: &[u8]) -> PduResult {
        let (addr, qty) = parse_addr_qty(pdu)?;
        if qty == 0 || qty > MAX_READ_BITS {
            return Err(ExceptionCode::IllegalDataValue);
        }

        let bits = self
            .memory
            .get_bits(addr as usize, qty as usize)
            .map_err(|e| self.illegal_address(e))?;
        let packed = memory::pack_bits(&bits);

        debug!(
            "{}: read bits: addr = {}, nbits = {}, data_nbytes = {}",
            self.id,
            addr,
            qty,
            packed.len()
        );

        let mut response = Vec::with_capacity(2 + packed.len());
        response.push(pdu[0]);
        response.push(packed.len() as u8);
        response.extend_from_slice(&packed);
        Ok(response)
    }

    /// Handle a read-holding-registers or read-input-registers request.
    fn read_registers(&self, pdu: &[u8]) -> PduResult {
        let (addr, qty) = parse_addr_qty(pdu)?;
        if qty == 0 || qty > MAX_READ_REGISTERS {
            return Err(ExceptionCode::IllegalDataValue);
        }

        let data = self
            .memory
            .snapshot(Section::Words16, addr as usize, qty as usize)
            .map_err(|e| self.illegal_address(e))?;

        debug!(
            "{}: read registers: addr = {}, nwords = {}, data_nbytes = {}",
            self.id,
            addr,
            qty,
            data.len()
        );

        let mut response = Vec::with_capacity(2 + data.len());
        response.push(pdu[0]);
        response.push(data.len() as u8);
        response.extend_from_slice(&data);
        Ok(response)
    }

    /// Handle a write-single-coil request. The value word is a constant:
    /// 0xFF00 = on, 0x0000 = off. A successful response echoes the request.
    fn write_single_coil(&self, pdu: &[u8]) -> PduResult {
        let (addr, value) = parse_addr_qty(pdu)?;
        let bit = match value {
            0xff00 => 1u8,
            0x0000 => 0u8,
            _ => return Err(ExceptionCode::IllegalDataValue),
        };

        self.memory
            .set_bits(addr as usize, &[bit])
            .map_err(|e| self.illegal_address(e))?;

        debug!("{}: write single coil: addr = {}, bit = {}", self.id, addr, bit);
        Ok(pdu[..5].to_vec())
    }

    /// Handle a write-single-register request. A successful response echoes
    /// the request.
    fn write_single_register(&self, pdu: &[u8]) -> PduResult {
        let (addr, value) = parse_addr_qty(pdu)?;

        self.memory
            .set_words(Section::Words16, addr as usize, &[value as u64])
            .map_err(|e| self.illegal_address(e))?;

        debug!(
            "{}: write single register: addr = {}, value = {}",
            self.id, addr, value
        );
        Ok(pdu[..5].to_vec())
    }

    /// Handle a write-multiple-coils request: addr, qty, byte count, then
    /// the coil bytes packed LSB-first.
    fn write_multiple_coils(&self, pdu: &[u8]) -> PduResult {
        let (addr, qty) = parse_addr_qty(pdu)?;
        if qty == 0 || qty > MAX_WRITE_BITS {
            return Err(ExceptionCode::IllegalDataValue);
        }

        let expected = (qty as usize + 7) / 8;
        if pdu.len() < 6 || pdu[5] as usize != expected || pdu.len() < 6 + expected {
            return Err(ExceptionCode::IllegalDataValue);
        }

        let bits = memory::unpack_bits(&pdu[6..6 + expected], qty as usize);
        self.memory
            .set_bits(addr as usize, &bits)
            .map_err(|e| self.illegal_address(e))?;

        debug!(
            "{}: write multiple coils: addr = {}, nbits = {}",
            self.id, addr, qty
        );
        Ok(pdu[..5].to_vec())
    }

    /// Handle a write-multiple-registers request: addr, qty, byte count,
    /// then the register values, two big-endian bytes each.
    fn write_multiple_registers(&self, pdu: &[u8]) -> PduResult {
        let (addr, qty) = parse_addr_qty(pdu)?;
        if qty == 0 || qty > MAX_WRITE_REGISTERS {
            return Err(ExceptionCode::IllegalDataValue);
        }

        let expected = qty as usize * 2;
        if pdu.len() < 6 || pdu[5] as usize != expected || pdu.len() < 6 + expected {
            return Err(ExceptionCode::IllegalDataValue);
        }

        let values: Vec<u64> = pdu[6..6 + expected]
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]) as u64)
            .collect();
        self.memory
            .set_words(Section::Words16, addr as usize, &values)
            .map_err(|e| self.illegal_address(e))?;

        debug!(
            "{}: write multiple registers: addr = {}, nwords = {}",
            self.id, addr, qty
        );
        Ok(pdu[..5].to_vec())
    }

    fn illegal_address(&self, e: MemoryError) -> ExceptionCode {
        // Request exceeds the bounds of the memory space. Inform the client
        error!("{}: {}", self.id, e);
        ExceptionCode::IllegalDataAddress
    }
}

/// Parse the address and quantity (or value) words that follow the function
/// code. A PDU too short to carry them is reported as an illegal data value.
fn parse_addr_qty(pdu: &[u8]) -> Result<(u16, u16), ExceptionCode> {
    if pdu.len() < 5 {
        return Err(ExceptionCode::IllegalDataValue);
    }
    Ok((
        u16::from_be_bytes([pdu[1], pdu[2]]),
        u16::from_be_bytes([pdu[3], pdu[4]]),
    ))
}

#[async_trait]
impl FieldbusModule for ModbusModule {
    fn id(&self) -> &str {
        &self.id
    }

    async fn serve(&self, mut stream: TcpStream, peer: SocketAddr) -> Result<()> {
        debug!("{}: serving client {}", self.id, peer);

        loop {
            let Frame { header, pdu } = match read_frame(&mut stream).await? {
                Some(frame) => frame,
                None => break,
            };

            debug!(
                "{}: request: function {:#04x}, {} PDU bytes",
                self.id,
                pdu[0],
                pdu.len()
            );

            let response = self.handle_pdu(&pdu);
            stream.write_all(&encode_frame(header, &response)).await?;
        }

        debug!("{}: client {} disconnected", self.id, peer);
        Ok(())
    }
}
