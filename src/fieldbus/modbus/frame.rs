// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Modbus/TCP framing
//!
//! One ADU is a 7-byte MBAP header followed by the PDU. The MBAP length
//! field counts the unit identifier plus the PDU bytes, so a frame body is
//! `length - 1` bytes once the header has been read.

use anyhow::{bail, Result};
use tokio::io::{AsyncRead, AsyncReadExt};

/// MBAP header length for Modbus/TCP:
/// Transaction ID(2) + Protocol ID(2) + Length(2) + Unit ID(1).
pub const MBAP_HEADER_LEN: usize = 7;

/// Maximum value of the MBAP length field: unit identifier plus the 253-byte
/// maximum PDU inherited from the serial frame limit.
pub const MAX_MBAP_LENGTH: usize = 254;

/// The fixed fields of the MBAP header. The length field is derived from
/// the PDU on encode and consumed on decode, so it is not carried here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MbapHeader {
    pub transaction_id: u16,
    pub protocol_id: u16,
    pub unit_id: u8,
}

/// One decoded ADU: the header and the PDU bytes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub header: MbapHeader,
    pub pdu: Vec<u8>,
}

/// Read one ADU from the reader.
///
/// Returns `Ok(None)` on a clean EOF before a new frame. EOF in the middle
/// of a frame, a nonzero protocol identifier, or a length outside `2..=254`
/// are errors; the session terminates on them.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Frame>> {
    let mut header = [0u8; MBAP_HEADER_LEN];
    match reader.read_exact(&mut header).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let transaction_id = u16::from_be_bytes([header[0], header[1]]);
    let protocol_id = u16::from_be_bytes([header[2], header[3]]);
    let length = u16::from_be_bytes([header[4], header[5]]) as usize;
    let unit_id = header[6];

    if protocol_id != 0 {
        bail!("Invalid MBAP protocol identifier: {}", protocol_id);
    }
    if !(2..=MAX_MBAP_LENGTH).contains(&length) {
        bail!("Invalid MBAP length: {}", length);
    }

    let mut pdu = vec![0u8; length - 1];
    reader.read_exact(&mut pdu).await?;

    Ok(Some(Frame {
        header: MbapHeader {
            transaction_id,
            protocol_id,
            unit_id,
        },
        pdu,
    }))
}

/// Encode an ADU from a header and a response PDU. The length field is
/// computed; transaction and unit identifiers are taken from the header
/// (echoed from the request).
pub fn encode_frame(header: MbapHeader, pdu: &[u8]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(MBAP_HEADER_LEN + pdu.len());
    buf.extend_from_slice(&header.transaction_id.to_be_bytes());
    buf.extend_from_slice(&0u16.to_be_bytes());
    buf.extend_from_slice(&((pdu.len() + 1) as u16).to_be_bytes());
    buf.push(header.unit_id);
    buf.extend_from_slice(pdu);
    buf
}
