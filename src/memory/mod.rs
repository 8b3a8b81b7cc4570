// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Memory space of the simulated PLC
//!
//! This module provides the shared register file that every other component
//! works against. The memory space is partitioned into four typed sections:
//!
//! - `bits`: single-bit cells, stored packed in bytes
//! - `words16`: 16-bit unsigned words
//! - `words32`: 32-bit unsigned words
//! - `words64`: 64-bit unsigned words
//!
//! Section lengths are fixed at construction. All accessors take the internal
//! lock once per call, so a multi-element read or write is atomic with
//! respect to every other memory space call. Values written to a section are
//! truncated modulo 2^w where w is the section's element width.
//!
//! Read-side transforms can be installed per address: when the stored value
//! falls inclusively within the transform's input range, the transform's
//! output value is substituted in the returned view. The stored cell is never
//! modified by a transform.

use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of bits per byte in the packed bits section.
pub const BITS_PER_BYTE: usize = 8;

/// The four typed sections of the memory space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Section {
    Bits,
    Words16,
    Words32,
    Words64,
}

impl Section {
    /// Element width of the section in bits.
    pub fn width_bits(self) -> u32 {
        match self {
            Section::Bits => 1,
            Section::Words16 => 16,
            Section::Words32 => 32,
            Section::Words64 => 64,
        }
    }

    /// Largest value an element of this section can hold.
    pub fn max_value(self) -> u64 {
        match self {
            Section::Bits => 1,
            Section::Words16 => u16::MAX as u64,
            Section::Words32 => u32::MAX as u64,
            Section::Words64 => u64::MAX,
        }
    }

    /// Truncate a wide value modulo 2^w, the write convention of the
    /// memory space.
    pub fn truncate(self, value: i128) -> u64 {
        match self {
            Section::Words64 => value as u64,
            _ => (value & ((1i128 << self.width_bits()) - 1)) as u64,
        }
    }
}

impl fmt::Display for Section {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Section::Bits => "bits",
            Section::Words16 => "words16",
            Section::Words32 => "words32",
            Section::Words64 => "words64",
        };
        f.write_str(name)
    }
}

/// Errors surfaced by memory space accessors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    /// The reference `(section, addr, count)` exceeds the section bounds.
    #[error("memspace section {section} bounds exceeded: addr {addr} + count {count} > length {len}")]
    OutOfBounds {
        section: Section,
        addr: usize,
        count: usize,
        len: usize,
    },
}

/// A read-side value substitution attached to a single address.
///
/// When the stored value lies inclusively within `[input_low, input_high]`,
/// `output` is returned instead. An absent output is a passthrough rule: the
/// stored value is returned unchanged even when the input range matches.
#[derive(Debug, Clone, Copy)]
pub struct Transform {
    pub input_low: i128,
    pub input_high: i128,
    pub output: Option<u64>,
}

impl Transform {
    fn apply(&self, stored: u64) -> u64 {
        let value = stored as i128;
        if self.input_low <= value && value <= self.input_high {
            self.output.unwrap_or(stored)
        } else {
            stored
        }
    }
}

#[derive(Debug)]
struct Inner {
    bits: Vec<u8>,
    words16: Vec<u16>,
    words32: Vec<u32>,
    words64: Vec<u64>,
    transforms: HashMap<(Section, usize), Transform>,
}

/// The shared, lock-mediated register file of the simulated PLC.
#[derive(Debug)]
pub struct MemorySpace {
    blen: usize,
    w16len: usize,
    w32len: usize,
    w64len: usize,
    inner: Mutex<Inner>,
}

impl MemorySpace {
    /// Create a memory space with the given section lengths.
    ///
    /// `blen` is rounded up to the next multiple of [`BITS_PER_BYTE`] so the
    /// bits section always covers whole bytes.
    pub fn new(blen: usize, w16len: usize, w32len: usize, w64len: usize) -> Self {
        let mut bits_nbytes = blen / BITS_PER_BYTE;
        if blen % BITS_PER_BYTE > 0 {
            bits_nbytes += 1;
        }

        MemorySpace {
            blen: bits_nbytes * BITS_PER_BYTE,
            w16len,
            w32len,
            w64len,
            inner: Mutex::new(Inner {
                bits: vec![0; bits_nbytes],
                words16: vec![0; w16len],
                words32: vec![0; w32len],
                words64: vec![0; w64len],
                transforms: HashMap::new(),
            }),
        }
    }

    /// Length of the given section in elements of its native width.
    pub fn section_len(&self, section: Section) -> usize {
        match section {
            Section::Bits => self.blen,
            Section::Words16 => self.w16len,
            Section::Words32 => self.w32len,
            Section::Words64 => self.w64len,
        }
    }

    fn check_bounds(
        &self,
        section: Section,
        addr: usize,
        count: usize,
    ) -> Result<(), MemoryError> {
        let len = self.section_len(section);
        match addr.checked_add(count) {
            Some(end) if end <= len => Ok(()),
            _ => Err(MemoryError::OutOfBounds {
                section,
                addr,
                count,
                len,
            }),
        }
    }

    /// Read `nbits` logical bit values starting at `addr`, post-transform.
    pub fn get_bits(&self, addr: usize, nbits: usize) -> Result<Vec<u8>, MemoryError> {
        self.check_bounds(Section::Bits, addr, nbits)?;

        let inner = self.inner.lock().unwrap();
        let mut out = Vec::with_capacity(nbits);
        for k in addr..addr + nbits {
            let stored = (inner.bits[k >> 3] >> (k & 7)) & 1;
            let value = match inner.transforms.get(&(Section::Bits, k)) {
                Some(t) => (t.apply(stored as u64) & 1) as u8,
                None => stored,
            };
            out.push(value);
        }

        Ok(out)
    }

    /// Write one logical bit per input element starting at `addr`. Only the
    /// least significant bit of each input is stored (truncation modulo 2).
    pub fn set_bits(&self, addr: usize, bits: &[u8]) -> Result<(), MemoryError> {
        self.check_bounds(Section::Bits, addr, bits.len())?;

        let mut inner = self.inner.lock().unwrap();
        for (i, b) in bits.iter().enumerate() {
            let k = addr + i;
            let mask = 1u8 << (k & 7);
            if b & 1 != 0 {
                inner.bits[k >> 3] |= mask;
            } else {
                inner.bits[k >> 3] &= !mask;
            }
        }

        Ok(())
    }

    /// Read `nwords` elements from a word section, post-transform, widened
    /// to u64.
    ///
    /// # Panics
    ///
    /// Panics when called on the bits section; that is a programmer error,
    /// not a runtime condition.
    pub fn get_words(
        &self,
        section: Section,
        addr: usize,
        nwords: usize,
    ) -> Result<Vec<u64>, MemoryError> {
        assert!(
            section != Section::Bits,
            "word accessor used on the bits section"
        );
        self.check_bounds(section, addr, nwords)?;

        let inner = self.inner.lock().unwrap();
        let mut out = Vec::with_capacity(nwords);
        for i in addr..addr + nwords {
            let stored = match section {
                Section::Words16 => inner.words16[i] as u64,
                Section::Words32 => inner.words32[i] as u64,
                Section::Words64 => inner.words64[i],
                Section::Bits => unreachable!(),
            };
            let value = match inner.transforms.get(&(section, i)) {
                Some(t) => section.truncate(t.apply(stored) as i128),
                None => stored,
            };
            out.push(value);
        }

        Ok(out)
    }

    /// Write elements to a word section, truncating each value modulo the
    /// section width.
    ///
    /// # Panics
    ///
    /// Panics when called on the bits section.
    pub fn set_words(
        &self,
        section: Section,
        addr: usize,
        values: &[u64],
    ) -> Result<(), MemoryError> {
        assert!(
            section != Section::Bits,
            "word accessor used on the bits section"
        );
        self.check_bounds(section, addr, values.len())?;

        let mut inner = self.inner.lock().unwrap();
        for (i, v) in values.iter().enumerate() {
            match section {
                Section::Words16 => inner.words16[addr + i] = *v as u16,
                Section::Words32 => inner.words32[addr + i] = *v as u32,
                Section::Words64 => inner.words64[addr + i] = *v,
                Section::Bits => unreachable!(),
            }
        }

        Ok(())
    }

    /// Register a read-side transform at a single address. Installing a
    /// second transform at the same address replaces the first.
    pub fn install_transform(
        &self,
        section: Section,
        addr: usize,
        transform: Transform,
    ) -> Result<(), MemoryError> {
        self.check_bounds(section, addr, 1)?;
        self.inner
            .lock()
            .unwrap()
            .transforms
            .insert((section, addr), transform);
        Ok(())
    }

    /// Big-endian byte serialization of a view, post-transform, suitable for
    /// wire emission. For the bits section this is the LSB-first packed coil
    /// encoding.
    pub fn snapshot(
        &self,
        section: Section,
        addr: usize,
        count: usize,
    ) -> Result<Vec<u8>, MemoryError> {
        match section {
            Section::Bits => Ok(pack_bits(&self.get_bits(addr, count)?)),
            _ => {
                let words = self.get_words(section, addr, count)?;
                let wbytes = (section.width_bits() / 8) as usize;
                let mut out = Vec::with_capacity(count * wbytes);
                for w in words {
                    out.extend_from_slice(&w.to_be_bytes()[8 - wbytes..]);
                }
                Ok(out)
            }
        }
    }
}

/// Pack logical bit values into bytes, lowest-addressed bit in bit 0 of the
/// first byte (LSB-first). Trailing bits of the final byte are zero. This
/// ordering is wire-significant for Modbus coil payloads.
pub fn pack_bits(bits: &[u8]) -> Vec<u8> {
    let mut nbytes = bits.len() / BITS_PER_BYTE;
    if bits.len() % BITS_PER_BYTE > 0 {
        nbytes += 1;
    }

    let mut out = vec![0u8; nbytes];
    for (i, b) in bits.iter().enumerate() {
        if b & 1 != 0 {
            out[i >> 3] |= 1 << (i & 7);
        }
    }
    out
}

/// Inverse of [`pack_bits`]: expand `nbits` logical bit values out of an
/// LSB-first packed byte slice.
pub fn unpack_bits(bytes: &[u8], nbits: usize) -> Vec<u8> {
    (0..nbits).map(|i| (bytes[i >> 3] >> (i & 7)) & 1).collect()
}
