// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Memory manager configuration
//!
//! This module defines the structures for configuring the section lengths of
//! the simulated PLC memory space.

use serde::{Deserialize, Serialize};

/// Configuration for the memory manager component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryManagerConfig {
    /// The dimensions of the memory space sections.
    #[serde(default)]
    pub memspace: MemspaceConfig,
}

/// Section lengths of the memory space.
///
/// All lengths default to zero; a section with length zero simply rejects
/// every non-empty access. `blen` is rounded up to a multiple of 8 at
/// construction so the bits section covers whole bytes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemspaceConfig {
    /// Number of slots in the bits section.
    #[serde(default)]
    pub blen: u32,

    /// Number of slots in the 16-bit words section.
    #[serde(default)]
    pub w16len: u32,

    /// Number of slots in the 32-bit words section.
    #[serde(default)]
    pub w32len: u32,

    /// Number of slots in the 64-bit words section.
    #[serde(default)]
    pub w64len: u32,
}
