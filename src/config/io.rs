// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! IO manager configuration
//!
//! This module defines the structures for configuring the IO simulations
//! that drive the memory space: the target (and optional source) memory
//! references, the simulation function and its parameters, and the pause
//! between ticks.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::memory::Section;

/// Configuration for the IO manager component.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IoManagerConfig {
    /// The IO simulations to run.
    #[serde(default)]
    pub simulations: Vec<SimulationConfig>,
}

/// One IO simulation: a periodic task driving a view of the memory space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Human identifier. Synthesized from the memspace and function
    /// descriptors when absent.
    #[serde(default)]
    pub id: Option<String>,

    /// The target view written by the simulation.
    pub memspace: MemspaceRef,

    /// Source view, required by the `copy` function.
    #[serde(default)]
    pub source: Option<SourceConfig>,

    /// Operand list, required by the `operation` function.
    #[serde(default)]
    pub operands: Option<Vec<OperandConfig>>,

    /// The simulation function and its parameters.
    pub function: FunctionConfig,

    /// Wall-clock pause between ticks, in seconds.
    pub pause: f64,
}

/// Source wrapper around a memory space reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub memspace: MemspaceRef,
}

/// A reference to a view of the memory space: a section, a start address and
/// an element count. The count can be spelled `nwords`, `nbits` or the
/// generic `nrefs`, whichever reads best for the section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemspaceRef {
    pub section: Section,
    pub addr: usize,
    #[serde(default)]
    pub nwords: Option<usize>,
    #[serde(default)]
    pub nbits: Option<usize>,
    #[serde(default)]
    pub nrefs: Option<usize>,
}

impl MemspaceRef {
    /// The element count of the reference, whichever key spelled it.
    pub fn nrefs(&self) -> Result<usize> {
        self.nwords
            .or(self.nbits)
            .or(self.nrefs)
            .context("memspace ref requires one of nwords, nbits or nrefs")
    }
}

/// An operand of the `operation` function: either a literal value or the
/// first cell of a referenced memory space view.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OperandConfig {
    Value { value: i64 },
    Memspace { memspace: MemspaceRef },
}

/// The simulation function descriptor. The `type` key selects the variant;
/// an unknown type is a configuration error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FunctionConfig {
    /// Write a constant value to every target cell each tick.
    Static { value: i64 },

    /// Toggle every target cell between 0 and 1 each tick.
    Binary,

    /// Count over a range, wrapping on exhaustion. The range is
    /// `[start, stop, step]` with defaults derived from the target width;
    /// shorter spellings are completed as `[stop]` and `[start, stop]`.
    Counter {
        #[serde(default)]
        range: Option<Vec<i64>>,
    },

    /// Sine waveform scaled to the target cell width.
    #[serde(alias = "sin")]
    Sine,

    /// Cosine waveform scaled to the target cell width.
    #[serde(alias = "cos")]
    Cosine,

    /// Sawtooth waveform scaled to the target cell width.
    Sawtooth,

    /// Square waveform alternating between the high and low halves of the
    /// target cell range.
    Square,

    /// Uniform random integer in `[lo, hi)`.
    Randrange {
        range: Vec<i64>,
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Log-normal sample, scaled and truncated to the target cell width.
    Lognormal {
        #[serde(default)]
        mu: Option<f64>,
        #[serde(default)]
        sigma: Option<f64>,
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Uniform random integer across the target cell's full width.
    Uniform {
        #[serde(default)]
        seed: Option<u64>,
    },

    /// Copy the source view into the target view element-wise.
    Copy,

    /// Install a read-side transform on the target addresses.
    Transform { transform: TransformRule },

    /// Left-to-right reduction of the operand list with a binary operator.
    Operation { operator: Operator },
}

impl FunctionConfig {
    /// The configuration name of the function type, for identifiers and
    /// logging.
    pub fn type_name(&self) -> &'static str {
        match self {
            FunctionConfig::Static { .. } => "static",
            FunctionConfig::Binary => "binary",
            FunctionConfig::Counter { .. } => "counter",
            FunctionConfig::Sine => "sine",
            FunctionConfig::Cosine => "cosine",
            FunctionConfig::Sawtooth => "sawtooth",
            FunctionConfig::Square => "square",
            FunctionConfig::Randrange { .. } => "randrange",
            FunctionConfig::Lognormal { .. } => "lognormal",
            FunctionConfig::Uniform { .. } => "uniform",
            FunctionConfig::Copy => "copy",
            FunctionConfig::Transform { .. } => "transform",
            FunctionConfig::Operation { .. } => "operation",
        }
    }
}

/// A read-side transform rule: when the stored value matches `in`, `out` is
/// substituted in the returned view. A scalar `in` is the degenerate range
/// `[x, x]`; a null `out` is a passthrough rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformRule {
    #[serde(rename = "in")]
    pub input: TransformInput,
    #[serde(rename = "out")]
    pub output: Option<i64>,
}

/// The input match of a transform rule: an inclusive `[lo, hi]` range or a
/// single value.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TransformInput {
    Range(Vec<i64>),
    Scalar(i64),
}

/// The binary operators accepted by the `operation` function. A fixed
/// enumeration: an operator name outside this set is a configuration error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    #[serde(rename = "add")]
    Add,
    #[serde(rename = "sub")]
    Sub,
    #[serde(rename = "mul")]
    Mul,
    #[serde(rename = "floordiv")]
    FloorDiv,
    #[serde(rename = "mod")]
    Mod,
    #[serde(rename = "and_")]
    And,
    #[serde(rename = "or_")]
    Or,
    #[serde(rename = "xor")]
    Xor,
    #[serde(rename = "lshift")]
    Lshift,
    #[serde(rename = "rshift")]
    Rshift,
}
