// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Simulation functions
//!
//! Each IO simulation owns a [`FunctionState`]: the tagged variant carrying
//! the per-task mutable state (counter value, waveform phase, random number
//! generator). A tick computes the next value set for the target view, or
//! performs the function's side effect (the `transform` function installs a
//! read-side transform and writes nothing).
//!
//! Counter and operation arithmetic is carried out in i128 so decrementing
//! and full-width 64-bit ranges never overflow; written values are truncated
//! to the target section width.

use anyhow::{bail, Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::{
    FunctionConfig, OperandConfig, Operator, SimulationConfig, TransformInput, TransformRule,
};
use crate::memory::{MemorySpace, Section, Transform};

use super::ResolvedRef;

/// Number of phase steps per half-turn of the periodic waveforms.
const WAVE_RESOLUTION: u64 = 1000;

/// Scale factor applied to the continuous random distributions before
/// truncation to the target width.
const RANDOM_RESOLUTION: f64 = 1e3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaveKind {
    Sine,
    Cosine,
    Sawtooth,
    Square,
}

/// An operand of the `operation` function, resolved against the memory
/// space at startup.
#[derive(Debug, Clone, Copy)]
pub enum Operand {
    Value(i128),
    Memspace(ResolvedRef),
}

/// The per-task simulation state. Constructed once at startup from the
/// simulation configuration; mutated by [`FunctionState::tick`].
pub enum FunctionState {
    Static {
        value: u64,
    },
    Binary {
        current: u64,
    },
    Counter {
        start: i128,
        stop: i128,
        step: i128,
        current: i128,
    },
    Wave {
        kind: WaveKind,
        phase: u64,
    },
    RandRange {
        lo: i128,
        hi: i128,
        rng: StdRng,
    },
    LogNormal {
        mu: f64,
        sigma: f64,
        rng: StdRng,
    },
    Uniform {
        rng: StdRng,
    },
    Copy {
        source: ResolvedRef,
    },
    Transform {
        transform: Transform,
    },
    Operation {
        operator: Operator,
        operands: Vec<Operand>,
    },
}

impl FunctionState {
    /// Build the runtime state for a simulation, validating the function
    /// parameters against the target view and the memory space.
    pub fn from_config(
        conf: &SimulationConfig,
        target: ResolvedRef,
        memory: &MemorySpace,
    ) -> Result<Self> {
        match &conf.function {
            FunctionConfig::Static { value } => Ok(FunctionState::Static {
                value: *value as u64,
            }),
            FunctionConfig::Binary => Ok(FunctionState::Binary { current: 0 }),
            FunctionConfig::Counter { range } => {
                let (start, stop, step) = define_range(range.as_deref(), target.section)?;
                Ok(FunctionState::Counter {
                    start,
                    stop,
                    step,
                    current: start,
                })
            }
            FunctionConfig::Sine => Ok(FunctionState::Wave {
                kind: WaveKind::Sine,
                phase: 0,
            }),
            FunctionConfig::Cosine => Ok(FunctionState::Wave {
                kind: WaveKind::Cosine,
                phase: 0,
            }),
            FunctionConfig::Sawtooth => Ok(FunctionState::Wave {
                kind: WaveKind::Sawtooth,
                phase: 0,
            }),
            FunctionConfig::Square => Ok(FunctionState::Wave {
                kind: WaveKind::Square,
                phase: 0,
            }),
            FunctionConfig::Randrange { range, seed } => {
                let (lo, hi, step) = define_range(Some(range), target.section)?;
                if step != 1 {
                    bail!("randrange does not support a range step");
                }
                if lo >= hi {
                    bail!("randrange requires lo < hi, got [{}, {})", lo, hi);
                }
                Ok(FunctionState::RandRange {
                    lo,
                    hi,
                    rng: make_rng(*seed),
                })
            }
            FunctionConfig::Lognormal { mu, sigma, seed } => Ok(FunctionState::LogNormal {
                mu: mu.unwrap_or(0.0),
                sigma: sigma.unwrap_or(1.0),
                rng: make_rng(*seed),
            }),
            FunctionConfig::Uniform { seed } => Ok(FunctionState::Uniform {
                rng: make_rng(*seed),
            }),
            FunctionConfig::Copy => {
                let source = conf
                    .source
                    .as_ref()
                    .context("copy function requires a source memspace")?;
                let source = ResolvedRef::resolve(&source.memspace, memory)?;
                if source.nrefs != target.nrefs {
                    bail!(
                        "copy source holds {} elements but target holds {}",
                        source.nrefs,
                        target.nrefs
                    );
                }
                Ok(FunctionState::Copy { source })
            }
            FunctionConfig::Transform { transform } => Ok(FunctionState::Transform {
                transform: build_transform(transform, target.section)?,
            }),
            FunctionConfig::Operation { operator } => {
                let operands = conf
                    .operands
                    .as_ref()
                    .context("operation function requires an operand list")?;
                if operands.is_empty() {
                    bail!("operation function requires at least one operand");
                }
                let operands = operands
                    .iter()
                    .map(|operand| match operand {
                        OperandConfig::Value { value } => Ok(Operand::Value(*value as i128)),
                        OperandConfig::Memspace { memspace } => {
                            let resolved = ResolvedRef::resolve(memspace, memory)?;
                            if resolved.nrefs < 1 {
                                bail!("operand memspace ref must hold at least one element");
                            }
                            Ok(Operand::Memspace(resolved))
                        }
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(FunctionState::Operation {
                    operator: *operator,
                    operands,
                })
            }
        }
    }

    /// Advance the simulation one tick. Returns the values to write into
    /// the target view, or `None` when the function has no per-tick output.
    pub fn tick(
        &mut self,
        memory: &MemorySpace,
        target: ResolvedRef,
    ) -> Result<Option<Vec<u64>>> {
        let n = target.nrefs;
        match self {
            FunctionState::Static { value } => Ok(Some(vec![*value; n])),
            FunctionState::Binary { current } => {
                let value = *current;
                *current = (value + 1) % 2;
                Ok(Some(vec![value; n]))
            }
            FunctionState::Counter {
                start,
                stop,
                step,
                current,
            } => {
                let value = *current;
                let next = value + *step;
                *current = if *step < 0 {
                    if next <= *stop {
                        *start
                    } else {
                        next
                    }
                } else if next >= *stop {
                    *start
                } else {
                    next
                };
                Ok(Some(vec![target.section.truncate(value); n]))
            }
            FunctionState::Wave { kind, phase } => {
                let value = *phase;
                *phase = (value + 1) % (2 * WAVE_RESOLUTION + 1);

                let resolution = WAVE_RESOLUTION as f64;
                let angle = (value as f64 / resolution) * std::f64::consts::PI;
                let unit = match kind {
                    WaveKind::Sine => (angle.sin() + 1.0) / 2.0,
                    WaveKind::Cosine => (angle.cos() + 1.0) / 2.0,
                    WaveKind::Sawtooth => value as f64 / (2.0 * resolution),
                    WaveKind::Square => {
                        if angle.sin() < 0.0 {
                            0.5
                        } else {
                            1.0
                        }
                    }
                };
                Ok(Some(vec![scale_to_width(unit, target.section); n]))
            }
            FunctionState::RandRange { lo, hi, rng } => {
                let value = rng.random_range(*lo..*hi);
                Ok(Some(vec![target.section.truncate(value); n]))
            }
            FunctionState::LogNormal { mu, sigma, rng } => {
                let deviate = *mu + *sigma * gaussian(rng);
                let value = (deviate.exp() * RANDOM_RESOLUTION) as i128;
                Ok(Some(vec![target.section.truncate(value); n]))
            }
            FunctionState::Uniform { rng } => {
                let value = match target.section {
                    Section::Words64 => rng.random::<u64>(),
                    section => rng.random_range(0..=section.max_value()),
                };
                Ok(Some(vec![value; n]))
            }
            FunctionState::Copy { source } => Ok(Some(source.read(memory)?)),
            FunctionState::Transform { transform } => {
                // Re-installed each tick; installation is idempotent
                for offset in 0..n {
                    memory.install_transform(target.section, target.addr + offset, *transform)?;
                }
                Ok(None)
            }
            FunctionState::Operation { operator, operands } => {
                // The operand list was validated non-empty at construction
                let mut accumulator = resolve_operand(&operands[0], memory)?;
                for operand in &operands[1..] {
                    accumulator = operator.apply(accumulator, resolve_operand(operand, memory)?)?;
                }
                Ok(Some(vec![target.section.truncate(accumulator); n]))
            }
        }
    }
}

impl Operator {
    /// Apply the operator to two wide operands. Division by zero and
    /// out-of-range shift counts are runtime simulation errors.
    pub fn apply(self, lhs: i128, rhs: i128) -> Result<i128> {
        Ok(match self {
            Operator::Add => lhs.wrapping_add(rhs),
            Operator::Sub => lhs.wrapping_sub(rhs),
            Operator::Mul => lhs.wrapping_mul(rhs),
            Operator::FloorDiv => {
                if rhs == 0 {
                    bail!("floordiv by zero");
                }
                floor_div(lhs, rhs)
            }
            Operator::Mod => {
                if rhs == 0 {
                    bail!("mod by zero");
                }
                lhs - floor_div(lhs, rhs) * rhs
            }
            Operator::And => lhs & rhs,
            Operator::Or => lhs | rhs,
            Operator::Xor => lhs ^ rhs,
            Operator::Lshift => {
                if !(0..128).contains(&rhs) {
                    bail!("lshift count out of range: {}", rhs);
                }
                lhs.wrapping_shl(rhs as u32)
            }
            Operator::Rshift => {
                if !(0..128).contains(&rhs) {
                    bail!("rshift count out of range: {}", rhs);
                }
                lhs >> rhs as u32
            }
        })
    }
}

/// Convert a configured transform rule into the memory space representation,
/// truncating the output value to the target section width.
fn build_transform(rule: &TransformRule, section: Section) -> Result<Transform> {
    let (input_low, input_high) = match &rule.input {
        TransformInput::Scalar(value) => (*value as i128, *value as i128),
        TransformInput::Range(range) => match range.as_slice() {
            [lo, hi] => {
                if lo > hi {
                    bail!("transform input range is inverted: [{}, {}]", lo, hi);
                }
                (*lo as i128, *hi as i128)
            }
            other => bail!(
                "transform input range must have 2 elements, got {}",
                other.len()
            ),
        },
    };

    Ok(Transform {
        input_low,
        input_high,
        output: rule.output.map(|value| section.truncate(value as i128)),
    })
}

/// Floor division, matching the rounding of the configuration vocabulary's
/// `floordiv` (quotient rounded toward negative infinity).
fn floor_div(lhs: i128, rhs: i128) -> i128 {
    let quotient = lhs / rhs;
    if lhs % rhs != 0 && (lhs < 0) != (rhs < 0) {
        quotient - 1
    } else {
        quotient
    }
}

/// Construct the fully-specified `[start, stop, step]` range parameters.
///
/// Defaults: start 0, stop 2^width of the section, step 1. A single element
/// is the stop; two elements select a decrementing step when stop < start.
fn define_range(range: Option<&[i64]>, section: Section) -> Result<(i128, i128, i128)> {
    let full: i128 = 1i128 << section.width_bits();
    let (start, stop, step) = match range.unwrap_or(&[]) {
        [] => (0, full, 1),
        [stop] => (0, *stop as i128, 1),
        [start, stop] => {
            let step = if stop < start { -1 } else { 1 };
            (*start as i128, *stop as i128, step)
        }
        [start, stop, step] => (*start as i128, *stop as i128, *step as i128),
        longer => bail!("range takes at most 3 elements, got {}", longer.len()),
    };
    if step == 0 {
        bail!("range step must not be zero");
    }
    Ok((start, stop, step))
}

fn make_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    }
}

/// Standard normal deviate via the Box-Muller transform over two uniform
/// deviates.
fn gaussian(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random::<f64>().max(f64::MIN_POSITIVE);
    let u2: f64 = rng.random();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

/// Map a sample in [0, 1] onto the unsigned range of the section.
fn scale_to_width(unit: f64, section: Section) -> u64 {
    let max = section.max_value();
    let scaled = (unit * max as f64).round();
    if scaled <= 0.0 {
        0
    } else if scaled >= max as f64 {
        max
    } else {
        scaled as u64
    }
}

fn resolve_operand(operand: &Operand, memory: &MemorySpace) -> Result<i128> {
    match operand {
        Operand::Value(value) => Ok(*value),
        Operand::Memspace(r) => {
            let value = match r.section {
                Section::Bits => memory.get_bits(r.addr, 1)?[0] as u64,
                section => memory.get_words(section, r.addr, 1)?[0],
            };
            Ok(value as i128)
        }
    }
}
