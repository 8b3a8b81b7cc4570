// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! PLC simulator library
//!
//! This library provides a simulated programmable logic controller: a typed,
//! concurrency-safe memory space, a set of periodic IO simulations driving
//! it, and a fieldbus layer exposing it to clients over Modbus/TCP.

pub mod config;
pub mod fieldbus;
pub mod io;
pub mod memory;
