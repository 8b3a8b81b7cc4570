// Copyright (c) 2025 Ronan LE MEILLAT, SCTG Development
// This file is part of the plc-simulator project and is licensed under the
// SCTG Development Non-Commercial License v1.0 (see LICENSE.md for details).

//! Tests for configuration loading and validation

use anyhow::Result;
use std::fs;
use tempfile::tempdir;

use plc_simulator::config::{Config, FunctionConfig, Operator};
use plc_simulator::memory::Section;

#[test]
fn test_full_config_load() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");

    let config_json = r#"
{
  "listener": {"host": "localhost", "port": 5555, "backlog": 10},
  "memory_manager": {"memspace": {"blen": 128, "w16len": 256, "w32len": 64, "w64len": 64}},
  "fieldbus_manager": {"modules": [
    {"module": "plcsimulator.ModbusModule", "class": "modbus", "id": "modbus0", "port": 5020}
  ]},
  "io_manager": {"simulations": [
    {"memspace": {"section": "words16", "addr": 0, "nwords": 1},
     "function": {"type": "counter", "range": [1, 11]},
     "pause": 1.0},
    {"id": "wave0",
     "memspace": {"section": "words16", "addr": 1, "nwords": 1},
     "function": {"type": "sin"},
     "pause": 0.1},
    {"memspace": {"section": "bits", "addr": 0, "nbits": 1},
     "function": {"type": "binary"},
     "pause": 0.5},
    {"memspace": {"section": "words16", "addr": 4, "nwords": 1},
     "operands": [
        {"memspace": {"section": "words16", "addr": 0, "nwords": 1}},
        {"value": 100}
     ],
     "function": {"type": "operation", "operator": "add"},
     "pause": 1.0}
  ]},
  "logging": {"level": "debug"}
}
"#;
    fs::write(&config_path, config_json)?;

    let config = Config::from_file(&config_path)?;

    assert_eq!(config.listener.host, "localhost");
    assert_eq!(config.listener.port, 5555);
    assert_eq!(config.listener.backlog, 10);

    assert_eq!(config.memory_manager.memspace.blen, 128);
    assert_eq!(config.memory_manager.memspace.w16len, 256);

    assert_eq!(config.fieldbus_manager.modules.len(), 1);
    assert_eq!(config.fieldbus_manager.modules[0].class, "modbus");
    assert_eq!(config.fieldbus_manager.modules[0].port, Some(5020));

    let simulations = &config.io_manager.simulations;
    assert_eq!(simulations.len(), 4);
    assert_eq!(simulations[0].memspace.section, Section::Words16);
    assert!(matches!(
        simulations[0].function,
        FunctionConfig::Counter { .. }
    ));
    // "sin" is an alias for "sine"
    assert!(matches!(simulations[1].function, FunctionConfig::Sine));
    assert!(matches!(
        simulations[3].function,
        FunctionConfig::Operation {
            operator: Operator::Add
        }
    ));
    assert_eq!(simulations[3].operands.as_ref().unwrap().len(), 2);

    assert_eq!(config.logging.level.as_deref(), Some("debug"));

    Ok(())
}

#[test]
fn test_missing_file_is_an_error() {
    let temp_dir = tempdir().unwrap();
    let result = Config::from_file(temp_dir.path().join("no_such.json"));
    assert!(result.is_err());
}

#[test]
fn test_malformed_json_is_an_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, "{\"listener\": {")?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_unknown_function_type_is_an_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"io_manager": {"simulations": [
            {"memspace": {"section": "words16", "addr": 0, "nwords": 1},
             "function": {"type": "tangent"},
             "pause": 1.0}
        ]}}"#,
    )?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_unknown_operator_is_an_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"io_manager": {"simulations": [
            {"memspace": {"section": "words16", "addr": 0, "nwords": 1},
             "operands": [{"value": 1}, {"value": 2}],
             "function": {"type": "operation", "operator": "pow"},
             "pause": 1.0}
        ]}}"#,
    )?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_unknown_section_name_is_an_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"io_manager": {"simulations": [
            {"memspace": {"section": "words128", "addr": 0, "nwords": 1},
             "function": {"type": "binary"},
             "pause": 1.0}
        ]}}"#,
    )?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_duplicate_module_ports_are_an_error() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"fieldbus_manager": {"modules": [
            {"class": "modbus", "id": "modbus0", "port": 5020},
            {"class": "modbus", "id": "modbus1", "port": 5020}
        ]}}"#,
    )?;

    assert!(Config::from_file(&config_path).is_err());
    Ok(())
}

#[test]
fn test_unknown_top_level_keys_are_ignored() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(
        &config_path,
        r#"{"listener": {"port": 5556}, "future_section": {"anything": true}}"#,
    )?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.listener.port, 5556);
    // Unspecified listener fields fall back to defaults
    assert_eq!(config.listener.host, "localhost");
    Ok(())
}

#[test]
fn test_minimal_config_uses_defaults() -> Result<()> {
    let temp_dir = tempdir()?;
    let config_path = temp_dir.path().join("config.json");
    fs::write(&config_path, "{}")?;

    let config = Config::from_file(&config_path)?;
    assert_eq!(config.listener.host, "localhost");
    assert_eq!(config.listener.port, 5555);
    assert_eq!(config.listener.backlog, 10);
    assert_eq!(config.memory_manager.memspace.blen, 0);
    assert!(config.fieldbus_manager.modules.is_empty());
    assert!(config.io_manager.simulations.is_empty());
    assert!(config.logging.level.is_none());
    Ok(())
}
