//! Ratify core library.
//!
//! This crate exposes programmatic APIs for validating a Puppet module or
//! control repo: resolving targets, running external and in-process
//! validators (alone or in groups), and collecting structured events.
//!
//! High-level modules:
//! - `cli`: CLI argument parsing (binary uses this).
//! - `config`: Discovery and effective configuration resolution.
//! - `context`: Repository context detection and per-run shared state.
//! - `target`: Target resolution against validator patterns.
//! - `runner`: External command boundary and command lookup.
//! - `validate`: Validator lifecycle, batching and group policies.
//! - `validators`: Built-in validator registry.
//! - `models`: Event data model.
//! - `report`: Thread-safe event collection.
//! - `output`: Text/JUnit/JSON sinks.
//! - `progress`: Nested progress indicators.
//! - `error`: Error taxonomy.
//! - `utils`: Supporting helpers.
pub mod cli;
pub mod config;
pub mod context;
pub mod error;
pub mod models;
pub mod output;
pub mod progress;
pub mod report;
pub mod runner;
pub mod target;
pub mod utils;
pub mod validate;
pub mod validators;
