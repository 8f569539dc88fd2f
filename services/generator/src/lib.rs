//! Course Generator Service
//!
//! Wires the generation core to its runtime collaborators: environment
//! configuration, the Kafka message source, and the consumer loop that
//! drives one course outline at a time from fetch to commit. The binary in
//! `bin/generator.rs` is a thin wrapper around this library.

pub mod broker;
pub mod config;
pub mod consumer;
