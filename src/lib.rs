//! Warehouse RTLS library: portable anchor and tag node logic.
//!
//! Anchors scan for tag beacons, convert RSSI to distance with a log-distance
//! path-loss model, and publish one CSV record per sighting to MQTT. Tags
//! advertise a named beacon and forward RFID card reads, suppressing
//! immediate repeats. A positioning server (not part of this crate)
//! consumes both streams.
//!
//! This crate contains every piece of that logic with no platform
//! dependencies, testable on any host with `cargo test`. Radios, the card
//! reader and the MQTT client are reached through traits
//! ([`scanner::BeaconScanner`], [`tag::BeaconAdvertiser`], [`tag::CardReader`],
//! [`bus::BusTransport`]); the ESP-IDF firmware in `firmware-std/` supplies
//! the implementations.
//!
//! Modules:
//! - `pathloss`, `scanner`, `anchor`: anchor pipeline
//! - `tag`: beacon start-up, UID formatting and dedup
//! - `bus`: broker connection manager with fixed-interval reconnect
//! - `node`: the shared single-threaded loop contract
//! - `protocol`, `config`, `defaults`, `board`: wire formats and settings
//!
//! `no_std`, no allocator.

#![cfg_attr(not(test), no_std)]

pub mod anchor;
pub mod board;
pub mod bus;
pub mod config;
pub mod defaults;
pub mod node;
pub mod pathloss;
pub mod protocol;
pub mod scanner;
pub mod tag;
