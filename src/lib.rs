//! scanchain library: protocol core for a daisy-chained WiFi scanning array.
//!
//! One controller and up to 52 subordinate ESP32 boards are wired in a line
//! over full-duplex UART. Each subordinate scans a dedicated 5 GHz channel;
//! the controller discovers the chain, assigns channels and collects new
//! access points round-robin.
//!
//! This crate contains all framing, routing, discovery and scanning logic with
//! no platform dependencies, testable on any host with `cargo test`. The
//! ESP-IDF firmware in `firmware-std/` is a thin consumer that provides UART
//! ports, the WiFi radio and the console sink.
//!
//! Layout, bottom-up:
//! - `protocol`, `frame`: payload layouts and the byte-level frame codec
//! - `comm`, `link`: serial/clock seams and per-link frame assembly
//! - `router`, `discovery`: hop-by-hop forwarding and address assignment
//! - `seen`, `context`, `scanner`: per-node scan state and radio seams
//! - `subordinate`, `controller`: the two node roles
//! - `report`: NDJSON output for the host

#![cfg_attr(not(test), no_std)]

pub mod board;
pub mod comm;
pub mod config;
pub mod context;
pub mod controller;
pub mod defaults;
pub mod discovery;
pub mod frame;
pub mod link;
pub mod protocol;
pub mod report;
pub mod router;
pub mod scanner;
pub mod seen;
pub mod subordinate;

#[cfg(test)]
mod testing;
