#![warn(missing_docs)]
//! homewatch watches per-device condition flags (high temperature, water leak
//! and the like), notifies the device owner's contacts when a condition
//! becomes active, and keeps reminding at a fixed cadence until it clears.

pub mod config;
pub mod engine;
pub mod http_client;
pub mod http_server;
pub mod models;
pub mod notification;
pub mod persistence;
pub mod supervisor;
pub mod test_helpers;
