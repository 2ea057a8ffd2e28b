#![cfg_attr(not(test), no_std)]

//! Portable core of the wearable health firmware: PPG conditioning, beat
//! detection, SpO2 estimation, motion normalization and the snapshot relay
//! between the sensor and radio contexts.

// This must go FIRST so that all the other modules see its macros.
#[macro_use]
mod fmt;

pub mod config;
pub mod drivers;
pub mod error;
pub mod link;
pub mod state;
pub mod telemetry;
