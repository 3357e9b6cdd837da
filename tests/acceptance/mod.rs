//! End-to-end protocol scenarios for the UPS Pico daemon.
//!
//! Each scenario wires the full engine (pulse monitor, heartbeat
//! driver, shutdown coordinator, shared state) over the scripted GPIO
//! simulator. Time is injected: edge timestamps come from the script
//! and cadence decisions from a manual clock.

mod common;
mod liveness_test;
mod shutdown_test;
mod startup_test;
