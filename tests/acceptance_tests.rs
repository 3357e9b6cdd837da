//! Acceptance tests for the UPS Pico daemon.
//!
//! These tests verify the protocol end to end:
//! - Liveness classification over a steady pulse train
//! - The one-shot shutdown sequence when the board requests a halt
//! - Fatal startup when no pulse train ever appears
//!
//! All scenarios drive the full engine against the in-memory GPIO
//! simulator and a manual clock; no hardware, root privileges, or
//! real protocol delays are required.

mod acceptance;
