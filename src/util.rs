//! Process-wide helpers for Ladderscope.

pub mod telemetry;
