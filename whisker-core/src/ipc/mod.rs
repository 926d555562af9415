//! Event types published by the engine.
//!
//! All types derive `serde::Serialize` + `serde::Deserialize` so hosts can
//! forward them as JSON (status LEDs, companion apps, log shippers).

pub mod events;
