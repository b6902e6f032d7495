//! Arena server library
//!
//! The authoritative simulation for a 2D team-deathmatch arena: the entity
//! store and tick engine under one coarse lock, the line-delimited JSON
//! protocol, and the TCP connection manager. The binary in `main.rs` wires
//! these together; integration tests drive them directly.

pub mod config;
pub mod game;
pub mod map;
pub mod net;
pub mod util;
