//! # Mocknest WebSocket
//!
//! WebSocket handling for Mocknest mock records. A matched record with
//! `protocol: websocket` upgrades the connection and hands the socket to
//! [`handle_socket`], which drives one of four modes:
//!
//! - **echo**: text frames are echoed back verbatim
//! - **sequence**: configured messages are sent on a schedule
//! - **broadcast**: the connection joins a named fan-out channel shared
//!   with peers and the control plane
//! - **javascript**: a script drives the connection through
//!   `ws.send` / `ws.on` / `ws.close` / `sleep`
//!
//! The [`hub::BroadcastHub`] and [`hub::ConnectionGauge`] are shared
//! process-wide; everything else is per-connection.

mod handler;
pub mod hub;

pub use handler::handle_socket;
pub use hub::{BroadcastHub, ConnectionGauge, ConnectionPermit};
