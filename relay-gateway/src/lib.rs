//! RELAY Gateway - Browser/Bus Bridge
//!
//! The gateway multiplexes browser-facing WebSockets with the agent bus:
//!
//! - `GET /stream` upgrades to a WebSocket; inbound frames are stamped,
//!   published on `human-input`, and logged
//! - configured bus channels are fanned out to every open socket
//! - `GET /api/health` summarizes dependency state
//!
//! Store failures never touch the bus path; malformed client frames get
//! an error frame and the connection stays open.

pub mod config;
pub mod forward;
pub mod frames;
pub mod hub;
pub mod routes;
pub mod state;
pub mod ws;

pub use config::GatewayConfig;
pub use frames::{BusFrame, ClientMessage, SystemFrame};
pub use hub::WsHub;
pub use routes::create_router;
pub use state::AppState;

/// The identity this process claims on the bus and in log rows.
pub const GATEWAY_AGENT: &str = "gateway";

/// Sender identity stamped onto human messages entering the system.
pub const HUMAN_AGENT: &str = "human";

/// The orchestrator's agent name; human input is addressed to it.
pub const CHATTER_AGENT: &str = "chatter";
