//! Network Layer
//!
//! WebSocket gateway that exposes the session store to remote clients.
//! This layer is **non-deterministic**; all simulation runs through `game/`.

pub mod protocol;
pub mod server;

pub use protocol::{ClientMessage, ServerMessage, ServerError, ErrorCode};
pub use server::{dispatch, GatewayConfig, GatewayError, GatewayServer};
