//! WebSocket Gateway
//!
//! Real-time event channel over WebSocket connections, fanned out across
//! processes through the backplane.

pub mod gateway;
pub mod handler;
pub mod messages;

pub use gateway::EventServer;
pub use handler::ws_handler;
pub use messages::{ClientFrame, EventFrame};
