//! STOMP 1.2 framing.
//!
//! Only the subset a realtime client needs: CONNECT/SUBSCRIBE/SEND/DISCONNECT
//! outbound, CONNECTED/MESSAGE/RECEIPT/ERROR inbound. Frames travel as
//! WebSocket text messages; a message may carry several frames or only
//! heart-beat EOLs.

mod frame;

pub use frame::{Command, Frame, Headers, decode_all};

/// Heart-beat payload sent on an otherwise idle connection.
pub const HEARTBEAT: &str = "\n";
