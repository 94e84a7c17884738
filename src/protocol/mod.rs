//! Command layer between the state machines and the secure channel.
//!
//! This module defines the typed commands the driver issues, the replies
//! it expects, the bit-exact constants of the 53xd protocol, and the
//! [`Channel`] trait the transport implements.

mod channel;
mod command;
pub mod constants;
mod sim;

pub use channel::{Channel, Completion, Ticket, TransportError};
pub use command::{Opcode, Otp, Reply, Request};
pub use sim::{pack_frame, ridge_pattern, SimulatedSensor};
