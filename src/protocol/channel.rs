//! Secure channel abstraction.
//!
//! The channel owns USB transfers, framing and the TLS session. The driver
//! hands it one [`Request`] at a time and gets exactly one [`Completion`]
//! back through the host's event loop.

use super::{Reply, Request};
use thiserror::Error;

/// Errors reported by the channel. Passed through the driver untouched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// A bulk transfer failed.
    #[error("USB transfer failed: {0}")]
    Transfer(String),
    /// No reply arrived before the deadline.
    #[error("timed out waiting for reply")]
    Timeout,
    /// The TLS layer failed.
    #[error("secure channel failure: {0}")]
    Tls(String),
    /// The device went away.
    #[error("device disconnected")]
    Disconnected,
}

/// Identifies one submitted command so its completion can be matched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Ticket(pub u64);

impl std::fmt::Display for Ticket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// The single result delivered for a submitted ticket.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    /// Ticket of the command this completes.
    pub ticket: Ticket,
    /// Decoded reply or transport failure.
    pub result: Result<Reply, TransportError>,
}

impl Completion {
    /// Successful completion.
    pub fn ok(ticket: Ticket, reply: Reply) -> Self {
        Self {
            ticket,
            result: Ok(reply),
        }
    }

    /// Failed completion.
    pub fn err(ticket: Ticket, error: TransportError) -> Self {
        Self {
            ticket,
            result: Err(error),
        }
    }
}

/// Trait for secure channel implementations.
///
/// Completions are not returned from these calls. The implementation
/// queues them and the host's event loop feeds them back to the driver.
pub trait Channel {
    /// Claims the USB interface.
    fn claim(&mut self) -> Result<(), TransportError>;

    /// Releases the USB interface.
    fn release(&mut self) -> Result<(), TransportError>;

    /// Starts continuous inbound polling. Never completes.
    fn start_read_loop(&mut self);

    /// Sends a command. Exactly one completion for `ticket` follows.
    fn submit(&mut self, ticket: Ticket, request: Request);

    /// Begins the TLS handshake. Exactly one completion for `ticket`
    /// follows, carrying [`Reply::Ack`] on success.
    fn establish_tls(&mut self, ticket: Ticket);

    /// Tears down the TLS session.
    fn shutdown_tls(&mut self) -> Result<(), TransportError>;

    /// Drops any queued transfers and partial reads.
    fn reset_state(&mut self);
}
