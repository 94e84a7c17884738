//! Sequential state machines driving the sensor.
//!
//! A machine issues exactly one command per state and advances only when
//! that command's completion is handed back to it:
//!
//! ```text
//! start ──► run_state ──► channel.submit(ticket, request)
//!               ▲                        │
//!               │                        ▼
//!          next state  ◄── handle(completion for ticket)
//! ```
//!
//! Any error ends the machine; there are no internal retries.

mod activate;
mod scan;

pub use activate::{ActivateSsm, ActivateState};
pub use scan::{ScanSsm, ScanState};

use crate::assembly::Assembler;
use crate::device::{DriverConfig, ImageDeviceHost, Session};
use crate::protocol::{Channel, Request, Ticket};

/// Everything a machine may touch while handling one transition.
pub struct Context<'a> {
    /// Per-activation state.
    pub session: &'a mut Session,
    /// Transport commands go through.
    pub channel: &'a mut dyn Channel,
    /// Framework notifications.
    pub host: &'a mut dyn ImageDeviceHost,
    /// Image stitcher.
    pub assembler: &'a dyn Assembler,
    /// Driver configuration.
    pub config: &'a DriverConfig,
}

impl Context<'_> {
    /// Submits a request under a fresh ticket.
    pub fn send(&mut self, request: Request) -> Ticket {
        let ticket = self.session.next_ticket();
        tracing::debug!(
            %ticket,
            opcode = ?request.opcode(),
            reply = request.expects_reply(),
            "Sending command"
        );
        self.channel.submit(ticket, request);
        ticket
    }
}

/// Result of a successful transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// A command was issued; wait for its completion.
    Pending(Ticket),
    /// The machine reached its terminal state.
    Complete,
}
