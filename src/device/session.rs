//! Per-device state shared by the state machines.

use crate::frame::{FrameStore, FRAME_SIZE};
use crate::protocol::{Otp, Ticket};

/// State that outlives a single machine but not an activation.
#[derive(Debug)]
pub struct Session {
    /// Calibration bytes read during activation.
    otp: Option<Otp>,
    frames: FrameStore,
    /// Background frame for subtraction. Allocated but never filled or
    /// applied.
    background: Box<[u16; FRAME_SIZE]>,
    next_ticket: u64,
}

impl Session {
    /// Creates an empty session.
    pub fn new() -> Self {
        Self {
            otp: None,
            frames: FrameStore::new(),
            background: Box::new([0u16; FRAME_SIZE]),
            next_ticket: 0,
        }
    }

    /// Allocates the ticket for the next command.
    ///
    /// Tickets keep increasing across [`Session::reset`], so a completion
    /// from a torn-down session can never match a new one.
    pub fn next_ticket(&mut self) -> Ticket {
        self.next_ticket += 1;
        Ticket(self.next_ticket)
    }

    /// Stores the OTP read during activation.
    pub fn set_otp(&mut self, otp: Otp) {
        self.otp = Some(otp);
    }

    /// The OTP, once activation has read it.
    pub fn otp(&self) -> Option<&Otp> {
        self.otp.as_ref()
    }

    /// Frames captured by the running scan.
    pub fn frames(&self) -> &FrameStore {
        &self.frames
    }

    /// Mutable access to the frame store.
    pub fn frames_mut(&mut self) -> &mut FrameStore {
        &mut self.frames
    }

    /// Background frame placeholder.
    pub fn background(&self) -> &[u16; FRAME_SIZE] {
        &self.background
    }

    /// Forgets the OTP and every stored frame.
    pub fn reset(&mut self) {
        self.otp = None;
        self.frames.clear();
        self.background.fill(0);
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::RawFrame;

    #[test]
    fn test_tickets_survive_reset() {
        let mut session = Session::new();
        assert_eq!(session.next_ticket(), Ticket(1));
        session.reset();
        assert_eq!(session.next_ticket(), Ticket(2));
    }

    #[test]
    fn test_reset_clears_otp_and_frames() {
        let mut session = Session::new();
        session.set_otp(Otp::from_reply(&[1u8; 64]).unwrap());
        session
            .frames_mut()
            .push(RawFrame::from_pixels(Box::new([0u16; FRAME_SIZE])));

        session.reset();
        assert!(session.otp().is_none());
        assert!(session.frames().is_empty());
        assert!(session.background().iter().all(|&p| p == 0));
    }
}
