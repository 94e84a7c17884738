//! Image capture.
//!
//! Arms finger detection, then loops over FDT mode and image readout until
//! enough frames are stored. The first frame of every scan is discarded;
//! the rest are normalized and handed to the assembler.

use super::{Context, Outcome};
use crate::assembly::{AssemblyContext, AssemblyFrame};
use crate::device::{DriverError, Session};
use crate::frame::decode_frame;
use crate::protocol::constants::{IMAGE_TRIGGER_REGISTER, IMAGE_TRIGGER_VALUE};
use crate::protocol::{Opcode, Otp, Reply, Request, Ticket, TransportError};

/// Frames dropped from the front of every scan before assembly.
const SKIPPED_FRAMES: usize = 1;

/// Scan steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanState {
    /// Arm finger-down detection.
    SwitchFdtDown,
    /// Enter finger detection mode.
    SwitchFdtMode,
    /// Trigger and read one image.
    GetImage,
}

/// Which command of the current state is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Awaiting {
    /// FDT down sent with the reply flag cleared.
    FdtDownPrime,
    /// FDT down resent with the reply flag set.
    FdtDownAck,
    FdtMode,
    RegisterWrite,
    Image,
    Finished,
}

/// One scan attempt. Never reused.
#[derive(Debug)]
pub struct ScanSsm {
    state: ScanState,
    awaiting: Awaiting,
    image_requests: usize,
}

impl ScanSsm {
    /// Creates a machine at its first state.
    pub fn new() -> Self {
        Self {
            state: ScanState::SwitchFdtDown,
            awaiting: Awaiting::FdtDownPrime,
            image_requests: 0,
        }
    }

    /// Current state.
    pub fn state(&self) -> ScanState {
        self.state
    }

    /// Image readouts issued so far.
    pub fn image_requests(&self) -> usize {
        self.image_requests
    }

    /// Issues the first command.
    ///
    /// Fails with [`DriverError::NotActivated`] if the session holds no OTP.
    pub fn start(&mut self, ctx: &mut Context<'_>) -> Result<Outcome, DriverError> {
        require_otp(ctx.session)?;

        let frames = ctx.session.frames_mut();
        if !frames.is_empty() {
            tracing::warn!(stale = frames.len(), "Frames left over from an earlier scan");
            frames.clear();
        }

        self.state = ScanState::SwitchFdtDown;
        tracing::debug!(state = ?self.state, "Scan started");
        self.run_state(ctx).map(Outcome::Pending)
    }

    /// Consumes the completion of the command in flight and issues the
    /// next one, or assembles the image once the quota is met.
    pub fn handle(
        &mut self,
        ctx: &mut Context<'_>,
        result: Result<Reply, TransportError>,
    ) -> Result<Outcome, DriverError> {
        let reply = result?;

        match self.awaiting {
            Awaiting::FdtDownPrime => {
                let request = Request::fdt_down(require_otp(ctx.session)?, true);
                self.awaiting = Awaiting::FdtDownAck;
                Ok(Outcome::Pending(ctx.send(request)))
            }
            Awaiting::FdtDownAck => self.advance(ctx, ScanState::SwitchFdtMode),
            Awaiting::FdtMode => self.advance(ctx, ScanState::GetImage),
            Awaiting::RegisterWrite => {
                let request =
                    Request::get_image(require_otp(ctx.session)?, ctx.config.image_timeout());
                self.awaiting = Awaiting::Image;
                self.image_requests += 1;
                Ok(Outcome::Pending(ctx.send(request)))
            }
            Awaiting::Image => {
                let data = match reply {
                    Reply::Data(data) => data,
                    other => {
                        return Err(DriverError::UnexpectedReply {
                            request: Opcode::McuGetImage,
                            got: other.kind(),
                        })
                    }
                };

                let frame = decode_frame(&data)?;
                let frames = ctx.session.frames_mut();
                frames.push(frame);

                let stored = frames.len();
                tracing::debug!(stored, quota = ctx.config.capture_frames, "Frame captured");

                if stored <= ctx.config.capture_frames {
                    self.advance(ctx, ScanState::SwitchFdtMode)
                } else {
                    self.awaiting = Awaiting::Finished;
                    finish(ctx);
                    Ok(Outcome::Complete)
                }
            }
            Awaiting::Finished => Err(DriverError::Protocol(
                "completion received after scan finished".into(),
            )),
        }
    }

    fn advance(&mut self, ctx: &mut Context<'_>, state: ScanState) -> Result<Outcome, DriverError> {
        self.state = state;
        tracing::debug!(state = ?self.state, "Scan state");
        self.run_state(ctx).map(Outcome::Pending)
    }

    /// Sends the first command of the current state.
    fn run_state(&mut self, ctx: &mut Context<'_>) -> Result<Ticket, DriverError> {
        let request = match self.state {
            ScanState::SwitchFdtDown => {
                self.awaiting = Awaiting::FdtDownPrime;
                Request::fdt_down(require_otp(ctx.session)?, false)
            }
            ScanState::SwitchFdtMode => {
                self.awaiting = Awaiting::FdtMode;
                Request::fdt_mode()
            }
            ScanState::GetImage => {
                ctx.host.report_finger_status(true);
                self.awaiting = Awaiting::RegisterWrite;
                Request::WriteSensorRegister {
                    address: IMAGE_TRIGGER_REGISTER,
                    value: IMAGE_TRIGGER_VALUE,
                }
            }
        };

        Ok(ctx.send(request))
    }
}

impl Default for ScanSsm {
    fn default() -> Self {
        Self::new()
    }
}

fn require_otp(session: &Session) -> Result<&Otp, DriverError> {
    session.otp().ok_or(DriverError::NotActivated)
}

/// Normalizes the stored frames, stitches them and reports the image.
fn finish(ctx: &mut Context<'_>) {
    let assembly = AssemblyContext::for_sensor(ctx.config.image_width);
    let mut frames: Vec<AssemblyFrame> = ctx
        .session
        .frames_mut()
        .drain_normalized(SKIPPED_FRAMES)
        .into_iter()
        .map(AssemblyFrame::new)
        .collect();

    ctx.assembler.estimate_movement(&assembly, &mut frames);
    let image = ctx.assembler.assemble(&assembly, &frames);

    tracing::info!(
        frames = frames.len(),
        width = image.width(),
        height = image.height(),
        "Image assembled"
    );

    ctx.host.image_captured(image);
    ctx.host.report_finger_status(false);
}
