//! Device bring-up.
//!
//! Authenticates the sensor (firmware string, preshared key, reset
//! counter), reads its one-time calibration data and uploads the MCU
//! configuration. The TLS handshake that follows is run by the device,
//! not by this machine.

use super::{Context, Outcome};
use crate::device::{hex, DriverError};
use crate::protocol::constants::{
    CONFIG, FIRMWARE_VERSION, PSK, PSK_FLAGS, PSK_LENGTH, RESET_NUMBER,
};
use crate::protocol::{Opcode, Otp, Reply, Request, TransportError};

/// Activation steps, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivateState {
    /// Starts the read loop and sends a NOP to flush the previous
    /// session's command buffer.
    ReadAndClear,
    /// Powers the sensor chip.
    EnableChip,
    /// Second NOP. The vendor sequence sends it; its purpose is unknown.
    Nop,
    /// Checks the firmware version.
    CheckFirmware,
    /// Checks the preshared key.
    CheckPresharedKey,
    /// Resets the sensor and checks its reset number.
    Reset,
    /// Reads the OTP into the session.
    ReadOneTimePassword,
    /// Puts the MCU into idle.
    SetIdle,
    /// Uploads the MCU configuration.
    UploadConfig,
    /// All steps succeeded.
    Done,
}

impl ActivateState {
    fn next(self) -> Self {
        match self {
            Self::ReadAndClear => Self::EnableChip,
            Self::EnableChip => Self::Nop,
            Self::Nop => Self::CheckFirmware,
            Self::CheckFirmware => Self::CheckPresharedKey,
            Self::CheckPresharedKey => Self::Reset,
            Self::Reset => Self::ReadOneTimePassword,
            Self::ReadOneTimePassword => Self::SetIdle,
            Self::SetIdle => Self::UploadConfig,
            Self::UploadConfig | Self::Done => Self::Done,
        }
    }

    fn opcode(self) -> Option<Opcode> {
        Some(match self {
            Self::ReadAndClear | Self::Nop => Opcode::Nop,
            Self::EnableChip => Opcode::EnableChip,
            Self::CheckFirmware => Opcode::FirmwareVersion,
            Self::CheckPresharedKey => Opcode::PresetPskRead,
            Self::Reset => Opcode::Reset,
            Self::ReadOneTimePassword => Opcode::ReadOtp,
            Self::SetIdle => Opcode::McuSwitchToIdleMode,
            Self::UploadConfig => Opcode::UploadConfigMcu,
            Self::Done => return None,
        })
    }
}

/// One activation attempt. Never reused.
#[derive(Debug)]
pub struct ActivateSsm {
    state: ActivateState,
}

impl ActivateSsm {
    /// Creates a machine at its first state.
    pub fn new() -> Self {
        Self {
            state: ActivateState::ReadAndClear,
        }
    }

    /// Current state.
    pub fn state(&self) -> ActivateState {
        self.state
    }

    /// Issues the first command.
    pub fn start(&mut self, ctx: &mut Context<'_>) -> Outcome {
        self.state = ActivateState::ReadAndClear;
        tracing::debug!(state = ?self.state, "Activation started");
        self.run_state(ctx)
    }

    /// Validates the completion of the current state's command and issues
    /// the next one.
    pub fn handle(
        &mut self,
        ctx: &mut Context<'_>,
        result: Result<Reply, TransportError>,
    ) -> Result<Outcome, DriverError> {
        let reply = result?;

        match self.state {
            ActivateState::ReadAndClear
            | ActivateState::EnableChip
            | ActivateState::Nop
            | ActivateState::SetIdle => {}
            ActivateState::CheckFirmware => check_firmware(reply)?,
            ActivateState::CheckPresharedKey => check_psk(reply)?,
            ActivateState::Reset => check_reset(reply)?,
            ActivateState::ReadOneTimePassword => ctx.session.set_otp(read_otp(reply)?),
            ActivateState::UploadConfig => check_config_upload(reply)?,
            ActivateState::Done => {
                return Err(DriverError::Protocol(
                    "completion received after activation finished".into(),
                ))
            }
        }

        self.state = self.state.next();
        tracing::debug!(state = ?self.state, "Activation state");
        Ok(self.run_state(ctx))
    }

    /// Sends the command belonging to the current state.
    fn run_state(&mut self, ctx: &mut Context<'_>) -> Outcome {
        let request = match self.state {
            ActivateState::ReadAndClear => {
                ctx.channel.start_read_loop();
                Request::Nop
            }
            ActivateState::EnableChip => Request::EnableChip { enable: true },
            ActivateState::Nop => Request::Nop,
            ActivateState::CheckFirmware => Request::FirmwareVersion,
            ActivateState::CheckPresharedKey => Request::PresetPskRead {
                flags: PSK_FLAGS,
                length: PSK_LENGTH,
            },
            ActivateState::Reset => Request::Reset {
                reset_sensor: true,
                sleep_ms: ctx.config.settle_ms,
            },
            ActivateState::ReadOneTimePassword => Request::ReadOtp,
            ActivateState::SetIdle => Request::McuSwitchToIdleMode {
                sleep_ms: ctx.config.settle_ms,
            },
            ActivateState::UploadConfig => Request::UploadConfigMcu {
                config: CONFIG.to_vec(),
            },
            ActivateState::Done => return Outcome::Complete,
        };

        Outcome::Pending(ctx.send(request))
    }
}

impl Default for ActivateSsm {
    fn default() -> Self {
        Self::new()
    }
}

fn unexpected(state: ActivateState, reply: &Reply) -> DriverError {
    DriverError::UnexpectedReply {
        request: state.opcode().unwrap_or(Opcode::Nop),
        got: reply.kind(),
    }
}

fn check_firmware(reply: Reply) -> Result<(), DriverError> {
    let firmware = match reply {
        Reply::Firmware(firmware) => firmware,
        other => return Err(unexpected(ActivateState::CheckFirmware, &other)),
    };

    tracing::debug!(%firmware, "Device firmware");

    if firmware != FIRMWARE_VERSION {
        return Err(DriverError::DataInvalid(format!(
            "invalid device firmware: \"{}\"",
            firmware
        )));
    }
    Ok(())
}

fn check_psk(reply: Reply) -> Result<(), DriverError> {
    let (success, flags, psk) = match reply {
        Reply::PresetPsk {
            success,
            flags,
            psk,
        } => (success, flags, psk),
        other => return Err(unexpected(ActivateState::CheckPresharedKey, &other)),
    };

    if !success {
        return Err(DriverError::Protocol("failed to read PSK from device".into()));
    }

    tracing::debug!(psk = %hex(&psk), flags = %format!("{:#010x}", flags), "Device PSK");

    if flags != PSK_FLAGS {
        return Err(DriverError::DataInvalid(format!(
            "invalid device PSK flags: {:#010x}",
            flags
        )));
    }
    if psk.len() != PSK.len() || psk != PSK {
        return Err(DriverError::DataInvalid(format!(
            "invalid device PSK: 0x{}",
            hex(&psk)
        )));
    }
    Ok(())
}

fn check_reset(reply: Reply) -> Result<(), DriverError> {
    let (success, number) = match reply {
        Reply::Reset { success, number } => (success, number),
        other => return Err(unexpected(ActivateState::Reset, &other)),
    };

    if !success {
        return Err(DriverError::Protocol("failed to reset device".into()));
    }

    tracing::debug!(number, "Device reset number");

    if number != RESET_NUMBER {
        return Err(DriverError::DataInvalid(format!(
            "invalid device reset number: {}",
            number
        )));
    }
    Ok(())
}

fn read_otp(reply: Reply) -> Result<Otp, DriverError> {
    let data = match reply {
        Reply::Data(data) => data,
        other => return Err(unexpected(ActivateState::ReadOneTimePassword, &other)),
    };

    Otp::from_reply(&data)
        .ok_or_else(|| DriverError::DataInvalid(format!("OTP is invalid (len: {})", data.len())))
}

fn check_config_upload(reply: Reply) -> Result<(), DriverError> {
    match reply {
        Reply::ConfigUpload { success: true } => Ok(()),
        Reply::ConfigUpload { success: false } => {
            Err(DriverError::Protocol("failed to upload mcu config".into()))
        }
        other => Err(unexpected(ActivateState::UploadConfig, &other)),
    }
}
