//! Typed commands and replies exchanged with the sensor MCU.
//!
//! Framing and encryption belong to the channel; this module only decides
//! which opcode is sent with which payload, and what shape of answer is
//! expected back.

use super::constants::{
    FDT_BLOB_LENGTH, FDT_DOWN_OTP_OFFSETS, FDT_DOWN_PATCH_OFFSETS, FDT_REPLY_FLAG_OFFSET,
    FDT_SWITCH_STATE_DOWN, FDT_SWITCH_STATE_MODE, IMAGE_REQUEST_LENGTH,
    IMAGE_REQUEST_OTP_OFFSETS, OTP_LENGTH,
};
use std::time::Duration;

/// Command identifiers understood by the MCU.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Opcode {
    /// No operation.
    Nop = 0x00,
    /// Read one image.
    McuGetImage = 0x20,
    /// Arm finger-down detection.
    McuSwitchToFdtDown = 0x32,
    /// Enter finger detection mode.
    McuSwitchToFdtMode = 0x36,
    /// Put the MCU into idle.
    McuSwitchToIdleMode = 0x70,
    /// Write a sensor register.
    WriteSensorRegister = 0x80,
    /// Upload the MCU configuration.
    UploadConfigMcu = 0x90,
    /// Power the sensor chip.
    EnableChip = 0x96,
    /// Reset the sensor.
    Reset = 0xa2,
    /// Read the OTP area.
    ReadOtp = 0xa6,
    /// Query the firmware version.
    FirmwareVersion = 0xa8,
    /// Read the preshared key.
    PresetPskRead = 0xe4,
}

/// One-time calibration credential read from the sensor during activation.
#[derive(Clone, PartialEq, Eq)]
pub struct Otp([u8; OTP_LENGTH]);

impl Otp {
    /// Takes the first [`OTP_LENGTH`] bytes of a reply.
    ///
    /// Returns `None` if the reply is shorter than that.
    pub fn from_reply(data: &[u8]) -> Option<Self> {
        let bytes: [u8; OTP_LENGTH] = data.get(..OTP_LENGTH)?.try_into().ok()?;
        Some(Self(bytes))
    }

    /// Returns the byte at `offset`.
    #[inline]
    pub fn byte(&self, offset: usize) -> u8 {
        self.0[offset]
    }

    /// Returns all OTP bytes.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; OTP_LENGTH] {
        &self.0
    }
}

impl std::fmt::Debug for Otp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Otp").finish_non_exhaustive()
    }
}

/// A command bound for the sensor. Each request owns its payload until the
/// channel has sent it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// No operation.
    Nop,
    /// Power the sensor chip on or off.
    EnableChip {
        /// Power on when set.
        enable: bool,
    },
    /// Query the firmware version.
    FirmwareVersion,
    /// Read the preshared key.
    PresetPskRead {
        /// Key slot flags.
        flags: u32,
        /// Expected key length in bytes.
        length: u16,
    },
    /// Reset the sensor.
    Reset {
        /// Reset the sensor as well as the MCU.
        reset_sensor: bool,
        /// Settle delay after the reset.
        sleep_ms: u16,
    },
    /// Read the OTP area.
    ReadOtp,
    /// Put the MCU into idle.
    McuSwitchToIdleMode {
        /// Settle delay after the switch.
        sleep_ms: u16,
    },
    /// Upload the MCU configuration.
    UploadConfigMcu {
        /// Configuration blob.
        config: Vec<u8>,
    },
    /// Arm finger-down detection.
    McuSwitchToFdtDown {
        /// Patched FDT down template.
        payload: [u8; FDT_BLOB_LENGTH],
        /// Whether the sensor answers.
        reply: bool,
    },
    /// Enter finger detection mode.
    McuSwitchToFdtMode {
        /// FDT mode template.
        payload: [u8; FDT_BLOB_LENGTH],
    },
    /// Write a sensor register.
    WriteSensorRegister {
        /// Register address.
        address: u16,
        /// Value to write.
        value: u16,
    },
    /// Read one image.
    McuGetImage {
        /// Readout window derived from the OTP.
        payload: [u8; IMAGE_REQUEST_LENGTH],
        /// Reply deadline.
        timeout: Duration,
    },
}

impl Request {
    /// FDT down template patched with this device's calibration bytes.
    ///
    /// The sensor only answers when `reply` is set; the first send of the
    /// pair goes out with it cleared.
    pub fn fdt_down(otp: &Otp, reply: bool) -> Self {
        let mut payload = FDT_SWITCH_STATE_DOWN;
        for (&at, &from) in FDT_DOWN_PATCH_OFFSETS.iter().zip(&FDT_DOWN_OTP_OFFSETS) {
            payload[at] = otp.byte(from);
        }
        payload[FDT_REPLY_FLAG_OFFSET] = u8::from(reply);
        Self::McuSwitchToFdtDown { payload, reply }
    }

    /// Finger detection mode request.
    pub fn fdt_mode() -> Self {
        Self::McuSwitchToFdtMode {
            payload: FDT_SWITCH_STATE_MODE,
        }
    }

    /// Image readout request.
    ///
    /// Layout: `41 03 a 00 a-6 00 b 00 b-4 00` with `a = otp[26]` and
    /// `b = otp[45]`, byte arithmetic wrapping.
    pub fn get_image(otp: &Otp, timeout: Duration) -> Self {
        let a = otp.byte(IMAGE_REQUEST_OTP_OFFSETS[0]);
        let b = otp.byte(IMAGE_REQUEST_OTP_OFFSETS[1]);
        Self::McuGetImage {
            payload: [
                0x41,
                0x03,
                a,
                0x00,
                a.wrapping_sub(6),
                0x00,
                b,
                0x00,
                b.wrapping_sub(4),
                0x00,
            ],
            timeout,
        }
    }

    /// Opcode this request is sent with.
    pub fn opcode(&self) -> Opcode {
        match self {
            Self::Nop => Opcode::Nop,
            Self::EnableChip { .. } => Opcode::EnableChip,
            Self::FirmwareVersion => Opcode::FirmwareVersion,
            Self::PresetPskRead { .. } => Opcode::PresetPskRead,
            Self::Reset { .. } => Opcode::Reset,
            Self::ReadOtp => Opcode::ReadOtp,
            Self::McuSwitchToIdleMode { .. } => Opcode::McuSwitchToIdleMode,
            Self::UploadConfigMcu { .. } => Opcode::UploadConfigMcu,
            Self::McuSwitchToFdtDown { .. } => Opcode::McuSwitchToFdtDown,
            Self::McuSwitchToFdtMode { .. } => Opcode::McuSwitchToFdtMode,
            Self::WriteSensorRegister { .. } => Opcode::WriteSensorRegister,
            Self::McuGetImage { .. } => Opcode::McuGetImage,
        }
    }

    /// Whether the sensor sends a data reply, as opposed to only the
    /// transport acknowledgement.
    pub fn expects_reply(&self) -> bool {
        match self {
            Self::McuSwitchToFdtDown { reply, .. } => *reply,
            Self::Nop | Self::EnableChip { .. } | Self::WriteSensorRegister { .. } => false,
            _ => true,
        }
    }

    /// Reply deadline; `None` waits indefinitely.
    pub fn timeout(&self) -> Option<Duration> {
        match self {
            Self::McuGetImage { timeout, .. } => Some(*timeout),
            _ => None,
        }
    }
}

/// A decoded answer from the sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Transport-level acknowledgement with no payload.
    Ack,
    /// Firmware version string.
    Firmware(String),
    /// Preshared key read result.
    PresetPsk {
        /// Whether the key could be read.
        success: bool,
        /// Flags the key is stored under.
        flags: u32,
        /// Key bytes.
        psk: Vec<u8>,
    },
    /// Reset result.
    Reset {
        /// Whether the reset succeeded.
        success: bool,
        /// Reset counter reported by the sensor.
        number: u16,
    },
    /// Config upload result.
    ConfigUpload {
        /// Whether the MCU accepted the configuration.
        success: bool,
    },
    /// Raw payload (OTP contents, FDT events, image data).
    Data(Vec<u8>),
}

impl Reply {
    /// Short name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Ack => "ack",
            Self::Firmware(_) => "firmware",
            Self::PresetPsk { .. } => "preset-psk",
            Self::Reset { .. } => "reset",
            Self::ConfigUpload { .. } => "config-upload",
            Self::Data(_) => "data",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn otp() -> Otp {
        let bytes: Vec<u8> = (0..OTP_LENGTH as u8).map(|i| i + 100).collect();
        Otp::from_reply(&bytes).unwrap()
    }

    #[test]
    fn test_otp_requires_64_bytes() {
        assert!(Otp::from_reply(&[0u8; 63]).is_none());
        let long = vec![7u8; 80];
        assert_eq!(Otp::from_reply(&long).unwrap().as_bytes(), &[7u8; 64]);
    }

    #[test]
    fn test_fdt_down_patch_and_flag() {
        let otp = otp();
        let Request::McuSwitchToFdtDown { payload, reply } = Request::fdt_down(&otp, false) else {
            panic!("wrong request");
        };
        assert!(!reply);
        assert_eq!(payload[2], 133);
        assert_eq!(payload[4], 141);
        assert_eq!(payload[6], 142);
        assert_eq!(payload[8], 143);
        assert_eq!(payload[FDT_REPLY_FLAG_OFFSET], 0);
        // Unpatched bytes keep the template values.
        assert_eq!(payload[0], FDT_SWITCH_STATE_DOWN[0]);
        assert_eq!(payload[3], FDT_SWITCH_STATE_DOWN[3]);

        let ack = Request::fdt_down(&otp, true);
        assert!(ack.expects_reply());
        let Request::McuSwitchToFdtDown { payload, .. } = ack else {
            panic!("wrong request");
        };
        assert_eq!(payload[FDT_REPLY_FLAG_OFFSET], 1);
    }

    #[test]
    fn test_fdt_down_leaves_template_untouched() {
        let _ = Request::fdt_down(&otp(), true);
        assert_eq!(FDT_SWITCH_STATE_DOWN[FDT_REPLY_FLAG_OFFSET], 0);
    }

    #[test]
    fn test_image_request_payload() {
        let request = Request::get_image(&otp(), Duration::from_millis(500));
        assert_eq!(request.opcode(), Opcode::McuGetImage);
        assert_eq!(request.timeout(), Some(Duration::from_millis(500)));
        let Request::McuGetImage { payload, .. } = request else {
            panic!("wrong request");
        };
        assert_eq!(payload, [0x41, 0x03, 126, 0, 120, 0, 145, 0, 141, 0]);
    }

    #[test]
    fn test_image_request_wraps() {
        let mut bytes = [0u8; OTP_LENGTH];
        bytes[26] = 2;
        bytes[45] = 1;
        let otp = Otp::from_reply(&bytes).unwrap();
        let Request::McuGetImage { payload, .. } = Request::get_image(&otp, Duration::ZERO) else {
            panic!("wrong request");
        };
        assert_eq!(payload[4], 0xfc);
        assert_eq!(payload[8], 0xfd);
    }
}
