//! Simulated 53xd for demos and tests.
//!
//! Answers every request the way a healthy sensor does, with switches for
//! injecting the failures the driver has to handle.

use super::constants::{
    CONFIG_LENGTH, FIRMWARE_VERSION, OTP_LENGTH, PSK, PSK_FLAGS, RESET_NUMBER,
};
use super::{Channel, Completion, Opcode, Reply, Request, Ticket, TransportError};
use crate::frame::{HEIGHT, SCAN_WIDTH};
use std::collections::VecDeque;

/// Packs 12-bit samples into the sensor's 4-pixels-per-6-bytes layout.
///
/// `pixels` is in scan-line order and its length must be a multiple of 4.
pub fn pack_frame(pixels: &[u16]) -> Vec<u8> {
    let mut raw = Vec::with_capacity(pixels.len() / 4 * 6);
    for p in pixels.chunks_exact(4) {
        raw.extend_from_slice(&[
            (((p[0] >> 8) & 0x0f) | ((p[1] & 0x0f) << 4)) as u8,
            (p[0] & 0xff) as u8,
            (p[2] & 0xff) as u8,
            ((p[1] >> 4) & 0xff) as u8,
            ((p[3] >> 4) & 0xff) as u8,
            (((p[2] >> 8) & 0x0f) | ((p[3] & 0x0f) << 4)) as u8,
        ]);
    }
    raw
}

/// Synthetic ridge pattern, shifted by `phase` so consecutive captures differ.
pub fn ridge_pattern(phase: u64) -> Vec<u16> {
    let shift = (phase % 16) as f64;
    (0..HEIGHT)
        .flat_map(|y| (0..SCAN_WIDTH).map(move |x| (x, y)))
        .map(|(x, y)| {
            let (dx, dy) = (x as f64 - 32.0, y as f64 - 40.0);
            let r = (dx * dx + dy * dy * 0.6).sqrt();
            let ridge = ((r + shift) * std::f64::consts::PI / 4.0).sin();
            (2048.0 + 1200.0 * ridge) as u16
        })
        .collect()
}

/// In-memory sensor implementing [`Channel`].
#[derive(Debug)]
pub struct SimulatedSensor {
    claimed: bool,
    read_loop: bool,
    tls: bool,
    queue: VecDeque<Completion>,
    requests: Vec<Request>,
    captures: u64,

    firmware: String,
    psk_success: bool,
    psk_flags: u32,
    psk: Vec<u8>,
    reset_success: bool,
    reset_number: u16,
    otp: Vec<u8>,
    accept_config: bool,
    image_length: Option<usize>,
    fail_on: Option<(Opcode, TransportError)>,
    tls_failure: Option<TransportError>,
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self {
            claimed: false,
            read_loop: false,
            tls: false,
            queue: VecDeque::new(),
            requests: Vec::new(),
            captures: 0,
            firmware: FIRMWARE_VERSION.to_string(),
            psk_success: true,
            psk_flags: PSK_FLAGS,
            psk: PSK.to_vec(),
            reset_success: true,
            reset_number: RESET_NUMBER,
            otp: (0..OTP_LENGTH).map(|i| (i * 7 + 3) as u8).collect(),
            accept_config: true,
            image_length: None,
            fail_on: None,
            tls_failure: None,
        }
    }
}

impl SimulatedSensor {
    /// Creates a healthy sensor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports `firmware` as the version string.
    pub fn with_firmware(mut self, firmware: &str) -> Self {
        self.firmware = firmware.to_string();
        self
    }

    /// Reports `psk` as the preshared key.
    pub fn with_psk(mut self, psk: &[u8]) -> Self {
        self.psk = psk.to_vec();
        self
    }

    /// Reports `flags` with the preshared key.
    pub fn with_psk_flags(mut self, flags: u32) -> Self {
        self.psk_flags = flags;
        self
    }

    /// Fails the preshared key read.
    pub fn with_psk_unreadable(mut self) -> Self {
        self.psk_success = false;
        self
    }

    /// Reports `number` after a reset.
    pub fn with_reset_number(mut self, number: u16) -> Self {
        self.reset_number = number;
        self
    }

    /// Fails the reset.
    pub fn with_reset_failure(mut self) -> Self {
        self.reset_success = false;
        self
    }

    /// Answers the OTP read with `otp`.
    pub fn with_otp(mut self, otp: &[u8]) -> Self {
        self.otp = otp.to_vec();
        self
    }

    /// Rejects the config upload.
    pub fn with_config_rejected(mut self) -> Self {
        self.accept_config = false;
        self
    }

    /// Cuts every image reply down to `length` bytes.
    pub fn with_image_length(mut self, length: usize) -> Self {
        self.image_length = Some(length);
        self
    }

    /// Fails every request carrying `opcode` with `error`.
    pub fn with_transport_failure(mut self, opcode: Opcode, error: TransportError) -> Self {
        self.fail_on = Some((opcode, error));
        self
    }

    /// Fails the TLS handshake with `error`.
    pub fn with_tls_failure(mut self, error: TransportError) -> Self {
        self.tls_failure = Some(error);
        self
    }

    /// Pops the oldest pending completion.
    pub fn next_completion(&mut self) -> Option<Completion> {
        self.queue.pop_front()
    }

    /// Number of completions waiting to be delivered.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }

    /// Every request submitted so far, oldest first.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    /// Opcodes submitted so far, oldest first.
    pub fn opcodes(&self) -> Vec<Opcode> {
        self.requests.iter().map(Request::opcode).collect()
    }

    /// Whether the interface is claimed.
    pub fn is_claimed(&self) -> bool {
        self.claimed
    }

    /// Whether the read loop is running.
    pub fn is_reading(&self) -> bool {
        self.read_loop
    }

    /// Whether the TLS session is up.
    pub fn is_secured(&self) -> bool {
        self.tls
    }

    fn respond(&mut self, request: &Request) -> Reply {
        match request {
            Request::Nop
            | Request::EnableChip { .. }
            | Request::McuSwitchToIdleMode { .. }
            | Request::WriteSensorRegister { .. } => Reply::Ack,
            Request::FirmwareVersion => Reply::Firmware(self.firmware.clone()),
            Request::PresetPskRead { .. } => Reply::PresetPsk {
                success: self.psk_success,
                flags: self.psk_flags,
                psk: self.psk.clone(),
            },
            Request::Reset { .. } => Reply::Reset {
                success: self.reset_success,
                number: self.reset_number,
            },
            Request::ReadOtp => Reply::Data(self.otp.clone()),
            Request::UploadConfigMcu { config } => Reply::ConfigUpload {
                success: self.accept_config && config.len() == CONFIG_LENGTH,
            },
            Request::McuSwitchToFdtDown { reply: false, .. } => Reply::Ack,
            Request::McuSwitchToFdtDown { reply: true, .. }
            | Request::McuSwitchToFdtMode { .. } => Reply::Data(vec![0x01, 0x00, 0x00, 0x00]),
            Request::McuGetImage { .. } => {
                self.captures += 1;
                let mut raw = pack_frame(&ridge_pattern(self.captures));
                if let Some(length) = self.image_length {
                    raw.truncate(length);
                }
                Reply::Data(raw)
            }
        }
    }
}

impl Channel for SimulatedSensor {
    fn claim(&mut self) -> Result<(), TransportError> {
        self.claimed = true;
        Ok(())
    }

    fn release(&mut self) -> Result<(), TransportError> {
        if !self.claimed {
            return Err(TransportError::Disconnected);
        }
        self.claimed = false;
        Ok(())
    }

    fn start_read_loop(&mut self) {
        self.read_loop = true;
    }

    fn submit(&mut self, ticket: Ticket, request: Request) {
        let injected = match &self.fail_on {
            Some((opcode, error)) if *opcode == request.opcode() => Some(error.clone()),
            _ => None,
        };
        let completion = match injected {
            Some(error) => Completion::err(ticket, error),
            None => Completion::ok(ticket, self.respond(&request)),
        };
        self.requests.push(request);
        self.queue.push_back(completion);
    }

    fn establish_tls(&mut self, ticket: Ticket) {
        let completion = match self.tls_failure.clone() {
            Some(error) => Completion::err(ticket, error),
            None => {
                self.tls = true;
                Completion::ok(ticket, Reply::Ack)
            }
        };
        self.queue.push_back(completion);
    }

    fn shutdown_tls(&mut self) -> Result<(), TransportError> {
        self.tls = false;
        Ok(())
    }

    fn reset_state(&mut self) {
        self.queue.clear();
        self.read_loop = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{decode_frame, RAW_FRAME_SIZE};

    #[test]
    fn test_packed_pattern_decodes_back() {
        let pattern = ridge_pattern(3);
        let raw = pack_frame(&pattern);
        assert_eq!(raw.len(), RAW_FRAME_SIZE);

        let frame = decode_frame(&raw).unwrap();
        assert_eq!(frame.pixels(), &pattern[..]);
    }

    #[test]
    fn test_one_completion_per_submit() {
        let mut sensor = SimulatedSensor::new();
        sensor.submit(Ticket(1), Request::Nop);
        sensor.submit(Ticket(2), Request::FirmwareVersion);

        assert_eq!(sensor.pending(), 2);
        assert_eq!(sensor.next_completion().unwrap().ticket, Ticket(1));
        assert_eq!(
            sensor.next_completion().unwrap().result,
            Ok(Reply::Firmware(FIRMWARE_VERSION.to_string()))
        );
        assert!(sensor.next_completion().is_none());
    }

    #[test]
    fn test_injected_transport_failure() {
        let mut sensor =
            SimulatedSensor::new().with_transport_failure(Opcode::Reset, TransportError::Timeout);
        sensor.submit(
            Ticket(7),
            Request::Reset {
                reset_sensor: true,
                sleep_ms: 20,
            },
        );
        assert_eq!(
            sensor.next_completion(),
            Some(Completion::err(Ticket(7), TransportError::Timeout))
        );
    }
}
