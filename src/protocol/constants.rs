//! Wire constants for the 53xd.
//!
//! Everything in this file is compared or transmitted bit-exactly, with
//! one exception: the bodies of the two FDT templates are reconstructed.
//! Only their length, the patched offsets and the reply flag position are
//! known; the remaining bytes have not been checked against hardware.
//! Templates that get patched per device are plain `const` arrays; callers
//! copy them into an owned buffer before writing to them.

/// USB vendor/product pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsbId {
    /// Vendor id.
    pub vid: u16,
    /// Product id.
    pub pid: u16,
}

/// Devices handled by this driver.
pub const ID_TABLE: &[UsbId] = &[
    UsbId { vid: 0x27c6, pid: 0x538d },
    UsbId { vid: 0x27c6, pid: 0x532d },
];

/// Returns true if the vendor/product pair is a supported sensor.
pub fn is_supported(vid: u16, pid: u16) -> bool {
    ID_TABLE.iter().any(|id| id.vid == vid && id.pid == pid)
}

/// Static description of the sensor as registered with the image framework.
#[derive(Debug, Clone, Copy)]
pub struct DeviceInfo {
    /// Driver id.
    pub id: &'static str,
    /// Human-readable name.
    pub name: &'static str,
    /// USB interface number.
    pub interface: u8,
    /// Bulk IN endpoint.
    pub ep_in: u8,
    /// Bulk OUT endpoint.
    pub ep_out: u8,
    /// Match score threshold used by the framework's comparator.
    pub bz3_threshold: u32,
    /// Press sensor: the finger rests on it rather than swiping across.
    pub press_scan: bool,
    /// Frame width in pixels.
    pub img_width: usize,
    /// Frame height in pixels.
    pub img_height: usize,
}

/// The 53xd device description.
pub const DEVICE_INFO: DeviceInfo = DeviceInfo {
    id: "goodixtls53xd",
    name: "Goodix TLS Fingerprint Sensor 53XD",
    interface: 0,
    ep_in: 0x83,
    ep_out: 0x01,
    bz3_threshold: 24,
    press_scan: true,
    img_width: crate::frame::WIDTH,
    img_height: crate::frame::HEIGHT,
};

/// Only firmware this driver talks to.
pub const FIRMWARE_VERSION: &str = "GF5298_GM168SEC_APP_13016";

/// Flags the PSK read is issued with and must echo.
pub const PSK_FLAGS: u32 = 0xbb02_0001;
/// Length of the preshared key in bytes.
pub const PSK_LENGTH: u16 = 32;

/// Preshared key every supported sensor holds.
pub const PSK: [u8; PSK_LENGTH as usize] = [
    0x66, 0x68, 0x7a, 0xad, 0xf8, 0x62, 0xbd, 0x77, 0x6c, 0x8f, 0xc1, 0x8b,
    0x8e, 0x9f, 0x8e, 0x20, 0x08, 0x97, 0x14, 0x85, 0x6e, 0xe2, 0x33, 0xb3,
    0x90, 0x2a, 0x59, 0x1d, 0x0d, 0x5f, 0x29, 0x25,
];

/// Counter the sensor reports back after a reset.
pub const RESET_NUMBER: u16 = 2048;

/// Bytes of OTP kept per session.
pub const OTP_LENGTH: usize = 64;

/// Register written before every image readout, and its value.
pub const IMAGE_TRIGGER_REGISTER: u16 = 556;
/// Value written to [`IMAGE_TRIGGER_REGISTER`].
pub const IMAGE_TRIGGER_VALUE: u16 = 0x05;

/// OTP bytes patched into the FDT down template at offsets 2, 4, 6 and 8.
pub const FDT_DOWN_OTP_OFFSETS: [usize; 4] = [33, 41, 42, 43];
/// Template byte offsets receiving the OTP calibration values.
pub const FDT_DOWN_PATCH_OFFSETS: [usize; 4] = [2, 4, 6, 8];
/// Last template byte: 0 asks the sensor not to reply, 1 asks it to.
pub const FDT_REPLY_FLAG_OFFSET: usize = 20;

/// Length of the FDT templates.
pub const FDT_BLOB_LENGTH: usize = 21;

/// FDT mode template. Reconstructed, see the module docs.
pub const FDT_SWITCH_STATE_MODE: [u8; FDT_BLOB_LENGTH] = [
    0x0d, 0x01, 0x80, 0xaf, 0x80, 0xbf, 0x80, 0xa4, 0x80, 0xb8, 0x80, 0xa8,
    0x80, 0xb7, 0x80, 0xa7, 0x80, 0xb6, 0x80, 0xa7, 0x01,
];

/// FDT down template, patched per device before sending. Reconstructed,
/// see the module docs.
pub const FDT_SWITCH_STATE_DOWN: [u8; FDT_BLOB_LENGTH] = [
    0x0c, 0x01, 0x80, 0xaf, 0x80, 0xbf, 0x80, 0xa4, 0x80, 0xb8, 0x80, 0xa8,
    0x80, 0xb7, 0x80, 0xa7, 0x80, 0xb6, 0x80, 0xa7, 0x00,
];

/// OTP offsets feeding the image request window.
pub const IMAGE_REQUEST_OTP_OFFSETS: [usize; 2] = [26, 45];
/// Length of the image request payload.
pub const IMAGE_REQUEST_LENGTH: usize = 10;

/// Length of [`CONFIG`].
pub const CONFIG_LENGTH: usize = 256;

/// Vendor MCU configuration uploaded at the end of activation.
pub const CONFIG: [u8; CONFIG_LENGTH] = [
    0x70, 0x11, 0x60, 0x71, 0x2c, 0x9d, 0x2c, 0xc9, 0x1c, 0xe5, 0x18, 0xfd,
    0x00, 0xfd, 0x00, 0xfd, 0x03, 0xba, 0x00, 0x01, 0x80, 0xca, 0x00, 0x08,
    0x00, 0x84, 0x00, 0xbe, 0xc3, 0x86, 0x00, 0xb1, 0xb6, 0x88, 0x00, 0xba,
    0xba, 0x8a, 0x00, 0xb3, 0xb3, 0x8c, 0x00, 0xbc, 0xbc, 0x8e, 0x00, 0xb1,
    0xb1, 0x90, 0x00, 0xbb, 0xbb, 0x92, 0x00, 0xb1, 0xb1, 0x94, 0x00, 0x00,
    0x00, 0x96, 0x00, 0x00, 0x00, 0x98, 0x00, 0x00, 0x00, 0x9a, 0x00, 0x00,
    0x00, 0xd2, 0x00, 0x00, 0x00, 0xd4, 0x00, 0x00, 0x00, 0xd6, 0x00, 0x00,
    0x00, 0xd8, 0x00, 0x00, 0x00, 0x50, 0x00, 0x01, 0x05, 0xd0, 0x00, 0x00,
    0x00, 0x70, 0x00, 0x00, 0x00, 0x72, 0x00, 0x78, 0x56, 0x74, 0x00, 0x34,
    0x12, 0x20, 0x00, 0x10, 0x40, 0x2a, 0x01, 0x02, 0x04, 0x22, 0x00, 0x01,
    0x20, 0x24, 0x00, 0x32, 0x00, 0x80, 0x00, 0x01, 0x00, 0x5c, 0x00, 0x01,
    0x01, 0x56, 0x00, 0x24, 0x20, 0x58, 0x00, 0x01, 0x02, 0x32, 0x00, 0x04,
    0x02, 0x66, 0x00, 0x00, 0x02, 0x7c, 0x00, 0x00, 0x58, 0x82, 0x00, 0x7f,
    0x08, 0x2a, 0x01, 0x82, 0x07, 0x22, 0x00, 0x01, 0x20, 0x24, 0x00, 0x14,
    0x00, 0x80, 0x00, 0x01, 0x40, 0x5c, 0x00, 0xe7, 0x00, 0x56, 0x00, 0x06,
    0x14, 0x58, 0x00, 0x04, 0x02, 0x32, 0x00, 0x0c, 0x02, 0x66, 0x00, 0x00,
    0x02, 0x7c, 0x00, 0x00, 0x58, 0x82, 0x00, 0x80, 0x08, 0x2a, 0x01, 0x08,
    0x00, 0x5c, 0x00, 0x01, 0x01, 0x54, 0x00, 0x00, 0x01, 0x62, 0x00, 0x08,
    0x04, 0x64, 0x00, 0x10, 0x00, 0x66, 0x00, 0x00, 0x02, 0x7c, 0x00, 0x00,
    0x58, 0x2a, 0x01, 0x08, 0x00, 0x5c, 0x00, 0xdc, 0x00, 0x52, 0x00, 0x08,
    0x00, 0x54, 0x00, 0x00, 0x01, 0x66, 0x00, 0x00, 0x02, 0x7c, 0x00, 0x00,
    0x58, 0x20, 0xc5, 0x1d,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_id_table() {
        assert!(is_supported(0x27c6, 0x538d));
        assert!(is_supported(0x27c6, 0x532d));
        assert!(!is_supported(0x27c6, 0x5110));
    }

    #[test]
    fn test_blob_layout() {
        assert_eq!(CONFIG[0], 0x70);
        assert_eq!(CONFIG[CONFIG_LENGTH - 1], 0x1d);
        assert_eq!(FDT_SWITCH_STATE_DOWN[FDT_REPLY_FLAG_OFFSET], 0x00);
        assert!(FDT_DOWN_PATCH_OFFSETS
            .iter()
            .all(|&off| off < FDT_REPLY_FLAG_OFFSET));
    }
}
