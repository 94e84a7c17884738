//! Goodix 53xd Fingerprint Sensor Driver Core
//!
//! Control and data-acquisition logic for the Goodix 53xd capacitive
//! fingerprint sensors on USB (`27c6:538d`, `27c6:532d`). The sensor talks
//! a framed command protocol under TLS; this crate authenticates and
//! provisions it, drives image capture, and turns its packed 12-bit frames
//! into an assembled 8-bit image.
//!
//! # Architecture
//!
//! The system follows an explicit data flow:
//!
//! ```text
//! device ─► ssm (activate, scan) ─► protocol::Channel
//!                   │
//!                   ▼
//!            frame (decode → store → normalize) ─► assembly ─► host
//! ```
//!
//! # Design Principles
//!
//! - **Completion-driven**: every command yields exactly one completion,
//!   fed back by the host loop; one command is in flight at a time
//! - **Fail-fast**: any validation or transport error ends the running
//!   machine; nothing is retried internally
//! - **Transport-agnostic**: USB and TLS live behind [`protocol::Channel`]
//!
//! # Example
//!
//! ```
//! use goodix_53xd::{
//!     device::{DriverConfig, Goodix53xd, ImageDeviceState, RecordingHost},
//!     protocol::SimulatedSensor,
//! };
//!
//! let mut driver =
//!     Goodix53xd::new(SimulatedSensor::new(), RecordingHost::new(), DriverConfig::default())
//!         .unwrap();
//!
//! driver.open();
//! driver.activate();
//! while let Some(completion) = driver.channel_mut().next_completion() {
//!     driver.handle_completion(completion);
//! }
//! assert!(driver.is_activated());
//!
//! driver.change_state(ImageDeviceState::AwaitFingerOn);
//! while let Some(completion) = driver.channel_mut().next_completion() {
//!     driver.handle_completion(completion);
//! }
//! assert_eq!(driver.host_mut().take_images().len(), 1);
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]
#![deny(unsafe_code)]

pub mod assembly;
pub mod device;
pub mod frame;
pub mod metrics;
pub mod protocol;
pub mod ssm;

// Re-export commonly used types at crate root
pub use assembly::{Assembler, AssemblyContext, Image, OverlapAssembler};
pub use device::{DriverConfig, DriverError, DriverStats, Goodix53xd, ImageDeviceHost};
pub use frame::{decode_frame, normalize, FrameStore, NormalizedFrame, RawFrame};
pub use protocol::{Channel, Completion, SimulatedSensor, Ticket, TransportError};

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
