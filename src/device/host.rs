//! Upward notifications to the image-device framework.

use super::DriverError;
use crate::assembly::Image;

/// Framework states the driver reacts to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDeviceState {
    /// Device is idle.
    Inactive,
    /// Waiting for a finger to touch the sensor.
    AwaitFingerOn,
    /// Finger present, capturing.
    Capture,
    /// Waiting for the finger to lift.
    AwaitFingerOff,
}

/// Receiver of the driver's one-shot lifecycle notifications.
pub trait ImageDeviceHost {
    /// Result of [`Goodix53xd::open`](super::Goodix53xd::open).
    fn open_complete(&mut self, result: Result<(), DriverError>);
    /// Result of [`Goodix53xd::close`](super::Goodix53xd::close).
    fn close_complete(&mut self, result: Result<(), DriverError>);
    /// Result of activation, after the TLS handshake.
    fn activate_complete(&mut self, result: Result<(), DriverError>);
    /// Result of [`Goodix53xd::deactivate`](super::Goodix53xd::deactivate).
    fn deactivate_complete(&mut self, result: Result<(), DriverError>);
    /// An assembled image is ready.
    fn image_captured(&mut self, image: Image);
    /// Finger placed (`true`) or lifted (`false`).
    fn report_finger_status(&mut self, present: bool);
}

/// A notification as recorded by [`RecordingHost`].
#[derive(Debug, Clone, PartialEq)]
pub enum HostEvent {
    /// See [`ImageDeviceHost::open_complete`].
    OpenComplete(Result<(), DriverError>),
    /// See [`ImageDeviceHost::close_complete`].
    CloseComplete(Result<(), DriverError>),
    /// See [`ImageDeviceHost::activate_complete`].
    ActivateComplete(Result<(), DriverError>),
    /// See [`ImageDeviceHost::deactivate_complete`].
    DeactivateComplete(Result<(), DriverError>),
    /// See [`ImageDeviceHost::image_captured`].
    ImageCaptured(Image),
    /// See [`ImageDeviceHost::report_finger_status`].
    FingerStatus(bool),
}

/// Host that keeps every notification in order.
#[derive(Debug, Default)]
pub struct RecordingHost {
    events: Vec<HostEvent>,
}

impl RecordingHost {
    /// Creates a host with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notification received, oldest first.
    pub fn events(&self) -> &[HostEvent] {
        &self.events
    }

    /// Removes and returns the captured images.
    pub fn take_images(&mut self) -> Vec<Image> {
        let (images, rest) = std::mem::take(&mut self.events)
            .into_iter()
            .partition::<Vec<_>, _>(|e| matches!(e, HostEvent::ImageCaptured(_)));
        self.events = rest;
        images
            .into_iter()
            .filter_map(|e| match e {
                HostEvent::ImageCaptured(image) => Some(image),
                _ => None,
            })
            .collect()
    }

    /// The most recent activation result, if any.
    pub fn activation(&self) -> Option<&Result<(), DriverError>> {
        self.events.iter().rev().find_map(|e| match e {
            HostEvent::ActivateComplete(result) => Some(result),
            _ => None,
        })
    }
}

impl ImageDeviceHost for RecordingHost {
    fn open_complete(&mut self, result: Result<(), DriverError>) {
        self.events.push(HostEvent::OpenComplete(result));
    }

    fn close_complete(&mut self, result: Result<(), DriverError>) {
        self.events.push(HostEvent::CloseComplete(result));
    }

    fn activate_complete(&mut self, result: Result<(), DriverError>) {
        self.events.push(HostEvent::ActivateComplete(result));
    }

    fn deactivate_complete(&mut self, result: Result<(), DriverError>) {
        self.events.push(HostEvent::DeactivateComplete(result));
    }

    fn image_captured(&mut self, image: Image) {
        self.events.push(HostEvent::ImageCaptured(image));
    }

    fn report_finger_status(&mut self, present: bool) {
        self.events.push(HostEvent::FingerStatus(present));
    }
}
