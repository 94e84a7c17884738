//! The 53xd image device.
//!
//! [`Goodix53xd`] receives lifecycle calls from the image-device framework,
//! runs one state machine at a time against the [`Channel`] and feeds it the
//! completions the host loop hands back.
//!
//! ```text
//! open ─► activate ─► ActivateSsm ─► TLS ─► activate_complete
//!                                             │
//!         change_state(AwaitFingerOn) ─► ScanSsm ─► image_captured
//! ```

mod config;
mod error;
mod host;
mod session;

pub use config::{ConfigError, DriverConfig, FileConfig, OutputConfig, MAX_CAPTURE_FRAMES};
pub use error::DriverError;
pub(crate) use error::hex;
pub use host::{HostEvent, ImageDeviceHost, ImageDeviceState, RecordingHost};
pub use session::Session;

use crate::assembly::{Assembler, OverlapAssembler};
use crate::protocol::{Channel, Completion, Ticket};
use crate::ssm::{ActivateSsm, Context, Outcome, ScanSsm};

/// The machine currently driving the device.
#[derive(Debug)]
enum Machine {
    Idle,
    Activating(ActivateSsm),
    /// MCU configured, TLS handshake in flight.
    Securing,
    Scanning(ScanSsm),
}

impl Machine {
    fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Activating(_) => "activating",
            Self::Securing => "securing",
            Self::Scanning(_) => "scanning",
        }
    }
}

/// Counters kept by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DriverStats {
    /// Activations begun.
    pub activations_started: u64,
    /// Activations that established the secure channel.
    pub activations_completed: u64,
    /// Activations that failed.
    pub activations_failed: u64,
    /// Scans begun.
    pub scans_started: u64,
    /// Scans that produced an image.
    pub scans_completed: u64,
    /// Scans that failed or were refused.
    pub scans_failed: u64,
    /// Frames decoded since the driver was created.
    pub frames_captured: u64,
    /// Frames waiting in the store.
    pub frames_pending: u64,
    /// Completions discarded because their ticket was not outstanding.
    pub stale_completions: u64,
    /// Whether the device is currently activated.
    pub activated: bool,
}

/// Driver for Goodix 53xd sensors.
pub struct Goodix53xd<C, H, A = OverlapAssembler> {
    channel: C,
    host: H,
    assembler: A,
    config: DriverConfig,
    session: Session,
    machine: Machine,
    /// Ticket of the one command in flight.
    outstanding: Option<Ticket>,
    open: bool,
    activated: bool,
    stats: DriverStats,
}

impl<C: Channel, H: ImageDeviceHost> Goodix53xd<C, H> {
    /// Creates a driver using the built-in assembler.
    pub fn new(channel: C, host: H, config: DriverConfig) -> Result<Self, ConfigError> {
        Self::with_assembler(channel, host, OverlapAssembler::new(), config)
    }
}

impl<C: Channel, H: ImageDeviceHost, A: Assembler> Goodix53xd<C, H, A> {
    /// Creates a driver stitching images with `assembler`.
    pub fn with_assembler(
        channel: C,
        host: H,
        assembler: A,
        config: DriverConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        Ok(Self {
            channel,
            host,
            assembler,
            config,
            session: Session::new(),
            machine: Machine::Idle,
            outstanding: None,
            open: false,
            activated: false,
            stats: DriverStats::default(),
        })
    }

    /// Claims the USB interface.
    pub fn open(&mut self) {
        let result = if self.open {
            Err(DriverError::Busy)
        } else {
            self.channel.claim().map_err(DriverError::from)
        };

        match &result {
            Ok(()) => {
                self.open = true;
                tracing::info!("Device opened");
            }
            Err(e) => tracing::error!(error = %e, "Failed to open device"),
        }
        self.host.open_complete(result);
    }

    /// Releases the USB interface.
    pub fn close(&mut self) {
        let result = if self.open {
            self.channel.release().map_err(DriverError::from)
        } else {
            Err(DriverError::NotOpen)
        };

        self.open = false;
        match &result {
            Ok(()) => tracing::info!("Device closed"),
            Err(e) => tracing::error!(error = %e, "Failed to close device"),
        }
        self.host.close_complete(result);
    }

    /// Starts a fresh activation. The result arrives through
    /// [`ImageDeviceHost::activate_complete`].
    pub fn activate(&mut self) {
        if !self.open {
            self.host.activate_complete(Err(DriverError::NotOpen));
            return;
        }
        if !matches!(self.machine, Machine::Idle) {
            tracing::warn!(running = self.machine.name(), "Activation refused");
            self.host.activate_complete(Err(DriverError::Busy));
            return;
        }

        self.session.reset();
        self.activated = false;
        self.stats.activations_started += 1;

        let mut ssm = ActivateSsm::new();
        let outcome = ssm.start(&mut self.context());
        self.machine = Machine::Activating(ssm);
        self.after_activate_step(Ok(outcome));
    }

    /// Tears down the secure channel and forgets the session.
    pub fn deactivate(&mut self) {
        self.reset_state();

        let result = self.channel.shutdown_tls().map_err(DriverError::from);
        self.session.reset();
        self.activated = false;

        match &result {
            Ok(()) => tracing::info!("Device deactivated"),
            Err(e) => tracing::error!(error = %e, "Failed to shut down secure channel"),
        }
        self.host.deactivate_complete(result);
    }

    /// Reacts to framework state changes. Entering
    /// [`ImageDeviceState::AwaitFingerOn`] starts a scan.
    pub fn change_state(&mut self, state: ImageDeviceState) {
        tracing::debug!(?state, "Device state changed");
        if state != ImageDeviceState::AwaitFingerOn {
            return;
        }

        if !matches!(self.machine, Machine::Idle) {
            tracing::warn!(running = self.machine.name(), "Scan refused");
            self.stats.scans_failed += 1;
            return;
        }
        if !self.activated {
            tracing::error!(error = %DriverError::NotActivated, "Scan failed");
            self.stats.scans_failed += 1;
            return;
        }

        self.stats.scans_started += 1;
        let mut ssm = ScanSsm::new();
        let outcome = ssm.start(&mut self.context());
        self.machine = Machine::Scanning(ssm);
        self.after_scan_step(outcome);
    }

    /// Feeds one completion from the host loop to the running machine.
    ///
    /// Completions whose ticket is not the one outstanding are discarded.
    pub fn handle_completion(&mut self, completion: Completion) {
        if self.outstanding != Some(completion.ticket) {
            tracing::warn!(
                ticket = %completion.ticket,
                outstanding = ?self.outstanding,
                "Discarding stale completion"
            );
            self.stats.stale_completions += 1;
            return;
        }
        self.outstanding = None;

        match std::mem::replace(&mut self.machine, Machine::Idle) {
            Machine::Idle => {
                tracing::warn!(ticket = %completion.ticket, "Completion with no machine running");
            }
            Machine::Activating(mut ssm) => {
                let step = ssm.handle(&mut self.context(), completion.result);
                self.machine = Machine::Activating(ssm);
                self.after_activate_step(step);
            }
            Machine::Securing => match completion.result {
                Ok(_) => {
                    self.activated = true;
                    self.stats.activations_completed += 1;
                    tracing::info!("Device activated");
                    self.host.activate_complete(Ok(()));
                }
                Err(e) => self.fail_activation(e.into()),
            },
            Machine::Scanning(mut ssm) => {
                let step = ssm.handle(&mut self.context(), completion.result);
                self.machine = Machine::Scanning(ssm);
                self.after_scan_step(step);
            }
        }
    }

    /// Drops the running machine, queued transfers and stored frames.
    pub fn reset_state(&mut self) {
        if !matches!(self.machine, Machine::Idle) {
            tracing::debug!(running = self.machine.name(), "Abandoning machine");
        }
        self.machine = Machine::Idle;
        self.outstanding = None;
        self.channel.reset_state();
        self.session.frames_mut().clear();
    }

    fn after_activate_step(&mut self, step: Result<Outcome, DriverError>) {
        match step {
            Ok(Outcome::Pending(ticket)) => self.outstanding = Some(ticket),
            Ok(Outcome::Complete) => {
                tracing::debug!("MCU configured, establishing secure channel");
                let ticket = self.session.next_ticket();
                self.machine = Machine::Securing;
                self.outstanding = Some(ticket);
                self.channel.establish_tls(ticket);
            }
            Err(e) => self.fail_activation(e),
        }
    }

    fn fail_activation(&mut self, error: DriverError) {
        tracing::error!(error = %error, "Activation failed");
        self.machine = Machine::Idle;
        self.stats.activations_failed += 1;
        self.host.activate_complete(Err(error));
    }

    fn after_scan_step(&mut self, step: Result<Outcome, DriverError>) {
        match step {
            Ok(Outcome::Pending(ticket)) => self.outstanding = Some(ticket),
            Ok(Outcome::Complete) => {
                self.machine = Machine::Idle;
                self.stats.scans_completed += 1;
            }
            Err(e) => {
                // Frames already stored stay until the next scan or reset.
                tracing::error!(error = %e, "Scan failed");
                self.machine = Machine::Idle;
                self.stats.scans_failed += 1;
            }
        }
    }

    fn context(&mut self) -> Context<'_> {
        Context {
            session: &mut self.session,
            channel: &mut self.channel,
            host: &mut self.host,
            assembler: &self.assembler,
            config: &self.config,
        }
    }

    /// Whether the USB interface is claimed.
    pub fn is_open(&self) -> bool {
        self.open
    }

    /// Whether activation, including TLS, has completed.
    pub fn is_activated(&self) -> bool {
        self.activated
    }

    /// Whether a machine is running.
    pub fn is_busy(&self) -> bool {
        !matches!(self.machine, Machine::Idle)
    }

    /// Ticket of the command in flight, if any.
    pub fn outstanding(&self) -> Option<Ticket> {
        self.outstanding
    }

    /// Driver configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Per-activation session state.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// The secure channel.
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Mutable access to the secure channel, used by the host loop.
    pub fn channel_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// The framework host.
    pub fn host(&self) -> &H {
        &self.host
    }

    /// Mutable access to the framework host.
    pub fn host_mut(&mut self) -> &mut H {
        &mut self.host
    }

    /// Current counters.
    pub fn stats(&self) -> DriverStats {
        DriverStats {
            frames_captured: self.session.frames().total_captured(),
            frames_pending: self.session.frames().len() as u64,
            activated: self.activated,
            ..self.stats
        }
    }
}

impl<C, H, A> std::fmt::Debug for Goodix53xd<C, H, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Goodix53xd")
            .field("machine", &self.machine.name())
            .field("outstanding", &self.outstanding)
            .field("open", &self.open)
            .field("activated", &self.activated)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{Opcode, SimulatedSensor, TransportError};

    type Driver = Goodix53xd<SimulatedSensor, RecordingHost>;

    fn driver(sensor: SimulatedSensor) -> Driver {
        Goodix53xd::new(sensor, RecordingHost::new(), DriverConfig::default()).unwrap()
    }

    /// Plays the host loop until the sensor goes quiet.
    fn pump(driver: &mut Driver) {
        while let Some(completion) = driver.channel_mut().next_completion() {
            driver.handle_completion(completion);
        }
    }

    fn activated(sensor: SimulatedSensor) -> Driver {
        let mut driver = driver(sensor);
        driver.open();
        driver.activate();
        pump(&mut driver);
        assert_eq!(driver.host().activation(), Some(&Ok(())));
        driver
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = DriverConfig {
            capture_frames: 0,
            ..DriverConfig::default()
        };
        assert!(Goodix53xd::new(SimulatedSensor::new(), RecordingHost::new(), config).is_err());
    }

    #[test]
    fn test_open_and_close() {
        let mut driver = driver(SimulatedSensor::new());
        driver.open();
        assert!(driver.channel().is_claimed());
        driver.close();
        assert!(!driver.channel().is_claimed());
        assert_eq!(
            driver.host().events(),
            &[HostEvent::OpenComplete(Ok(())), HostEvent::CloseComplete(Ok(()))]
        );
    }

    #[test]
    fn test_activate_requires_open() {
        let mut driver = driver(SimulatedSensor::new());
        driver.activate();
        assert_eq!(driver.host().activation(), Some(&Err(DriverError::NotOpen)));
        assert!(driver.channel().requests().is_empty());
    }

    #[test]
    fn test_activation_establishes_tls() {
        let driver = activated(SimulatedSensor::new());
        assert!(driver.is_activated());
        assert!(!driver.is_busy());
        assert!(driver.channel().is_secured());
        assert!(driver.session().otp().is_some());

        let stats = driver.stats();
        assert_eq!(stats.activations_started, 1);
        assert_eq!(stats.activations_completed, 1);
        assert_eq!(stats.activations_failed, 0);
    }

    #[test]
    fn test_second_activation_while_running_is_busy() {
        let mut driver = driver(SimulatedSensor::new());
        driver.open();
        driver.activate();
        driver.activate();
        assert_eq!(driver.host().activation(), Some(&Err(DriverError::Busy)));

        pump(&mut driver);
        assert_eq!(driver.host().activation(), Some(&Ok(())));
    }

    #[test]
    fn test_failed_check_skips_tls() {
        let mut driver = driver(SimulatedSensor::new().with_firmware("GF5288_HTSEC_APP_10011"));
        driver.open();
        driver.activate();
        pump(&mut driver);

        assert!(matches!(
            driver.host().activation(),
            Some(Err(DriverError::DataInvalid(_)))
        ));
        assert!(!driver.channel().is_secured());
        assert!(!driver.is_activated());
        assert_eq!(driver.stats().activations_failed, 1);
    }

    #[test]
    fn test_tls_failure_fails_activation() {
        let mut driver = driver(
            SimulatedSensor::new().with_tls_failure(TransportError::Tls("bad record".into())),
        );
        driver.open();
        driver.activate();
        pump(&mut driver);

        assert_eq!(
            driver.host().activation(),
            Some(&Err(DriverError::Transport(TransportError::Tls(
                "bad record".into()
            ))))
        );
        assert!(!driver.is_activated());
    }

    #[test]
    fn test_scan_produces_image() {
        let mut driver = activated(SimulatedSensor::new());
        driver.change_state(ImageDeviceState::AwaitFingerOn);
        pump(&mut driver);

        let images = driver.host_mut().take_images();
        assert_eq!(images.len(), 1);
        assert_eq!(images[0].width(), driver.config().image_width);

        let stats = driver.stats();
        assert_eq!(stats.scans_completed, 1);
        assert_eq!(stats.frames_captured, 2);
        assert_eq!(stats.frames_pending, 0);
        assert!(!driver.is_busy());
    }

    #[test]
    fn test_other_states_do_not_scan() {
        let mut driver = activated(SimulatedSensor::new());
        let sent = driver.channel().requests().len();
        driver.change_state(ImageDeviceState::Capture);
        driver.change_state(ImageDeviceState::AwaitFingerOff);
        assert_eq!(driver.channel().requests().len(), sent);
    }

    #[test]
    fn test_scan_before_activation_fails() {
        let mut driver = driver(SimulatedSensor::new());
        driver.open();
        driver.change_state(ImageDeviceState::AwaitFingerOn);
        assert!(driver.channel().requests().is_empty());
        assert_eq!(driver.stats().scans_failed, 1);
    }

    #[test]
    fn test_scan_failure_produces_no_image() {
        let mut driver = activated(
            SimulatedSensor::new()
                .with_transport_failure(Opcode::McuSwitchToFdtMode, TransportError::Timeout),
        );
        driver.change_state(ImageDeviceState::AwaitFingerOn);
        pump(&mut driver);

        assert!(driver.host_mut().take_images().is_empty());
        assert_eq!(driver.stats().scans_failed, 1);
        assert!(!driver.is_busy());
    }

    #[test]
    fn test_completion_after_deactivate_is_discarded() {
        let mut driver = activated(SimulatedSensor::new());
        driver.change_state(ImageDeviceState::AwaitFingerOn);
        let in_flight = driver.channel_mut().next_completion().unwrap();

        driver.deactivate();
        let events = driver.host().events().len();
        driver.handle_completion(in_flight);

        assert_eq!(driver.stats().stale_completions, 1);
        assert_eq!(driver.host().events().len(), events);
        assert!(driver.session().otp().is_none());
        assert!(!driver.channel().is_secured());
        assert_eq!(
            driver.host().events().last(),
            Some(&HostEvent::DeactivateComplete(Ok(())))
        );
    }

    #[test]
    fn test_reset_state_empties_store() {
        let mut driver = driver(SimulatedSensor::new());
        let config = DriverConfig {
            capture_frames: 4,
            ..DriverConfig::default()
        };
        driver.config = config;
        driver.open();
        driver.activate();
        pump(&mut driver);

        driver.change_state(ImageDeviceState::AwaitFingerOn);
        // Run until two frames are stored, then abandon the scan.
        while driver.session().frames().len() < 2 {
            let completion = driver.channel_mut().next_completion().unwrap();
            driver.handle_completion(completion);
        }
        driver.reset_state();

        assert!(driver.session().frames().is_empty());
        assert!(!driver.is_busy());
        assert_eq!(driver.channel().pending(), 0);
        assert!(driver.host_mut().take_images().is_empty());
    }

    #[test]
    fn test_reactivation_starts_clean() {
        let mut driver = activated(SimulatedSensor::new());
        driver.deactivate();
        assert!(!driver.is_activated());

        driver.activate();
        pump(&mut driver);
        assert_eq!(driver.host().activation(), Some(&Ok(())));
        assert_eq!(driver.stats().activations_completed, 2);
    }
}
