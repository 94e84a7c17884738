//! Goodix 53xd CLI
//!
//! Runs the driver against the simulated sensor: activation, a number of
//! scans, and each assembled image written out as PGM.

use clap::Parser;
use goodix_53xd::{
    device::{FileConfig, Goodix53xd, ImageDeviceState, RecordingHost},
    metrics::MetricsRegistry,
    protocol::constants::{DEVICE_INFO, ID_TABLE},
    protocol::SimulatedSensor,
};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

type Driver = Goodix53xd<SimulatedSensor, RecordingHost>;

#[derive(Debug, Parser)]
#[command(name = "goodix-53xd", version, about = "Goodix 53xd sensor driver demo")]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of scans to run.
    #[arg(short, long)]
    scans: Option<u32>,

    /// Directory for the assembled images.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Scan until interrupted with Ctrl-C.
    #[arg(long)]
    continuous: bool,

    /// Print metrics in Prometheus text format before exiting.
    #[arg(long)]
    metrics: bool,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                error!("Failed to load {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };
    if let Some(scans) = args.scans {
        config.output.scans = scans;
    }
    if let Some(output) = args.output {
        config.output.directory = output;
    }
    config.output.continuous |= args.continuous;
    config.output.print_metrics |= args.metrics;

    info!("Goodix 53xd driver v{}", goodix_53xd::VERSION);
    info!("This is a demonstration using a simulated sensor");
    if let Some(id) = ID_TABLE.first() {
        info!(
            "Emulating {} ({}) as {:04x}:{:04x}, {}x{} frames",
            DEVICE_INFO.name,
            DEVICE_INFO.id,
            id.vid,
            id.pid,
            DEVICE_INFO.img_width,
            DEVICE_INFO.img_height
        );
    }

    let mut driver = match Goodix53xd::new(
        SimulatedSensor::new(),
        RecordingHost::new(),
        config.driver.clone(),
    ) {
        Ok(driver) => driver,
        Err(e) => {
            error!("Invalid driver configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let running = Arc::new(AtomicBool::new(true));
    if config.output.continuous {
        let flag = running.clone();
        if let Err(e) = ctrlc::set_handler(move || flag.store(false, Ordering::SeqCst)) {
            warn!("Failed to install Ctrl-C handler: {}", e);
        }
    }

    if let Err(e) = std::fs::create_dir_all(&config.output.directory) {
        error!(
            "Failed to create {}: {}",
            config.output.directory.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    driver.open();
    driver.activate();
    pump(&mut driver);

    if !driver.is_activated() {
        error!("Activation failed, see log above");
        return ExitCode::FAILURE;
    }

    let mut written = 0u32;
    let mut scan = 0u32;
    while running.load(Ordering::SeqCst)
        && (config.output.continuous || scan < config.output.scans)
    {
        scan += 1;
        driver.change_state(ImageDeviceState::AwaitFingerOn);
        pump(&mut driver);

        for image in driver.host_mut().take_images() {
            let name = format!(
                "scan-{}-{:04}.pgm",
                chrono::Local::now().format("%Y%m%d-%H%M%S%.3f"),
                scan
            );
            let path = config.output.directory.join(name);
            let result = File::create(&path).and_then(|file| image.write_pgm(BufWriter::new(file)));
            match result {
                Ok(()) => {
                    written += 1;
                    info!("Wrote {}", path.display());
                }
                Err(e) => warn!("Failed to write {}: {}", path.display(), e),
            }
        }
    }

    driver.deactivate();
    driver.close();

    let stats = driver.stats();
    info!(
        "Done. {} scans, {} images written, {} failed",
        scan, written, stats.scans_failed
    );

    if config.output.print_metrics {
        match MetricsRegistry::new().and_then(|registry| {
            registry.update(&stats);
            registry.encode()
        }) {
            Ok(text) => print!("{}", text),
            Err(e) => warn!("Failed to encode metrics: {}", e),
        }
    }

    ExitCode::SUCCESS
}

/// Delivers queued completions until the sensor has nothing more to say.
fn pump(driver: &mut Driver) {
    while let Some(completion) = driver.channel_mut().next_completion() {
        driver.handle_completion(completion);
    }
}
