//! Depthscan
//!
//! Command line scanner: opens a depth + color sensor, delivers a fixed number
//! of frames to a frame consumer and shuts the sensor down again.
//!
//! The bundled consumer logs per-frame depth statistics. Hardware drivers
//! plug in through `depthscan_capture::SensorDriver`; this binary drives the
//! synthetic sensor.

mod app;
mod config;
mod summary;

use clap::Parser;
use std::path::PathBuf;

use crate::app::ScanApp;
use crate::config::ScanConfig;

/// Depthscan - Depth + color frame acquisition
#[derive(Parser, Debug)]
#[command(name = "depthscan")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to a JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of frames to deliver before finishing
    #[arg(short = 'n', long)]
    frames: Option<u32>,

    /// Callback worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Frames that may wait for a free worker
    #[arg(long)]
    queue_capacity: Option<usize>,

    /// Sensor frame rate (0 = unthrottled)
    #[arg(long)]
    fps: Option<f32>,

    /// Make every n-th sample miss its depth data
    #[arg(long)]
    drop_every: Option<u64>,

    /// Make every n-th sample fail with a driver error
    #[arg(long)]
    fault_every: Option<u64>,

    /// Seconds to wait for the quota (0 = forever)
    #[arg(short, long)]
    timeout: Option<u64>,

    /// Log level used when RUST_LOG is unset
    #[arg(long)]
    log_level: Option<String>,

    /// Send spans to Tracy (needs the `tracy` feature)
    #[arg(long)]
    tracy: bool,
}

impl Args {
    fn apply(self, config: &mut ScanConfig) {
        if let Some(frames) = self.frames {
            config.dispatch.quota = frames;
        }
        if let Some(workers) = self.workers {
            config.dispatch.workers = workers;
        }
        if let Some(queue_capacity) = self.queue_capacity {
            config.dispatch.queue_capacity = queue_capacity;
        }
        if let Some(fps) = self.fps {
            config.sensor.frame_rate = fps;
        }
        if self.drop_every.is_some() {
            config.sensor.missing_depth_every = self.drop_every;
        }
        if self.fault_every.is_some() {
            config.sensor.fault_every = self.fault_every;
        }
        if let Some(timeout) = self.timeout {
            config.timeout_secs = timeout;
        }
        if let Some(level) = self.log_level {
            config.logging.level = level;
        }
        if self.tracy {
            config.logging.enable_tracy = true;
        }
    }
}

fn main() {
    let args = Args::parse();

    let mut config = match ScanConfig::load(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Configuration error: {}", e);
            std::process::exit(1);
        }
    };
    args.apply(&mut config);

    match ScanApp::new().with_config(config).run() {
        Ok(report) if report.finished => {
            println!(
                "Scan finished: {} frames delivered, {} samples dropped, {} callback failures",
                report.stats.completed,
                report.stats.dropped(),
                report.stats.callback_panics
            );
        }
        Ok(report) => {
            eprintln!(
                "Scan timed out after {:.1}s with {} frames delivered",
                report.elapsed.as_secs_f64(),
                report.stats.completed
            );
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Scan error: {}", e);
            std::process::exit(1);
        }
    }
}
