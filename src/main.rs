//! CLI entry point for the ePix live pipeline.
//!
//! Provides a command-line interface for:
//! - `simulate`: drive the full pipeline from the synthetic frame generator,
//!   for bring-up and soak testing without a detector.
//! - `replay`: feed a recorded raw stream file through the pipeline.
//!
//! Both subcommands run the ingest loop on a Tokio task and periodically log
//! the snapshot the viewer would see. A GUI connects through the same two
//! handles (`Controls`, `SnapshotHandle`); none is bundled here.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use epix_live::config::LiveConfig;
use epix_live::frame::RawFrame;
use epix_live::logging;
use epix_live::pipeline::Pipeline;
use epix_live::sim::FrameSimulator;
use epix_live::sink::{FileSink, StreamReader};
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::info;

#[derive(Parser)]
#[command(name = "epix-live")]
#[command(about = "Live descrambling pipeline for ePix detector cameras", long_about = None)]
struct Cli {
    /// Configuration file.
    #[arg(long, default_value = "epix-live.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream synthetic frames through the pipeline.
    Simulate {
        /// Number of acquisitions to generate.
        #[arg(long, default_value = "1000")]
        frames: u64,

        /// Acquisition rate in Hz.
        #[arg(long, default_value = "120")]
        rate: f64,

        /// Pixel pedestal for generated images.
        #[arg(long, default_value = "3000")]
        pedestal: u16,

        /// Peak pixel noise amplitude.
        #[arg(long, default_value = "20")]
        noise: u16,
    },

    /// Replay a recorded raw stream file.
    Replay {
        /// Path to the recorded stream.
        file: PathBuf,

        /// Playback delay between frames, in milliseconds.
        #[arg(long, default_value = "2")]
        delay_ms: u64,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = LiveConfig::load_from(&cli.config)?;
    config
        .validate()
        .map_err(anyhow::Error::msg)
        .context("invalid configuration")?;
    logging::init_from_config(&config).map_err(anyhow::Error::msg)?;

    let mut pipeline = Pipeline::from_config(&config)?;
    if let Some(tee) = &config.tee {
        pipeline.set_sink(Box::new(FileSink::create(tee).await?));
    }
    let snapshots = pipeline.snapshots();

    let (tx, rx) = mpsc::channel::<RawFrame>(256);
    let ingest = tokio::spawn(pipeline.run(rx));

    match cli.command {
        Commands::Simulate {
            frames,
            rate,
            pedestal,
            noise,
        } => {
            let mut simulator = FrameSimulator::new(config.sensor.kind, pedestal, noise, 0xE19);
            let period = Duration::from_secs_f64(1.0 / rate.max(1e-3));
            info!(frames, rate, "simulation started");
            for acq in 0..frames {
                for frame in simulator.next_image_frames() {
                    tx.send(frame).await?;
                }
                // Sideband channels tick along with the images.
                if acq % 4 == 0 {
                    tx.send(simulator.next_scope_frame()).await?;
                }
                if acq % 16 == 0 {
                    tx.send(simulator.next_monitoring_frame()).await?;
                }
                if acq % 256 == 0 {
                    let snap = snapshots.latest();
                    info!(
                        acq,
                        images = snap.counters.images,
                        desc_errors = snap.counters.desc_errors,
                        "simulating"
                    );
                }
                tokio::time::sleep(period).await;
            }
        }
        Commands::Replay { file, delay_ms } => {
            let mut reader = StreamReader::open(&file).await?;
            let delay = Duration::from_millis(delay_ms);
            info!(file = %file.display(), "replay started");
            while let Some(frame) = reader.next_frame().await? {
                tx.send(frame).await?;
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    drop(tx);
    ingest.await??;

    let summary = snapshots.latest();
    println!(
        "{}",
        serde_json::to_string_pretty(&summary.counters)
            .context("serializing final counters")?
    );
    Ok(())
}
