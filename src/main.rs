use std::env;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dermscan::gateway::HttpGateway;
use dermscan::report::DiagnosisReport;
use dermscan::service::{self, DiagnosisService, Outcome, REJECTION_MESSAGE};
use dermscan::{config, history, ImageSource};
use dermscan_vision::video::Camera;
use log::{info, warn};

#[derive(Parser)]
#[command(name = "dermscan")]
#[command(
    version,
    about = "Skin photo checker and dermatology diagnosis client"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether an image shows human skin, without calling the API
    Check {
        /// Image file to check
        image: PathBuf,
    },
    /// Check an image and, if it shows skin, request a diagnosis
    Diagnose {
        /// Image file to diagnose
        image: PathBuf,
    },
    /// Capture a photo from the camera and check it
    Capture {
        /// Camera device (defaults to the configured one)
        #[arg(short, long)]
        device: Option<String>,
        /// Also request a diagnosis for the accepted frame
        #[arg(long)]
        diagnose: bool,
    },
    /// List past diagnoses
    History {
        /// Delete all stored reports
        #[arg(long)]
        purge: bool,
    },
    /// Open config file in editor
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(None)?;

    match cli.command {
        Commands::Check { image } => check(&cfg, &image).await,
        Commands::Diagnose { image } => {
            let bytes =
                std::fs::read(&image).with_context(|| format!("reading {}", image.display()))?;
            diagnose(&cfg, bytes).await
        }
        Commands::Capture { device, diagnose: run_diagnosis } => {
            let device = device.unwrap_or_else(|| cfg.camera.clone());
            capture(&cfg, &device, run_diagnosis).await
        }
        Commands::History { purge } => show_history(&cfg, purge),
        Commands::Config => open_config(),
    }
}

async fn check(cfg: &config::Config, image: &Path) -> Result<()> {
    let bytes = std::fs::read(image).with_context(|| format!("reading {}", image.display()))?;
    let classifier = Arc::new(cfg.classifier());
    let verdict = service::classify_in_background(classifier, ImageSource::Bytes(bytes)).await;

    if !verdict.is_human_skin {
        anyhow::bail!(REJECTION_MESSAGE);
    }
    if let Some(warning) = verdict.warning {
        warn!("{}", warning);
    }
    info!("✓ {} looks like human skin", image.display());
    Ok(())
}

async fn diagnose(cfg: &config::Config, bytes: Vec<u8>) -> Result<()> {
    let gateway =
        HttpGateway::new(cfg.gateway.clone()).context("Failed to set up diagnosis gateway")?;
    let svc = DiagnosisService::new(Arc::new(cfg.classifier()), gateway);

    match svc.diagnose(bytes).await? {
        Outcome::Rejected { message } => anyhow::bail!(message),
        Outcome::Diagnosed(report) => {
            print_report(&report);
            let dir = history::history_dir(cfg)?;
            history::append_report(&dir, report).context("Failed to save report")?;
            Ok(())
        }
    }
}

async fn capture(cfg: &config::Config, device: &str, run_diagnosis: bool) -> Result<()> {
    info!("Opening camera: {}", device);
    let mut camera = Camera::open(device).context("Failed to open camera")?;
    let classifier = Arc::new(cfg.classifier());

    info!("Camera opened. Hold the affected area in front of it...");

    let max_attempts = 30;
    for i in 0..max_attempts {
        let frame = camera.frame().context("Failed to capture frame")?;
        let source = ImageSource::Frame(frame.clone());
        let verdict = service::classify_in_background(Arc::clone(&classifier), source).await;

        if !verdict.is_human_skin {
            warn!("Frame {}: no skin in view", i + 1);
            tokio::time::sleep(Duration::from_millis(100)).await;
            continue;
        }

        info!("Frame {}: skin detected", i + 1);
        if let Some(warning) = &verdict.warning {
            warn!("{}", warning);
        }
        if !run_diagnosis {
            return Ok(());
        }

        let mut png = Cursor::new(Vec::new());
        image::DynamicImage::ImageRgba8(frame)
            .write_to(&mut png, image::ImageFormat::Png)
            .context("Failed to encode frame")?;
        return diagnose(cfg, png.into_inner()).await;
    }

    anyhow::bail!("No skin detected in {} frames. {}", max_attempts, REJECTION_MESSAGE)
}

fn print_report(report: &DiagnosisReport) {
    info!("Severity: {:?}", report.severity);
    for (rank, condition) in report.conditions.iter().enumerate() {
        info!(
            "  {}. {} ({:.1}%){}",
            rank + 1,
            condition.name,
            condition.confidence * 100.0,
            condition
                .icd
                .as_ref()
                .map(|code| format!(" [{}]", code))
                .unwrap_or_default()
        );
    }
    for line in &report.recommendations {
        info!("- {}", line);
    }
    if let Some(warning) = &report.warning {
        warn!("{}", warning);
    }
}

fn show_history(cfg: &config::Config, purge: bool) -> Result<()> {
    let dir = history::history_dir(cfg)?;

    if purge {
        history::purge(&dir).context("Failed to purge history")?;
        info!("✓ History cleared");
        return Ok(());
    }

    let reports = history::load_reports(&dir).context("Failed to load history")?;
    if reports.is_empty() {
        info!("No past diagnoses");
        return Ok(());
    }
    for report in &reports {
        let top = report
            .top_condition()
            .map(|c| c.name.as_str())
            .unwrap_or("-");
        info!("{} {} {:?} {}", report.created_at, report.id, report.severity, top);
    }
    Ok(())
}

fn open_config() -> Result<()> {
    let config_path = config::CONFIG_PATH.as_os_str();
    let editor = env::var("EDITOR").unwrap_or_else(|_| "vi".to_string());

    info!("Opening config file: {:?}", config_path);

    let status = std::process::Command::new(editor)
        .arg(config_path)
        .status()
        .context("Failed to open editor")?;

    if !status.success() {
        anyhow::bail!("Editor exited with non-zero status");
    }

    Ok(())
}
