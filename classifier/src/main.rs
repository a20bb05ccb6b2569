mod classifier;
mod filter;
mod keys;
mod runner;
mod sampler;
mod storage;

use clap::Parser;
use frame_triage_capture::{AnySource, CaptureSource};
use frame_triage_common::config::{Config, SourceMode};
use runner::{RunLoop, StopReason};
use std::path::PathBuf;
use storage::DirectorySink;
use tokio::sync::watch;
use tracing::{error, info};

/// Sample a live video source and sort frames into quality buckets.
#[derive(Parser, Debug)]
#[command(name = "frame-triage", version)]
struct Args {
    /// TOML config file. Built-in defaults are used when omitted.
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Base directory for the valid/dark/blurry/similar buckets.
    #[arg(long)]
    output: Option<PathBuf>,
    /// Stream URL, still-frame URL or image directory.
    #[arg(long)]
    source: Option<String>,
    /// mjpeg, polling or directory.
    #[arg(long)]
    mode: Option<SourceMode>,
    /// Seconds between classified samples.
    #[arg(long)]
    interval: Option<f64>,
    /// Mean luminance below which a frame is too dark.
    #[arg(long)]
    dark_thresh: Option<f64>,
    /// Laplacian variance below which a frame is blurry.
    #[arg(long)]
    blur_thresh: Option<f64>,
    /// Mean pixel difference below which a frame duplicates the last valid one.
    #[arg(long)]
    sim_thresh: Option<f64>,
}

impl Args {
    /// Command-line values win over the config file.
    fn apply(self, config: &mut Config) {
        if let Some(output) = self.output {
            config.output.path = output;
        }
        if let Some(source) = self.source {
            config.source.url = source;
        }
        if let Some(mode) = self.mode {
            config.source.mode = mode;
        }
        let t = &mut config.thresholds;
        if let Some(v) = self.interval {
            t.interval_secs = v;
        }
        if let Some(v) = self.dark_thresh {
            t.darkness = v;
        }
        if let Some(v) = self.blur_thresh {
            t.blur = v;
        }
        if let Some(v) = self.sim_thresh {
            t.similarity = v;
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => match Config::load(path) {
            Ok(c) => c,
            Err(e) => {
                eprintln!("Failed to load config from {}: {e}", path.display());
                std::process::exit(1);
            }
        },
        None => Config::default(),
    };
    args.apply(&mut config);
    if let Err(e) = config.validate() {
        eprintln!("{e}");
        std::process::exit(1);
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| config.logging.level.parse().unwrap_or_default()),
        )
        .init();

    info!(
        source = config.source.url,
        mode = ?config.source.mode,
        output = %config.output.path.display(),
        interval_secs = config.thresholds.interval_secs,
        darkness = config.thresholds.darkness,
        blur = config.thresholds.blur,
        similarity = config.thresholds.similarity,
        "starting frame-triage"
    );

    let sink = DirectorySink::new(&config.output);
    if let Err(e) = sink.ensure_buckets() {
        error!(error = %e, "failed to prepare output buckets");
        std::process::exit(1);
    }

    let source = match AnySource::open(&config.source) {
        Ok(s) => s,
        Err(e) => {
            error!(error = %e, "failed to open capture source");
            std::process::exit(1);
        }
    };
    info!(source = source.name(), "capture source ready");

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupt received, shutting down");
            let _ = shutdown_tx.send(true);
        }
    });

    let mut run_loop = RunLoop::new(source, sink, config.thresholds, &config.retry);
    let reason = run_loop.run(shutdown_rx).await;
    info!(
        ?reason,
        output = %run_loop.sink().base().display(),
        valid = run_loop.stats().valid,
        "frame-triage finished"
    );

    if let StopReason::CaptureFailures(n) = reason {
        error!(failures = n, "capture source kept failing");
        std::process::exit(2);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let args = Args::parse_from([
            "frame-triage",
            "--output",
            "/tmp/frames",
            "--mode",
            "directory",
            "--source",
            "/data/in",
            "--dark-thresh",
            "25",
            "--sim-thresh",
            "0.5",
        ]);
        let mut config = Config::default();
        args.apply(&mut config);

        assert_eq!(config.output.path, PathBuf::from("/tmp/frames"));
        assert_eq!(config.source.mode, SourceMode::Directory);
        assert_eq!(config.source.url, "/data/in");
        assert_eq!(config.thresholds.darkness, 25.0);
        assert_eq!(config.thresholds.similarity, 0.5);
        // Untouched values keep their defaults.
        assert_eq!(config.thresholds.blur, 100.0);
        assert_eq!(config.thresholds.interval_secs, 1.0);
    }

    #[test]
    fn rejects_unknown_mode() {
        assert!(Args::try_parse_from(["frame-triage", "--mode", "rtsp"]).is_err());
    }
}
