//! window-snap: capture one frame of a window to a PNG file
//!
//! Usage: `window-snap --window 0x1A2B3C --out shot.png`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, fmt};
use window_snap::{
    capture::{CaptureFacade, SystemPlatform, WindowCapturer},
    model::{CaptureOptions, PngCompression, Region, WindowHandle},
};

/// Capture a single frame of a window and save it as PNG
#[derive(Debug, Parser)]
#[command(name = "window-snap", version, about)]
struct Args {
    /// Window handle (HWND), decimal or 0x-prefixed hex
    #[arg(long)]
    window: WindowHandle,

    /// Output PNG path [default: window-<HWND>-<timestamp>.png]
    #[arg(long)]
    out: Option<PathBuf>,

    /// Milliseconds to wait for the first frame
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// PNG compression effort: fast, default or best
    #[arg(long)]
    compression: Option<PngCompression>,

    /// Region of interest as X,Y,W,H
    #[arg(long)]
    crop: Option<Region>,

    /// Include the mouse cursor
    #[arg(long)]
    cursor: bool,

    /// Keep the capture border around the window
    #[arg(long)]
    border: bool,

    /// JSON file with capture options; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Args {
    fn options(&self) -> Result<CaptureOptions> {
        let mut opts = match &self.config {
            Some(path) => CaptureOptions::from_json_file(path)?,
            None => CaptureOptions::default(),
        };

        if let Some(timeout_ms) = self.timeout_ms {
            opts.timeout_ms = timeout_ms;
        }
        if let Some(compression) = self.compression {
            opts.compression = compression;
        }
        if let Some(crop) = self.crop {
            opts.crop = Some(crop);
        }
        opts.cursor |= self.cursor;
        opts.border |= self.border;

        opts.validate()?;
        Ok(opts)
    }

    fn output_path(&self) -> PathBuf {
        self.out.clone().unwrap_or_else(|| {
            let stamp = chrono::Local::now().format("%Y%m%d-%H%M%S");
            PathBuf::from(format!("window-{}-{}.png", self.window, stamp))
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Respects RUST_LOG; default level: info
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("window_snap=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let opts = args.options().context("invalid capture options")?;
    let out = args.output_path();

    info!("Capturing window {} to {}", args.window, out.display());

    let capturer: Box<dyn CaptureFacade> = Box::new(WindowCapturer::new(SystemPlatform::default(), opts));

    match capturer.capture_to_file(args.window, &out).await {
        Ok(encoded) => {
            info!("Saved {}x{} PNG ({} bytes)", encoded.width, encoded.height, encoded.bytes.len());
            println!("{}", out.display());
            Ok(())
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("hint: {}", e.remediation_hint());
            if e.is_transient() {
                eprintln!("hint: this failure is usually transient; retrying may succeed");
            }
            Err(e).with_context(|| format!("failed to capture window {}", args.window))
        }
    }
}
